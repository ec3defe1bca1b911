//! Reads LS-8 programs written as one binary byte per line:
//!
//! ```text
//! # print 8
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 01000111 # PRN R0
//! 00000000
//! 00000001 # HLT
//! ```

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::Lines;

use color_eyre::eyre::{eyre, WrapErr};
use thiserror::Error;

use super::Byte;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidNumber { radix: u32 },
    ByteOutOfRange { value: u32 },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidNumber { radix } => {
                write!(f, "failed to parse number with radix `{}`", radix)
            }
            ParseErrorKind::ByteOutOfRange { value } => {
                write!(f, "value `{}` does not fit into a byte", value)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("error [ln: {line_nr}]: {kind} - {context}")]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Cow<'static, str>,
    line_nr: usize,
}

impl ParseError {
    fn new<C>(kind: ParseErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into(),
            line_nr,
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    pub fn line_nr(&self) -> usize {
        self.line_nr
    }
}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

#[derive(Debug, Clone)]
pub struct Parser<'a> {
    lines: Lines<'a>,
    line_nr: usize,
    bytes: Vec<Byte>,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for `data`
    pub fn new(data: &'a str) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
            bytes: Vec::new(),
        }
    }

    /// Consumes `self` and tries to parse all of the data into a program.
    ///
    /// # Errors
    ///
    /// All errors which may occur are collected and returned at the end.
    pub fn parse(mut self) -> Result<Vec<Byte>, Vec<ParseError>> {
        let mut errors = Vec::new();

        while let Some(res) = self.parse_next_line() {
            if let Err(err) = res {
                log::error!("{}", err);
                errors.push(err);
            }
        }

        if errors.is_empty() {
            log::debug!("Parsed {} bytes from {} lines", self.bytes.len(), self.line_nr);
            Ok(self.bytes)
        } else {
            Err(errors)
        }
    }

    /// Tries to parse the next line. Each byte should be located on its own
    /// line, anything after a `#` is a comment.
    fn parse_next_line(&mut self) -> Option<Result<()>> {
        let line = self.lines.next()?;
        self.line_nr += 1;

        let line = match line.split_once('#') {
            Some((code, _comment)) => code,
            None => line,
        }
        .trim();

        if line.is_empty() {
            // Comment or empty line; skip
            return Some(Ok(()));
        }

        Some(self.parse_byte(line))
    }

    /// Tries to parse `line` as a binary byte, with or without `0b` prefix.
    ///
    /// # Examples
    ///
    /// - `10000010`
    /// - `0b0100_0111`
    fn parse_byte(&mut self, line: &str) -> Result<()> {
        const RADIX: u32 = 2;

        let digits = line.strip_prefix("0b").unwrap_or(line).replace('_', "");
        let value = u32::from_str_radix(&digits, RADIX).map_err(|_| {
            ParseError::new(
                ParseErrorKind::InvalidNumber { radix: RADIX },
                format!("`{}` is not a binary number", line),
                self.line_nr,
            )
        })?;

        let byte = Byte::try_from(value).map_err(|_| {
            ParseError::new(
                ParseErrorKind::ByteOutOfRange { value },
                "bytes hold values from 0 to 255",
                self.line_nr,
            )
        })?;

        log::trace!("[{}] Found byte 0x{:02X}", self.line_nr, byte);
        self.bytes.push(byte);

        Ok(())
    }
}

/// Parses a program from text
pub fn parse(data: &str) -> Result<Vec<Byte>, Vec<ParseError>> {
    Parser::new(data).parse()
}

/// Reads and parses a program file
pub fn from_file<P: AsRef<Path>>(path: P) -> color_eyre::eyre::Result<Vec<Byte>> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read program `{}`", path.display()))?;

    parse(&data).map_err(|errors| {
        let report = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        eyre!(report).wrap_err(format!(
            "Found {} error(s) in `{}`",
            errors.len(),
            path.display()
        ))
    })
}
