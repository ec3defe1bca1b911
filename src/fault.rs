use thiserror::Error;

use crate::memory::{Byte, Word};

/// Broad grouping of faults, used for logging and exit decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultClass {
    /// The program image was rejected before execution.
    Load,
    /// An opcode had no entry in the decode table.
    Decode,
    /// Push or pop crossed the stack bounds.
    Stack,
    /// An operand named a register that does not exist.
    Register,
    /// An access fell outside of memory.
    Memory,
    /// The configured step limit was reached.
    Guard,
    /// The output sink refused a write.
    Output,
    /// The machine was constructed with inconsistent parameters.
    Config,
}

/// Everything that can stop the machine other than `HLT`.
///
/// All faults are terminal for the current run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("cannot load an empty program")]
    EmptyProgram,
    #[error("program of {len} bytes does not fit into {capacity} bytes of memory")]
    ProgramTooLarge { len: usize, capacity: usize },
    #[error("unknown opcode 0x{opcode:02X} at 0x{pc:02X}")]
    UnknownOpcode { opcode: Byte, pc: Word },
    #[error("stack overflow: cannot push with sp at 0x{sp:02X}")]
    StackOverflow { sp: Word },
    #[error("stack underflow: cannot pop with sp at 0x{sp:02X}")]
    StackUnderflow { sp: Word },
    #[error("register r{index} does not exist (machine has {count} registers)")]
    InvalidRegister { index: Byte, count: usize },
    #[error("address 0x{address:X} is outside of {capacity} bytes of memory")]
    AddressOutOfRange { address: usize, capacity: usize },
    #[error("step limit of {limit} instructions exceeded")]
    StepLimitExceeded { limit: u64 },
    #[error("failed to write output: {0}")]
    Output(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl Fault {
    pub fn class(&self) -> FaultClass {
        match self {
            Self::EmptyProgram | Self::ProgramTooLarge { .. } => FaultClass::Load,
            Self::UnknownOpcode { .. } => FaultClass::Decode,
            Self::StackOverflow { .. } | Self::StackUnderflow { .. } => FaultClass::Stack,
            Self::InvalidRegister { .. } => FaultClass::Register,
            Self::AddressOutOfRange { .. } => FaultClass::Memory,
            Self::StepLimitExceeded { .. } => FaultClass::Guard,
            Self::Output(_) => FaultClass::Output,
            Self::InvalidConfig(_) => FaultClass::Config,
        }
    }
}

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self {
        Self::Output(err.to_string())
    }
}
