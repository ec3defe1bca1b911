use std::fmt;
use std::io::Write;

use crate::config::Config;
use crate::fault::Fault;
use crate::memory::{Byte, Memory, Word, MEMORY_SIZE};
use crate::processor::{Processor, RunState};
use log::*;

/// A complete LS-8: processor, memory and the sink `PRN` prints to.
#[derive(Debug)]
pub struct Machine<W: Write, const S: usize = MEMORY_SIZE> {
    processor: Processor,
    memory: Memory<S>,
    output: W,
    config: Config,
    steps: u64,
}

impl<W: Write> Machine<W> {
    /// Creates a stock LS-8 printing to `output`
    pub fn new(output: W) -> Self {
        Self::build(output, Config::default())
    }
}

impl<W: Write, const S: usize> Machine<W, S> {
    /// Creates a machine with custom parameters
    pub fn with_config(output: W, config: Config) -> Result<Self, Fault> {
        config.validate(S)?;
        Ok(Self::build(output, config))
    }

    fn build(output: W, config: Config) -> Self {
        Self {
            processor: Processor::new(&config),
            memory: Memory::default(),
            output,
            config,
            steps: 0,
        }
    }

    /// Writes `program` into memory starting at address 0
    pub fn load(&mut self, program: &[Byte]) -> Result<(), Fault> {
        if program.is_empty() {
            return Err(Fault::EmptyProgram);
        }
        if program.len() > self.memory.capacity() {
            return Err(Fault::ProgramTooLarge {
                len: program.len(),
                capacity: self.memory.capacity(),
            });
        }
        if program.len() > self.config.stack_start as usize {
            warn!(
                "program of {} bytes reaches into the stack at 0x{:02X}",
                program.len(),
                self.config.stack_start
            );
        }

        self.memory.write_array(0, program)?;
        debug!("Loaded {} bytes", program.len());

        Ok(())
    }

    /// Executes a single instruction. Does nothing once halted, returns the
    /// fault again once faulted.
    pub fn step(&mut self) -> Result<(), Fault> {
        match &self.processor.state {
            RunState::Running => {}
            RunState::Halted => return Ok(()),
            RunState::Faulted(fault) => return Err(fault.clone()),
        }

        if let Some(limit) = self.config.step_limit {
            if self.steps >= limit {
                return Err(self.processor.fault(Fault::StepLimitExceeded { limit }));
            }
        }

        if self.config.trace {
            trace!("{}", self.trace());
        }

        self.steps += 1;
        self.processor.execute(&mut self.memory, &mut self.output)
    }

    /// Runs the program until `HLT` or a fault
    pub fn run(&mut self) -> Result<(), Fault> {
        while self.processor.running() {
            self.step()?;
        }

        if let RunState::Faulted(fault) = &self.processor.state {
            return Err(fault.clone());
        }

        self.output.flush()?;
        info!("Program halted after {} steps", self.steps);

        Ok(())
    }

    /// Snapshot of the state around the program counter
    pub fn trace(&self) -> Trace {
        let pc = self.processor.pc;
        let at = |offset: usize| self.memory.peek(pc as usize + offset);

        Trace {
            pc,
            bytes: [at(0), at(1), at(2)],
            registers: self.processor.registers.clone(),
        }
    }

    pub fn running(&self) -> bool {
        self.processor.running()
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn memory(&self) -> &Memory<S> {
        &self.memory
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Number of instructions executed so far
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/// One line of diagnostic output: PC, the three bytes at PC and the registers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub pc: Word,
    /// `None` past the end of memory
    pub bytes: [Option<Byte>; 3],
    pub registers: Vec<Byte>,
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TRACE: {:02X} |", self.pc)?;
        for byte in &self.bytes {
            match byte {
                Some(byte) => write!(f, " {:02X}", byte)?,
                None => f.write_str(" --")?,
            }
        }
        f.write_str(" |")?;
        for register in &self.registers {
            write!(f, " {:02X}", register)?;
        }

        Ok(())
    }
}
