use crate::fault::Fault;
use crate::memory::Word;

/// Number of general purpose registers
pub const REGISTER_COUNT: usize = 8;

/// Address the stack pointer starts at. The stack grows down from here.
pub const STACK_START: Word = 0xF4;

/// Construction parameters of a machine. Fixed for the lifetime of a machine.
///
/// Memory capacity is not part of this struct, it is the const parameter of
/// [`Memory`](crate::memory::Memory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Config {
    /// Size of the register file
    pub registers: usize,
    /// Initial (and highest) value of the stack pointer
    pub stack_start: Word,
    /// Fault instead of looping forever after this many instructions
    pub step_limit: Option<u64>,
    /// Emit a trace line before every instruction
    pub trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registers: REGISTER_COUNT,
            stack_start: STACK_START,
            step_limit: None,
            trace: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registers(mut self, registers: usize) -> Self {
        self.registers = registers;
        self
    }

    pub fn with_stack_start(mut self, stack_start: Word) -> Self {
        self.stack_start = stack_start;
        self
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Checks the parameters against a memory of `capacity` bytes
    pub fn validate(&self, capacity: usize) -> Result<(), Fault> {
        if self.registers == 0 {
            return Err(Fault::InvalidConfig("at least one register is required"));
        }
        // register operands are single bytes
        if self.registers > 256 {
            return Err(Fault::InvalidConfig("at most 256 registers are addressable"));
        }
        if self.stack_start as usize > capacity {
            return Err(Fault::InvalidConfig("stack start lies outside of memory"));
        }

        Ok(())
    }
}
