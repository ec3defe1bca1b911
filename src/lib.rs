//! Emulator for the LS-8, a tiny 8-bit machine with eight registers, a
//! downward growing stack and a comparison flag register.
//!
//! ```no_run
//! use ls8::machine::Machine;
//! use ls8::memory::Byte;
//! use ls8::program;
//!
//! use ls8::processor::Instruction::*;
//! let bytes = program![LDI, 0, 9, LDI, 1, 3, MUL, 0, 1, PRN, 0, HLT];
//!
//! let mut machine = Machine::new(std::io::stdout());
//! machine.load(&bytes).unwrap();
//! machine.run().unwrap();
//! ```

pub mod config;
pub mod fault;
pub mod machine;
pub mod memory;
pub mod processor;
