use std::cmp::Ordering;
use std::io::Write;

use crate::config::Config;
use crate::fault::Fault;
use crate::memory::{Byte, Memory, Word};
use log::*;
use num_enum::IntoPrimitive;
use num_enum::TryFromPrimitive;

/// Set by `CMP` when both registers are equal
pub const FLAG_EQUAL: Byte = 0b0000_0001;
/// Set by `CMP` when register A is greater than register B
pub const FLAG_GREATER: Byte = 0b0000_0010;
/// Set by `CMP` when register A is less than register B
pub const FLAG_LESS: Byte = 0b0000_0100;

/// Execution state of the CPU
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Running,
    /// Stopped by `HLT`
    Halted,
    /// Stopped by a fault. The fault is kept for inspection.
    Faulted(Fault),
}

/// What an instruction did to the program counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// PC still points at the instruction and has to move past it
    Advance,
    /// PC was set by the instruction
    Jumped,
}

/// Maps every possible opcode byte to its instruction. Built once, never
/// changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeTable {
    entries: [Option<Instruction>; 256],
}

impl Default for DecodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeTable {
    pub fn new() -> Self {
        let mut entries = [None; 256];
        for (opcode, entry) in entries.iter_mut().enumerate() {
            *entry = Instruction::try_from(opcode as Byte).ok();
        }

        Self { entries }
    }

    /// Looks up the instruction for `opcode`
    pub fn decode(&self, opcode: Byte) -> Option<Instruction> {
        self.entries[opcode as usize]
    }
}

/// Emulates the LS-8 CPU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    /// Program counter
    pub pc: Word,
    /// Stack Pointer
    pub sp: Word,
    /// General purpose registers
    pub registers: Vec<Byte>,
    /// Outcome of the last comparison, `00000LGE`
    pub flag: Byte,
    pub state: RunState,
    /// Value the stack pointer starts at; popping past it underflows
    stack_start: Word,
    table: DecodeTable,
}

impl Default for Processor {
    /// Initializes a new CPU
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Processor {
    /// Initializes a new CPU, execution starts at address 0
    pub fn new(config: &Config) -> Self {
        Self {
            pc: 0x00,
            sp: config.stack_start,
            registers: vec![0; config.registers],
            flag: 0,
            state: RunState::Running,
            stack_start: config.stack_start,
            table: DecodeTable::new(),
        }
    }

    pub fn running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn stack_start(&self) -> Word {
        self.stack_start
    }

    /// Stops the CPU with `fault` and hands it back for propagation
    pub fn fault(&mut self, fault: Fault) -> Fault {
        error!("{:?} fault: {} (pc 0x{:02X})", fault.class(), fault, self.pc);
        self.state = RunState::Faulted(fault.clone());
        fault
    }

    fn register_index(&self, index: Byte) -> Result<usize, Fault> {
        let index_usize = index as usize;
        if index_usize < self.registers.len() {
            Ok(index_usize)
        } else {
            Err(Fault::InvalidRegister {
                index,
                count: self.registers.len(),
            })
        }
    }

    /// Reads a register
    pub fn read_register(&self, index: Byte) -> Result<Byte, Fault> {
        Ok(self.registers[self.register_index(index)?])
    }

    /// Writes a register
    pub fn write_register(&mut self, index: Byte, value: Byte) -> Result<(), Fault> {
        let index = self.register_index(index)?;
        self.registers[index] = value;
        Ok(())
    }

    /// Arithmetic logic unit. Everything wraps at 8 bits.
    fn alu(&mut self, instruction: Instruction, reg_a: Byte, reg_b: Byte) -> Result<(), Fault> {
        let a = self.read_register(reg_a)?;
        let b = self.read_register(reg_b)?;

        match instruction {
            Instruction::ADD => {
                let result = a.wrapping_add(b);
                self.write_register(reg_a, result)?;
                debug!("ADD r{} r{}: {} + {} = {}", reg_a, reg_b, a, b, result);
            }
            Instruction::MUL => {
                let result = a.wrapping_mul(b);
                self.write_register(reg_a, result)?;
                debug!("MUL r{} r{}: {} * {} = {}", reg_a, reg_b, a, b, result);
            }
            Instruction::CMP => {
                self.flag = match a.cmp(&b) {
                    Ordering::Equal => FLAG_EQUAL,
                    Ordering::Greater => FLAG_GREATER,
                    Ordering::Less => FLAG_LESS,
                };
                debug!("CMP r{} r{}: {} {} -> {:03b}", reg_a, reg_b, a, b, self.flag);
            }
            _ => unreachable!("{} is not an ALU instruction", instruction),
        }

        Ok(())
    }

    fn jump(&mut self, reg: Byte) -> Result<Flow, Fault> {
        let addr = self.read_register(reg)?;
        self.pc = addr as Word;
        Ok(Flow::Jumped)
    }

    /// Executes a single, already decoded instruction.
    ///
    /// Operands that the instruction does not use are ignored. Nothing is
    /// mutated when the instruction faults.
    pub fn execute_instruction<W: Write, const S: usize>(
        &mut self,
        instruction: Instruction,
        [op_a, op_b]: [Byte; 2],
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<Flow, Fault> {
        match instruction {
            Instruction::HLT => {
                self.state = RunState::Halted;

                debug!("HLT");
            }
            Instruction::LDI => {
                self.write_register(op_a, op_b)?;

                debug!("LDI r{} {}", op_a, op_b);
            }
            Instruction::PRN => {
                let value = self.read_register(op_a)?;
                writeln!(out, "{}", value)?;

                debug!("PRN r{}: {}", op_a, value);
            }
            Instruction::ADD | Instruction::MUL | Instruction::CMP => {
                self.alu(instruction, op_a, op_b)?;
            }
            Instruction::PUSH => {
                let value = self.read_register(op_a)?;
                if self.sp == 0 {
                    return Err(Fault::StackOverflow { sp: self.sp });
                }

                // write value to stack
                let sp = self.sp - 1;
                memory.write_byte(sp, value)?;
                self.sp = sp;

                debug!("PUSH r{}: {} -> 0x{:02X}", op_a, value, sp);
            }
            Instruction::POP => {
                let index = self.register_index(op_a)?;
                if self.sp >= self.stack_start {
                    return Err(Fault::StackUnderflow { sp: self.sp });
                }

                let value = memory.read_byte(self.sp)?;
                self.registers[index] = value;
                self.sp += 1;

                debug!("POP r{}: {}", op_a, value);
            }
            Instruction::JMP => {
                debug!("JMP r{}", op_a);

                return self.jump(op_a);
            }
            Instruction::JEQ => {
                let taken = self.flag & FLAG_EQUAL != 0;
                debug!("JEQ r{}: {}", op_a, if taken { "taken" } else { "skipped" });

                if taken {
                    return self.jump(op_a);
                }
                self.register_index(op_a)?;
            }
            Instruction::JNE => {
                let taken = self.flag & FLAG_EQUAL == 0;
                debug!("JNE r{}: {}", op_a, if taken { "taken" } else { "skipped" });

                if taken {
                    return self.jump(op_a);
                }
                self.register_index(op_a)?;
            }
        }

        Ok(Flow::Advance)
    }

    fn fetch_and_execute<W: Write, const S: usize>(
        &mut self,
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<(), Fault> {
        let opcode = memory.read_byte(self.pc)?; // Read opcode where PC is
        let instruction = self.table.decode(opcode).ok_or(Fault::UnknownOpcode {
            opcode,
            pc: self.pc,
        })?;

        // only fetch as many operands as the instruction declares
        let mut operands = [0; 2];
        for (offset, operand) in operands
            .iter_mut()
            .take(instruction.operand_count())
            .enumerate()
        {
            *operand = memory.read_byte(self.pc.wrapping_add(1 + offset as Word))?;
        }

        if self.execute_instruction(instruction, operands, memory, out)? == Flow::Advance {
            self.pc = self.pc.wrapping_add(instruction.width() as Word);
        }

        Ok(())
    }

    /// Runs one execution step. A fault stops the CPU.
    pub fn execute<W: Write, const S: usize>(
        &mut self,
        memory: &mut Memory<S>,
        out: &mut W,
    ) -> Result<(), Fault> {
        self.fetch_and_execute(memory, out)
            .map_err(|fault| self.fault(fault))
    }
}

macro_rules! instructions {
    ( $( $( #[doc = $doc:expr] )+ $name:ident = $repr:literal , )+ ) => {
        /// Defines the instructions.
        /// Bits 7-6 of every opcode hold the number of operands that follow it.
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum Instruction {
            $(
                $( #[doc = $doc] )+
                $name = $repr,
            )+
        }

        impl Instruction {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name) , )+
                }
            }
        }

        impl ::std::fmt::Display for Instruction {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.name())
            }
        }
    }
}

instructions! {
    /// Stop the execution of the program
    HLT = 0b0000_0001,
    /// Set a register to a value
    /// @param register The register to set
    /// @param value The value to store
    LDI = 0b1000_0010,
    /// Print the value of a register as a decimal number
    /// @param register The register to print
    PRN = 0b0100_0111,
    /// Add register B to register A
    /// @param a The register receiving the result
    /// @param b The other register
    ADD = 0b1010_0000,
    /// Multiply register A by register B
    /// @param a The register receiving the result
    /// @param b The other register
    MUL = 0b1010_0010,
    /// Push a register onto the stack
    /// @param register The register to push
    PUSH = 0b0100_0101,
    /// Pop the top of the stack into a register
    /// @param register The register to pop into
    POP = 0b0100_0110,
    /// Compare two registers and set the flag register
    /// @param a The first register
    /// @param b The second register
    CMP = 0b1010_0111,
    /// Jump to the address stored in a register
    /// @param register The register holding the address
    JMP = 0b0101_0100,
    /// Jump if the last comparison was equal
    /// @param register The register holding the address
    JEQ = 0b0101_0101,
    /// Jump if the last comparison was not equal
    /// @param register The register holding the address
    JNE = 0b0101_0110,
}

impl Instruction {
    /// Number of operand bytes following the opcode
    pub fn operand_count(&self) -> usize {
        (u8::from(*self) >> 6) as usize
    }

    /// Size of the encoded instruction in bytes
    pub fn width(&self) -> usize {
        1 + self.operand_count()
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::StdMem;

    use super::*;
    use color_eyre::eyre::Result;
    use proptest::prelude::*;
    use rstest::rstest;

    fn execute(
        cpu: &mut Processor,
        mem: &mut StdMem,
        bytes: &[Byte],
    ) -> Result<Vec<u8>, Fault> {
        mem.write_array(cpu.pc, bytes)?;
        let mut out = Vec::new();
        cpu.execute(mem, &mut out)?;
        Ok(out)
    }

    #[rstest]
    #[case(Instruction::HLT, 0x01, 1)]
    #[case(Instruction::LDI, 0x82, 3)]
    #[case(Instruction::PRN, 0x47, 2)]
    #[case(Instruction::ADD, 0xA0, 3)]
    #[case(Instruction::MUL, 0xA2, 3)]
    #[case(Instruction::PUSH, 0x45, 2)]
    #[case(Instruction::POP, 0x46, 2)]
    #[case(Instruction::CMP, 0xA7, 3)]
    #[case(Instruction::JMP, 0x54, 2)]
    #[case(Instruction::JEQ, 0x55, 2)]
    #[case(Instruction::JNE, 0x56, 2)]
    fn test_encoding(#[case] instruction: Instruction, #[case] opcode: Byte, #[case] width: usize) {
        assert_eq!(u8::from(instruction), opcode);
        assert_eq!(instruction.width(), width);
        assert_eq!(DecodeTable::new().decode(opcode), Some(instruction));
    }

    #[test]
    fn test_decode_table() -> Result<()> {
        let table = DecodeTable::new();
        let known = (0..=255u8).filter(|op| table.decode(*op).is_some()).count();
        assert_eq!(known, Instruction::ALL.len());
        assert_eq!(table.decode(0x00), None);
        assert_eq!(table.decode(0xFF), None);

        Ok(())
    }

    #[test]
    fn test_initial_state() -> Result<()> {
        let cpu = Processor::default();
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.sp, 0xF4);
        assert_eq!(cpu.registers, vec![0; 8]);
        assert_eq!(cpu.flag, 0);
        assert!(cpu.running());

        Ok(())
    }

    #[test]
    fn test_halt() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();

        execute(&mut cpu, &mut mem, &[Instruction::HLT as Byte])?;

        assert_eq!(cpu.state, RunState::Halted);
        assert_eq!(cpu.pc, 1);

        Ok(())
    }

    #[test]
    fn test_load_immediate() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();

        execute(&mut cpu, &mut mem, &[Instruction::LDI as Byte, 3, 42])?;

        assert_eq!(cpu.registers[3], 42);
        assert_eq!(cpu.pc, 3);

        Ok(())
    }

    #[test]
    fn test_print() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.registers[2] = 200;

        let out = execute(&mut cpu, &mut mem, &[Instruction::PRN as Byte, 2])?;

        assert_eq!(String::from_utf8(out)?, "200\n");
        assert_eq!(cpu.pc, 2);

        Ok(())
    }

    #[test]
    fn test_add_wraps() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.registers[0] = 250;
        cpu.registers[1] = 10;

        execute(&mut cpu, &mut mem, &[Instruction::ADD as Byte, 0, 1])?;

        assert_eq!(cpu.registers[0], 4);
        assert_eq!(cpu.registers[1], 10);

        Ok(())
    }

    #[test]
    fn test_multiply_wraps() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.registers[0] = 200;
        cpu.registers[1] = 2;

        execute(&mut cpu, &mut mem, &[Instruction::MUL as Byte, 0, 1])?;

        assert_eq!(cpu.registers[0], 144);
        assert_eq!(cpu.pc, 3);

        Ok(())
    }

    #[test]
    fn test_push_pop() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.registers[0] = 99;

        execute(&mut cpu, &mut mem, &[Instruction::PUSH as Byte, 0])?;
        assert_eq!(cpu.sp, 0xF3);
        assert_eq!(mem.data[0xF3], 99);

        execute(&mut cpu, &mut mem, &[Instruction::POP as Byte, 5])?;
        assert_eq!(cpu.sp, 0xF4);
        assert_eq!(cpu.registers[5], 99);
        assert_eq!(cpu.pc, 4);

        Ok(())
    }

    #[test]
    fn test_pop_underflow() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();

        let fault = execute(&mut cpu, &mut mem, &[Instruction::POP as Byte, 0]).unwrap_err();

        assert_eq!(fault, Fault::StackUnderflow { sp: 0xF4 });
        assert_eq!(cpu.state, RunState::Faulted(fault));
        assert_eq!(cpu.sp, 0xF4);
        assert_eq!(cpu.pc, 0);

        Ok(())
    }

    #[test]
    fn test_push_overflow() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.sp = 0;
        cpu.pc = 0x10;

        let fault = execute(&mut cpu, &mut mem, &[Instruction::PUSH as Byte, 0]).unwrap_err();

        assert_eq!(fault, Fault::StackOverflow { sp: 0 });
        assert_eq!(cpu.sp, 0);

        Ok(())
    }

    #[test]
    fn test_invalid_register() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();

        let fault = execute(&mut cpu, &mut mem, &[Instruction::LDI as Byte, 8, 1]).unwrap_err();

        assert_eq!(fault, Fault::InvalidRegister { index: 8, count: 8 });
        assert_eq!(cpu.registers, vec![0; 8]);
        assert!(!cpu.running());

        Ok(())
    }

    #[test]
    fn test_pop_into_invalid_register_keeps_stack() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.sp = 0xF3;
        mem.data[0xF3] = 7;

        assert!(execute(&mut cpu, &mut mem, &[Instruction::POP as Byte, 0xFF]).is_err());
        assert_eq!(cpu.sp, 0xF3);

        Ok(())
    }

    #[rstest]
    #[case(5, 5, FLAG_EQUAL)]
    #[case(6, 5, FLAG_GREATER)]
    #[case(4, 5, FLAG_LESS)]
    #[case(0, 255, FLAG_LESS)]
    fn test_compare(#[case] a: Byte, #[case] b: Byte, #[case] flag: Byte) -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.registers[0] = a;
        cpu.registers[1] = b;

        execute(&mut cpu, &mut mem, &[Instruction::CMP as Byte, 0, 1])?;

        assert_eq!(cpu.flag, flag);
        assert_eq!(cpu.pc, 3);

        Ok(())
    }

    #[test]
    fn test_jump() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.registers[4] = 0x42;

        execute(&mut cpu, &mut mem, &[Instruction::JMP as Byte, 4])?;

        assert_eq!(cpu.pc, 0x42);

        Ok(())
    }

    #[rstest]
    #[case(Instruction::JEQ, FLAG_EQUAL, 0x42)]
    #[case(Instruction::JEQ, FLAG_GREATER, 2)]
    #[case(Instruction::JEQ, FLAG_LESS, 2)]
    #[case(Instruction::JNE, FLAG_EQUAL, 2)]
    #[case(Instruction::JNE, FLAG_GREATER, 0x42)]
    #[case(Instruction::JNE, FLAG_LESS, 0x42)]
    fn test_conditional_jump(
        #[case] instruction: Instruction,
        #[case] flag: Byte,
        #[case] pc: Word,
    ) -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.registers[1] = 0x42;
        cpu.flag = flag;

        execute(&mut cpu, &mut mem, &[instruction as Byte, 1])?;

        assert_eq!(cpu.pc, pc);

        Ok(())
    }

    #[test]
    fn test_unknown_opcode() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.registers[0] = 1;

        let fault = execute(&mut cpu, &mut mem, &[0xFF, 0, 0]).unwrap_err();

        assert_eq!(fault, Fault::UnknownOpcode { opcode: 0xFF, pc: 0 });
        assert_eq!(cpu.state, RunState::Faulted(fault));
        assert_eq!(cpu.registers[0], 1);
        assert_eq!(cpu.pc, 0);

        Ok(())
    }

    #[test]
    fn test_operands_past_end_of_memory() -> Result<()> {
        let mut mem = StdMem::default();
        let mut cpu = Processor::default();
        cpu.pc = 0xFF;

        // HLT needs no operands and executes fine in the last byte
        execute(&mut cpu, &mut mem, &[Instruction::HLT as Byte])?;
        assert_eq!(cpu.state, RunState::Halted);

        let mut cpu = Processor::default();
        cpu.pc = 0xFE;
        let fault = execute(&mut cpu, &mut mem, &[Instruction::LDI as Byte, 0]).unwrap_err();
        assert_eq!(
            fault,
            Fault::AddressOutOfRange {
                address: 0x100,
                capacity: 256
            }
        );

        Ok(())
    }

    proptest! {
        #[test]
        fn compare_sets_exactly_one_flag(a in any::<Byte>(), b in any::<Byte>()) {
            let mut mem = StdMem::default();
            let mut cpu = Processor::default();
            cpu.registers[0] = a;
            cpu.registers[1] = b;

            execute(&mut cpu, &mut mem, &[Instruction::CMP as Byte, 0, 1]).unwrap();

            prop_assert_eq!(cpu.flag.count_ones(), 1);
            prop_assert_eq!(cpu.flag & !(FLAG_EQUAL | FLAG_GREATER | FLAG_LESS), 0);
        }

        #[test]
        fn multiply_wraps_modulo_256(a in any::<Byte>(), b in any::<Byte>()) {
            let mut mem = StdMem::default();
            let mut cpu = Processor::default();
            cpu.registers[0] = a;
            cpu.registers[1] = b;

            execute(&mut cpu, &mut mem, &[Instruction::MUL as Byte, 0, 1]).unwrap();

            prop_assert_eq!(cpu.registers[0] as u32, (a as u32 * b as u32) % 256);
        }
    }
}
