use color_eyre::eyre::Result;

use ls8::machine::Machine;
use ls8::memory::Byte;
use ls8::program;
use log::LevelFilter;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().with_level(LevelFilter::Debug).init()?; // logging

    use ls8::processor::Instruction::*;
    let bytes: Vec<Byte> = program![
        LDI, 0, 8,
        LDI, 1, 9,
        MUL, 0, 1,
        PRN, 0,
        HLT
    ];

    let mut machine = Machine::new(std::io::stdout());
    machine.load(&bytes)?;
    machine.run()?;

    Ok(())
}
