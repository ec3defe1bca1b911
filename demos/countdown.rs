use color_eyre::eyre::Result;

use ls8::config::Config;
use ls8::machine::Machine;
use ls8::program;
use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Address of the loop body
const LOOP: u8 = 12;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Trace)
        .init()?; // logging

    use ls8::processor::Instruction::*;
    // there is no SUB, adding 255 wraps around to a decrement
    let bytes = program![
        LDI, 0, 5,
        LDI, 1, 255,
        LDI, 2, 0,
        LDI, 3, LOOP,
        PRN, 0,
        ADD, 0, 1,
        CMP, 0, 2,
        JNE, 3,
        HLT
    ];

    let config = Config::default().with_trace(true).with_step_limit(100);
    let mut machine: Machine<_> = Machine::with_config(std::io::stdout(), config)?;
    machine.load(&bytes)?;
    machine.run()?;

    Ok(())
}
