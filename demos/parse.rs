use color_eyre::eyre::Result;

use ls8::machine::Machine;
use ls8::memory::parse;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().init()?; // logging

    let bytes = parse::from_file("demos/programs/sctest.ls8")?;
    let mut machine = Machine::new(std::io::stdout());
    machine.load(&bytes)?;
    machine.memory().dump();

    machine.run()?;

    Ok(())
}
