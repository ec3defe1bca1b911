use std::io;
use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use log::LevelFilter;
use simple_logger::SimpleLogger;

use ls8::config::{Config, REGISTER_COUNT, STACK_START};
use ls8::machine::Machine;
use ls8::memory::{parse, Word};

/// Runs an LS-8 program
#[derive(Debug, Parser)]
#[command(name = "ls8", version)]
struct Args {
    /// Program file, one binary byte per line
    program: PathBuf,

    /// Log a trace line before every instruction
    #[arg(long)]
    trace: bool,

    /// Log a hex dump of memory after loading
    #[arg(long)]
    dump: bool,

    /// Stop with an error after this many instructions
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,

    /// Number of registers
    #[arg(long, default_value_t = REGISTER_COUNT)]
    registers: usize,

    /// Initial stack pointer
    #[arg(long, default_value_t = STACK_START)]
    stack_start: Word,

    /// More log output, repeat for more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn level(&self) -> LevelFilter {
        if self.trace {
            return LevelFilter::Trace;
        }

        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    fn config(&self) -> Config {
        let config = Config::new()
            .with_registers(self.registers)
            .with_stack_start(self.stack_start)
            .with_trace(self.trace);

        match self.max_steps {
            Some(limit) => config.with_step_limit(limit),
            None => config,
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    let args = Args::parse();

    SimpleLogger::new()
        .with_level(args.level())
        .init()
        .wrap_err("Failed to initialize logging")?;

    let program = parse::from_file(&args.program)?;

    let mut machine: Machine<_> = Machine::with_config(io::stdout(), args.config())?;
    machine
        .load(&program)
        .wrap_err_with(|| format!("Failed to load `{}`", args.program.display()))?;
    if args.dump {
        machine.memory().dump();
    }

    machine.run().wrap_err("Execution stopped")?;

    Ok(())
}
