//! rvrun CLI — run and inspect riscv32imac Linux executables.

mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rvrun", version, about = "User-mode RV32 emulator")]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a statically linked riscv32 executable
    Run {
        /// Path to the guest executable
        program: PathBuf,
        /// Arguments passed to the guest
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
        /// Environment variable for the guest, as KEY=VALUE (repeatable)
        #[arg(long, value_name = "KEY=VALUE")]
        env: Vec<String>,
        /// Fail on syscalls outside the implemented set
        #[arg(long)]
        strict: bool,
        /// Configuration file (default: rvrun.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Disassemble the executable segments of a riscv32 ELF
    Disasm {
        /// Path to the guest executable
        program: PathBuf,
        /// Stop after this many instructions
        #[arg(long)]
        count: Option<usize>,
        /// Start at this address instead of the segment start
        #[arg(long, value_parser = parse_hex)]
        start: Option<u32>,
    },
    /// Work with target specification files
    Target {
        #[command(subcommand)]
        action: TargetAction,
    },
}

#[derive(Subcommand)]
enum TargetAction {
    /// Print the built-in riscv32imac-unknown-linux-gnu spec as JSON
    Print {
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Validate a target specification file
    Validate {
        /// Path to a target spec JSON file
        path: PathBuf,
    },
}

fn parse_hex(s: &str) -> Result<u32, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "rvrun=debug,rv_vm=debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Run {
            program,
            args,
            env,
            strict,
            config,
        } => {
            let mut cfg = config::load(config.as_deref())?;
            cfg.run.env.extend(env);
            cfg.run.strict |= strict;
            commands::run::run(&program, &args, &cfg)
        }
        Commands::Disasm {
            program,
            count,
            start,
        } => {
            commands::disasm::run(&program, count, start)?;
            Ok(0)
        }
        Commands::Target { action } => match action {
            TargetAction::Print { output } => {
                commands::target::print(output.as_deref())?;
                Ok(0)
            }
            TargetAction::Validate { path } => commands::target::validate(&path),
        },
    }
}
