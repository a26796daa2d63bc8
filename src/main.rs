use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use fxhash::FxHashMap;
use miette::{IntoDiagnostic, Result};

use vesper::lexer::tokenize;
use vesper::preprocess::preprocess;
use vesper::{error, Program, RunState};

/// Vesper is a small register VM and interpreter for hand-written assembly.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.vm` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble and execute a `.vm` source file
    Run {
        /// `.vm` file to run
        name: PathBuf,
    },
    /// Assemble a `.vm` source file and report diagnostics without running
    Check {
        /// File to check
        name: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Some(Command::Run { name }) => run(&name),
        Some(Command::Check { name }) => check(&name),
        None => match args.path {
            Some(path) => run(&path),
            None => {
                println!("~ vesper v{VERSION} ~");
                println!("{SHORT_INFO}");
                Ok(())
            }
        },
    }
}

fn run(path: &Path) -> Result<()> {
    let program = assemble(path)?;
    eprintln!("{:>12} {}", "Running".green().bold(), path.display());
    let mut state = RunState::new(program);
    state.run()?;
    eprintln!("{:>12} {}", "Completed".green().bold(), path.display());
    Ok(())
}

fn check(path: &Path) -> Result<()> {
    let _ = assemble(path)?;
    eprintln!("{:>12} with 0 errors", "Finished".green().bold());
    Ok(())
}

fn assemble(path: &Path) -> Result<Program> {
    eprintln!("{:>12} {}", "Assembling".green().bold(), path.display());
    let source = read_source(path)?;

    let mut defines = FxHashMap::default();
    let source = preprocess(source, &mut defines)?;
    let lines = tokenize(&source, &defines);
    Program::build(&lines, &source)
}

/// Read the source file, retrying a bare name with a `.vm` extension.
fn read_source(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(source) => Ok(source),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let mut with_ext = path.as_os_str().to_owned();
            with_ext.push(".vm");
            fs::read_to_string(Path::new(&with_ext)).map_err(|_| error::file_not_found(path))
        }
        Err(e) => Err(e).into_diagnostic(),
    }
}

const SHORT_INFO: &str = r"
An interpreter for a small assembly dialect: seventeen 32-bit registers,
a shared data/call stack, and the usual arithmetic, compare, and jump
instructions. Please use `-h` or `--help` for usage instructions.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
