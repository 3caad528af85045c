use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use loxide::interpreter::Interpreter;

use anyhow::Context;
use clap::Parser as ClapParser;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Lox source file to execute; starts a REPL when omitted.
    script: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.script {
        Some(path) => run_file(path),

        None => run_prompt(),
    }
}

fn run_file(path: PathBuf) -> anyhow::Result<()> {
    let source: Vec<u8> =
        fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut interpreter: Interpreter<io::Stdout> = Interpreter::new(io::stdout());

    if let Err(errors) = interpreter.run(&source) {
        let mut runtime_failure: bool = false;

        for e in &errors {
            eprintln!("{}", e);

            runtime_failure |= !e.is_static();
        }

        std::process::exit(if runtime_failure { 70 } else { 65 });
    }

    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut interpreter: Interpreter<io::Stdout> = Interpreter::new(io::stdout());

    let mut input: String = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        input.clear();
        let nbytes: usize = stdin.lock().read_line(&mut input)?;
        if nbytes == 0 {
            break;
        }

        // Errors are reported and the session continues; definitions and
        // other side effects from earlier lines stay live.
        if let Err(errors) = interpreter.run(input.as_bytes()) {
            for e in errors {
                eprintln!("{}", e);
            }
        }
    }

    Ok(())
}
