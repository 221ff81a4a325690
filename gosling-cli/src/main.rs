//! Entrypoint for CLI
use std::{env, error::Error, fs, io::Write};

use gosling::prelude::*;
use log::error;

static USAGE: &str = r#"
usage: gosling CMD [FILE]

commands:
    run     Evaluate the target source file
    repl    Evaluate lines read from standard input

examples:
    gosling run max.gos
    gosling repl
"#;

fn run_file(filepath: impl AsRef<str>) -> Result<(), Box<dyn Error>> {
    let source = fs::read_to_string(filepath.as_ref())?;

    let mut interp = Interp::new();
    match interp.eval(&source) {
        Ok(Some(value)) => println!("{value}"),
        Ok(None) => {}
        Err(err) => {
            error!("{err}");
            std::process::exit(1)
        }
    }

    Ok(())
}

fn run_repl() -> Result<(), Box<dyn Error>> {
    let mut interp = Interp::new();
    let stdin = std::io::stdin();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match interp.eval(&line) {
            Ok(Some(value)) => println!("{value}"),
            Ok(None) => {}
            Err(err) => error!("{err}"),
        }
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    match parse_args() {
        Some(Cmd::Run { filepath }) => run_file(filepath)?,
        Some(Cmd::Repl) => run_repl()?,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(cmd) => match cmd.as_str() {
            "run" => Some(Cmd::Run {
                filepath: args.next()?,
            }),
            "repl" => Some(Cmd::Repl),
            _ => None,
        },
        None => None,
    }
}

fn print_usage() {
    println!("{USAGE}");
}

enum Cmd {
    /// Evaluate a file
    Run { filepath: String },
    /// Interactive session
    Repl,
}
