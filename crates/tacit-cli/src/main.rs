use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use tacit::{Repl, StdPrint, TacitError};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--help" | "-h") => {
            eprintln!("usage: tacit [file.tacit]");
            eprintln!("With no file, starts an interactive REPL.");
            ExitCode::SUCCESS
        }
        Some(path) => run_file(path),
        None => run_repl(),
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read {path}: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut repl = Repl::new();
    match repl.feed(&source, &mut StdPrint) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_repl() -> ExitCode {
    let mut repl = Repl::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("tacit> ");
        let _ = io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
            None => return ExitCode::SUCCESS,
        };
        if line.trim().is_empty() {
            continue;
        }
        match repl.feed(&line, &mut StdPrint) {
            Ok(()) => {
                let stack = repl.stack();
                if stack.is_empty() {
                    println!("ok");
                } else {
                    let rendered: Vec<String> = stack.iter().map(ToString::to_string).collect();
                    println!("ok  [{}]", rendered.join(" "));
                }
            }
            Err(TacitError::Parse(err)) => eprintln!("parse error: {err}"),
            Err(TacitError::Run(err)) => eprintln!("runtime error: {err}"),
        }
    }
}
