//! test-shell: a minimal interactive shell for shell-harness scenario tests.
//!
//! Prints `test-shell> ` before each line when stdin is a terminal and
//! supports just enough to run the cd and history scenarios:
//!
//! - `cd [dir]` (defaults to `$HOME`)
//! - `pwd`
//! - `history` (numbered, oldest first, including the `history` line itself)
//! - `exit [code]`
//! - anything else runs as an external command found on `PATH`

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::process::{Command, ExitCode};

const PROMPT: &str = "test-shell> ";

enum Flow {
    Continue,
    Exit(u8),
}

fn main() -> ExitCode {
    let interactive = io::stdin().is_terminal();
    let mut history: Vec<String> = Vec::new();
    let mut lines = io::stdin().lock().lines();

    loop {
        if interactive {
            print!("{PROMPT}");
            let _ = io::stdout().flush();
        }

        let line = match lines.next() {
            None => return ExitCode::SUCCESS,
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("test-shell: read error: {e}");
                return ExitCode::FAILURE;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        history.push(line.to_string());

        if let Flow::Exit(code) = run_line(line, &history) {
            return ExitCode::from(code);
        }
    }
}

fn run_line(line: &str, history: &[String]) -> Flow {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&program, args)) = words.split_first() else {
        return Flow::Continue;
    };

    match program {
        "cd" => change_dir(args.first().copied()),
        "pwd" => match std::env::current_dir() {
            Ok(dir) => println!("{}", dir.display()),
            Err(e) => eprintln!("pwd: {e}"),
        },
        "history" => {
            for (i, entry) in history.iter().enumerate() {
                println!("{:>4} {entry}", i + 1);
            }
        }
        "exit" => {
            let code = args.first().and_then(|c| c.parse().ok()).unwrap_or(0);
            return Flow::Exit(code);
        }
        _ => run_external(program, args),
    }
    let _ = io::stdout().flush();
    Flow::Continue
}

fn change_dir(target: Option<&str>) {
    let dir = match target {
        Some(dir) => PathBuf::from(dir),
        None => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home),
            None => {
                eprintln!("cd: HOME not set");
                return;
            }
        },
    };
    if std::env::set_current_dir(&dir).is_err() {
        eprintln!("cd: {}: No such file or directory", dir.display());
    }
}

fn run_external(program: &str, args: &[&str]) {
    match Command::new(program).args(args).status() {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            eprintln!("{program}: command not found");
        }
        Err(e) => eprintln!("{program}: {e}"),
    }
}
