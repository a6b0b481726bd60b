//! `ks` — run kestrel programs.
//!
//! `ks [options] file [args…]`, `ks [options] -e 'EXPR' [args…]`, or
//! `ks -` to read the program from standard input (interactively when
//! stdin is a terminal).

use std::io::{BufRead, IsTerminal, Read, Write};
use std::process::ExitCode;

use clap::Parser;

use kestrel_vm::error::{render, Thrown};
use kestrel_vm::machine::Machine;

#[derive(Debug, Parser)]
#[command(
    name = "ks",
    version,
    about = "The kestrel scripting language",
    arg_required_else_help = false
)]
struct Args {
    /// Execute EXPR as the script body.
    #[arg(short = 'e', long = "expr", value_name = "EXPR")]
    expr: Option<String>,

    /// Increase log verbosity (repeat for more: -v, -vv, -vvv).
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Script file to run, or '-' for standard input.
    file: Option<String>,

    /// Arguments exposed to the script as `__argv__`.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(thrown: &Thrown) {
    let _ = write!(std::io::stderr(), "{}", render(thrown));
}

fn repl(machine: &std::sync::Arc<Machine>) -> ExitCode {
    let stdin = std::io::stdin();
    let globals = machine.base_globals();
    let mut line = String::new();
    loop {
        print!("ks> ");
        let _ = std::io::stdout().flush();
        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {}
            Err(_) => return ExitCode::FAILURE,
        }
        if line.trim().is_empty() {
            continue;
        }
        match machine.exec_source_in("<stdin>", &line, &globals) {
            Ok(v) if !v.is_none() => {
                match machine.exec_repr(&v) {
                    Ok(text) => println!("{text}"),
                    Err(thrown) => report(&thrown),
                }
            }
            Ok(_) => {}
            Err(thrown) => report(&thrown),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let machine = Machine::new();

    if let Some(expr) = &args.expr {
        let mut argv = vec!["<expr>".to_owned()];
        argv.extend(args.file.iter().cloned());
        argv.extend(args.args.iter().cloned());
        machine.set_argv(&argv);
        return match machine.exec_source("<expr>", expr) {
            Ok(_) => ExitCode::SUCCESS,
            Err(thrown) => {
                report(&thrown);
                ExitCode::FAILURE
            }
        };
    }

    let Some(file) = &args.file else {
        eprintln!("usage: ks [options] FILE [args...]  (see --help)");
        return ExitCode::FAILURE;
    };

    let mut argv = vec![file.clone()];
    argv.extend(args.args.iter().cloned());
    machine.set_argv(&argv);

    if file == "-" {
        if std::io::stdin().is_terminal() {
            return repl(&machine);
        }
        let mut text = String::new();
        if std::io::stdin().read_to_string(&mut text).is_err() {
            eprintln!("error: could not read standard input");
            return ExitCode::FAILURE;
        }
        return match machine.exec_source("<stdin>", &text) {
            Ok(_) => ExitCode::SUCCESS,
            Err(thrown) => {
                report(&thrown);
                ExitCode::FAILURE
            }
        };
    }

    let text = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: could not read '{file}': {e}");
            return ExitCode::FAILURE;
        }
    };
    match machine.exec_source(file, &text) {
        Ok(_) => ExitCode::SUCCESS,
        Err(thrown) => {
            report(&thrown);
            ExitCode::FAILURE
        }
    }
}
