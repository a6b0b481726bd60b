//! Engine-level tests: whole programs through the frontend and the
//! interpreter, against capturing machines.

use std::sync::Arc;

use crate::error::Thrown;
use crate::machine::Machine;
use crate::value::Value;

mod containers;
mod errors;
mod exec;
mod numbers;
mod props;
mod threads;

/// Run a program on a capturing machine; returns (result, machine).
fn run(text: &str) -> (Result<Value, Thrown>, Arc<Machine>) {
    let m = Machine::capturing();
    let out = m.exec_source("<test>", text);
    (out, m)
}

/// Run a program and return what it printed.
fn output(text: &str) -> String {
    let (out, m) = run(text);
    if let Err(thrown) = &out {
        panic!(
            "program failed: {}\n{}",
            crate::error::render(thrown),
            text
        );
    }
    m.captured_output().unwrap_or_default()
}

/// Run a program expected to fail; returns the thrown error.
fn run_err(text: &str) -> Thrown {
    let (out, _m) = run(text);
    out.expect_err("program should have thrown")
}

/// Run a program and return its result value.
fn eval(text: &str) -> Value {
    let (out, _m) = run(text);
    match out {
        Ok(v) => v,
        Err(thrown) => panic!("program failed: {}", crate::error::render(&thrown)),
    }
}
