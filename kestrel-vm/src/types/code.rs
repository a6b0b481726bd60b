//! Bytecode objects.

use std::fmt::Write as _;
use std::sync::Arc;

use kestrel_asm::Instructions;

use crate::error::Thrown;
use crate::interpreter::Vm;
use crate::lexer::{Source, Token};
use crate::types::{core, CoreTypes};
use crate::value::{Payload, Value};

/// A compiled unit: instruction stream, constant pool, and the
/// per-instruction source tokens used for diagnostics.
#[derive(Debug)]
pub struct Code {
    /// Human-readable name (`<module>`, function name, `<expr>`).
    pub name: String,
    /// Encoded instruction stream.
    pub bc: Vec<u8>,
    /// Constant pool.
    pub consts: Vec<Value>,
    /// `(instruction offset, source token)` pairs, offset-ascending.
    pub tokens: Vec<(u32, Token)>,
    /// The source this unit was compiled from.
    pub src: Arc<Source>,
}

impl Code {
    /// Source token of the instruction at `offset`, the nearest recorded
    /// one at or before it.
    pub fn token_at(&self, offset: u32) -> Option<Token> {
        match self.tokens.binary_search_by_key(&offset, |&(o, _)| o) {
            Ok(i) => Some(self.tokens[i].1),
            Err(0) => None,
            Err(i) => Some(self.tokens[i - 1].1),
        }
    }

    /// Disassembly listing, one instruction per line.
    pub fn dis(&self) -> String {
        let mut out = String::new();
        for item in Instructions::new(&self.bc) {
            match item {
                Ok((off, instr)) => {
                    let _ = writeln!(out, "{off:6}  {instr}");
                }
                Err(e) => {
                    let _ = writeln!(out, "        <decode error: {e}>");
                    break;
                }
            }
        }
        out
    }
}

fn code_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Code(c)) => Ok(Value::str(format!("<code '{}'>", c.name))),
        _ => Err(vm.throw(&core().type_error, "expected a 'code' receiver")),
    }
}

pub(crate) fn init(c: &CoreTypes) {
    let t = &c.code;
    t.define("__str__", "code.__str__(self)", code_str);
    t.define("__repr__", "code.__repr__(self)", code_str);

    let m = &c.module;
    m.define("__str__", "module.__str__(self)", module_str);
    m.define("__repr__", "module.__repr__(self)", module_str);
}

fn module_str(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    match args.first().map(Value::payload) {
        Some(Payload::Module(m)) => Ok(Value::str(format!(
            "<module '{}'>",
            m.name.as_str().unwrap_or("?")
        ))),
        _ => Err(vm.throw(&core().type_error, "expected a 'module' receiver")),
    }
}
