//! The stack virtual machine.
//!
//! Each thread owns a [`Vm`]: a value stack of owned references and a
//! stack of call [`Frame`]s. The loop fetches an opcode, decodes its
//! payload, advances the program counter and executes. Script-level
//! calls push frames inside the same loop; native calls recurse into
//! host code. A failure carries a [`Thrown`] up through handler stacks,
//! truncating the value stack to the handler's recorded depth and
//! resuming at its program counter, or popping frames until the run's
//! entry depth is reached.

use std::sync::Arc;

use kestrel_asm::Instruction;

use crate::consts::MAX_CALL_DEPTH;
use crate::error::{new_error, Thrown, TraceFrame};
use crate::machine::Machine;
use crate::object::Type;
use crate::ops;
use crate::types::code::Code;
use crate::types::core;
use crate::types::func::Func;
use crate::value::{Payload, Value};

/// One pending exception handler: where to resume, and how deep the
/// value stack was when the handler was installed.
#[derive(Debug, Clone, Copy)]
pub struct Handler {
    /// Absolute resume offset in the owning code object.
    pub pc: usize,
    /// Value-stack depth to restore before resuming.
    pub stack_depth: usize,
}

/// A pending call.
pub struct Frame {
    /// The function being executed, when there is one.
    pub func: Option<Value>,
    /// Display name for tracebacks.
    pub name: String,
    /// The code being interpreted.
    pub code: Arc<Code>,
    /// Local variables (a dict value).
    pub locals: Value,
    /// Module globals of this frame (a dict value).
    pub globals: Value,
    /// Enclosing locals dictionaries, innermost first.
    pub closure: Vec<Value>,
    /// Offset of the next instruction.
    pub pc: usize,
    /// Offset of the instruction currently executing.
    pub last_off: u32,
    /// Value-stack depth on frame entry.
    pub stack_base: usize,
    /// Active exception handlers, innermost last.
    pub handlers: Vec<Handler>,
}

/// Per-thread interpreter state.
pub struct Vm {
    /// The owning runtime.
    pub machine: Arc<Machine>,
    /// Value stack; every entry is an owned reference.
    pub stack: Vec<Value>,
    /// Call-frame stack.
    pub frames: Vec<Frame>,
    /// Native recursion depth (guards host-side call nesting).
    pub depth: usize,
}

impl Vm {
    /// Fresh interpreter state for one thread of `machine`.
    pub fn new(machine: Arc<Machine>) -> Vm {
        Vm {
            machine,
            stack: Vec::new(),
            frames: Vec::new(),
            depth: 0,
        }
    }

    /// Snapshot of the current call stack, outermost first.
    pub fn snapshot(&self) -> Vec<TraceFrame> {
        self.frames
            .iter()
            .map(|fr| TraceFrame {
                name: fr.name.clone(),
                src: Some(fr.code.src.clone()),
                tok: fr.code.token_at(fr.last_off),
            })
            .collect()
    }

    /// Build a thrown error of `kind` with the current stack captured.
    pub fn throw(&self, kind: &Type, what: impl Into<String>) -> Thrown {
        Thrown::new(new_error(kind, what), self.snapshot())
    }

    /// Throw an arbitrary value.
    pub fn throw_value(&self, value: Value) -> Thrown {
        Thrown::new(value, self.snapshot())
    }
}

enum Flow {
    Continue,
    Return(Value),
}

fn underflow(vm: &Vm) -> Thrown {
    vm.throw(&core().internal_error, "value stack underflow")
}

fn pop(vm: &mut Vm) -> Result<Value, Thrown> {
    vm.stack.pop().ok_or_else(|| underflow(vm))
}

fn split_args(vm: &mut Vm, n: usize) -> Result<Vec<Value>, Thrown> {
    if vm.stack.len() < n {
        return Err(underflow(vm));
    }
    Ok(vm.stack.split_off(vm.stack.len() - n))
}

fn const_at(vm: &Vm, idx: u32) -> Result<Value, Thrown> {
    let fr = vm.frames.last().expect("active frame");
    fr.code
        .consts
        .get(idx as usize)
        .cloned()
        .ok_or_else(|| vm.throw(&core().internal_error, "constant index out of range"))
}

fn name_at(vm: &Vm, idx: u32) -> Result<Value, Thrown> {
    let name = const_at(vm, idx)?;
    if name.as_str().is_some() {
        Ok(name)
    } else {
        Err(vm.throw(&core().internal_error, "name constant is not a string"))
    }
}

fn dict_get(dict: &Value, name: &str) -> Option<Value> {
    dict.as_dict().and_then(|t| t.read().get_str(name))
}

fn dict_set(dict: &Value, name: &str, val: Value) {
    if let Some(t) = dict.as_dict() {
        t.write().insert_str(name, val);
    }
}

/// Resolve `name`: frame locals → closure chain → module globals →
/// process builtins.
fn lookup(vm: &Vm, name: &str) -> Option<Value> {
    let fr = vm.frames.last()?;
    if let Some(v) = dict_get(&fr.locals, name) {
        return Some(v);
    }
    for enclosing in &fr.closure {
        if let Some(v) = dict_get(enclosing, name) {
            return Some(v);
        }
    }
    if let Some(v) = dict_get(&fr.globals, name) {
        return Some(v);
    }
    dict_get(&vm.machine.builtins, name)
}

/// Re-bind a compiled-function prototype with the loading frame's
/// environment, which is what gives lexical capture.
fn bind_function_const(vm: &Vm, proto: &Value) -> Value {
    let Some(Func::Compiled(cf)) = proto.as_func() else {
        return proto.clone();
    };
    let fr = vm.frames.last().expect("active frame");
    let mut closure = Vec::with_capacity(fr.closure.len() + 1);
    closure.push(fr.locals.clone());
    closure.extend(fr.closure.iter().cloned());
    Value::func(Func::Compiled(crate::types::func::CompiledFunc {
        name: cf.name.clone(),
        code: cf.code.clone(),
        params: cf.params.clone(),
        closure,
        globals: Some(fr.globals.clone()),
    }))
}

fn jump(vm: &mut Vm, next_pc: usize, rel: i32) -> Result<(), Thrown> {
    let target = next_pc as i64 + rel as i64;
    let limit = vm.frames.last().expect("active frame").code.bc.len() as i64;
    if target < 0 || target > limit {
        return Err(vm.throw(&core().internal_error, "jump target out of range"));
    }
    vm.frames.last_mut().expect("active frame").pc = target as usize;
    Ok(())
}

fn step(vm: &mut Vm) -> Result<Flow, Thrown> {
    let off;
    let instr;
    {
        let fr = vm.frames.last().expect("active frame");
        off = fr.pc;
        instr = match Instruction::decode(&fr.code.bc, off) {
            Ok(i) => i,
            Err(e) => {
                return Err(vm.throw(
                    &core().internal_error,
                    format!("bytecode decode failure: {e}"),
                ))
            }
        };
    }
    let next_pc = off + instr.size();
    {
        let fr = vm.frames.last_mut().expect("active frame");
        fr.last_off = off as u32;
        fr.pc = next_pc;
    }
    tracing::trace!(offset = off, "exec {instr}");

    use Instruction::*;
    match instr {
        Noop => {}

        Const(idx) => {
            let v = const_at(vm, idx)?;
            let v = if matches!(v.payload(), Payload::Func(Func::Compiled(_))) {
                bind_function_const(vm, &v)
            } else {
                v
            };
            vm.stack.push(v);
        }
        ConstTrue => vm.stack.push(Value::bool_(true)),
        ConstFalse => vm.stack.push(Value::bool_(false)),
        ConstNone => vm.stack.push(Value::none()),

        Popu => {
            pop(vm)?;
        }

        Load(idx) => {
            let name = name_at(vm, idx)?;
            let name = name.as_str().expect("checked");
            match lookup(vm, name) {
                Some(v) => vm.stack.push(v),
                None => {
                    return Err(vm.throw(
                        &core().error,
                        format!("use of undeclared variable '{name}'"),
                    ))
                }
            }
        }
        LoadAttr(idx) => {
            let name = name_at(vm, idx)?;
            let obj = pop(vm)?;
            let v = ops::getattr(vm, &obj, name.as_str().expect("checked"))?;
            vm.stack.push(v);
        }
        Store(idx) => {
            let name = name_at(vm, idx)?;
            let val = vm.stack.last().cloned().ok_or_else(|| underflow(vm))?;
            let locals = vm.frames.last().expect("active frame").locals.clone();
            dict_set(&locals, name.as_str().expect("checked"), val);
        }
        StoreAttr(idx) => {
            let name = name_at(vm, idx)?;
            let val = pop(vm)?;
            let obj = pop(vm)?;
            ops::setattr(vm, &obj, name.as_str().expect("checked"), val.clone())?;
            vm.stack.push(val);
        }

        Call(n) => {
            if n == 0 {
                return Err(vm.throw(&core().internal_error, "call with no callable"));
            }
            let mut args = split_args(vm, n as usize)?;
            let callable = args.remove(0);
            if matches!(callable.payload(), Payload::Func(Func::Compiled(_))) {
                push_frame(vm, &callable, args)?;
            } else {
                let out = ops::call(vm, &callable, args)?;
                vm.stack.push(out);
            }
        }
        GetItem(n) => {
            let args = split_args(vm, n as usize)?;
            if args.is_empty() {
                return Err(vm.throw(&core().internal_error, "subscript with no target"));
            }
            let out = ops::getitem(vm, &args)?;
            vm.stack.push(out);
        }
        SetItem(n) => {
            let args = split_args(vm, n as usize)?;
            if args.len() < 2 {
                return Err(vm.throw(&core().internal_error, "subscript assignment too short"));
            }
            let out = ops::setitem(vm, &args)?;
            vm.stack.push(out);
        }
        Tuple(n) => {
            let elems = split_args(vm, n as usize)?;
            vm.stack.push(Value::tuple(elems));
        }
        List(n) => {
            let elems = split_args(vm, n as usize)?;
            vm.stack.push(Value::list(elems));
        }

        Add | Sub | Mul | Div | Mod | Pow | Lt | Le | Gt | Ge | Eq | Ne => {
            let r = pop(vm)?;
            let l = pop(vm)?;
            let op = match instr {
                Add => ops::BinOp::Add,
                Sub => ops::BinOp::Sub,
                Mul => ops::BinOp::Mul,
                Div => ops::BinOp::Div,
                Mod => ops::BinOp::Mod,
                Pow => ops::BinOp::Pow,
                Lt => ops::BinOp::Lt,
                Le => ops::BinOp::Le,
                Gt => ops::BinOp::Gt,
                Ge => ops::BinOp::Ge,
                Eq => ops::BinOp::Eq,
                Ne => ops::BinOp::Ne,
                _ => unreachable!("filtered by the arm"),
            };
            let out = ops::binary(vm, op, &l, &r)?;
            vm.stack.push(out);
        }

        Jmp(rel) => jump(vm, next_pc, rel)?,
        Jmpt(rel) => {
            let v = pop(vm)?;
            if ops::truthy(vm, &v)? {
                jump(vm, next_pc, rel)?;
            }
        }
        Jmpf(rel) => {
            let v = pop(vm)?;
            if !ops::truthy(vm, &v)? {
                jump(vm, next_pc, rel)?;
            }
        }

        Ret => return Ok(Flow::Return(pop(vm)?)),
        RetNone => return Ok(Flow::Return(Value::none())),

        ExcAdd(abs) => {
            let depth = vm.stack.len();
            let fr = vm.frames.last_mut().expect("active frame");
            fr.handlers.push(Handler {
                pc: abs as usize,
                stack_depth: depth,
            });
        }
        ExcRem => {
            let fr = vm.frames.last_mut().expect("active frame");
            if fr.handlers.pop().is_none() {
                return Err(vm.throw(&core().internal_error, "handler stack underflow"));
            }
        }
    }
    Ok(Flow::Continue)
}

/// Push a frame for a compiled function, binding its parameters.
pub(crate) fn push_frame(vm: &mut Vm, fval: &Value, args: Vec<Value>) -> Result<(), Thrown> {
    let Some(Func::Compiled(cf)) = fval.as_func() else {
        return Err(vm.throw(&core().internal_error, "expected a compiled function"));
    };
    if vm.frames.len() >= MAX_CALL_DEPTH {
        return Err(vm.throw(&core().internal_error, "call stack overflow"));
    }
    if args.len() != cf.params.len() {
        return Err(vm.throw(
            &core().arg_error,
            format!(
                "function '{}' takes {} argument(s), got {}",
                cf.name,
                cf.params.len(),
                args.len()
            ),
        ));
    }

    let locals = Value::dict();
    if let Some(t) = locals.as_dict() {
        let mut t = t.write();
        for (param, arg) in cf.params.iter().zip(args) {
            t.insert_str(param, arg);
        }
    }
    let globals = cf
        .globals
        .clone()
        .or_else(|| vm.frames.last().map(|f| f.globals.clone()))
        .unwrap_or_else(Value::dict);

    vm.frames.push(Frame {
        func: Some(fval.clone()),
        name: cf.name.clone(),
        code: cf.code.clone(),
        locals,
        globals,
        closure: cf.closure.clone(),
        pc: 0,
        last_off: 0,
        stack_base: vm.stack.len(),
        handlers: Vec::new(),
    });
    Ok(())
}

/// Run frames above `entry_depth` until the frame pushed at that depth
/// returns or the exception escapes it.
pub(crate) fn run(vm: &mut Vm, entry_depth: usize) -> Result<Value, Thrown> {
    debug_assert!(vm.frames.len() > entry_depth);
    loop {
        match step(vm) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Return(v)) => {
                let fr = vm.frames.pop().expect("active frame");
                vm.stack.truncate(fr.stack_base);
                if vm.frames.len() == entry_depth {
                    return Ok(v);
                }
                vm.stack.push(v);
            }
            Err(thrown) => {
                // unwind: pop handlers and frames until one catches
                loop {
                    let fr = vm.frames.last_mut().expect("active frame");
                    if let Some(h) = fr.handlers.pop() {
                        fr.pc = h.pc;
                        vm.stack.truncate(h.stack_depth);
                        vm.stack.push(thrown.value.clone());
                        break;
                    }
                    let fr = vm.frames.pop().expect("active frame");
                    vm.stack.truncate(fr.stack_base);
                    if vm.frames.len() == entry_depth {
                        return Err(thrown);
                    }
                }
            }
        }
    }
}

/// Call a compiled function from host code.
pub(crate) fn call_compiled(vm: &mut Vm, fval: &Value, args: Vec<Value>) -> Result<Value, Thrown> {
    push_frame(vm, fval, args)?;
    run(vm, vm.frames.len() - 1)
}

/// Call a bare code object: module semantics, locals are the globals.
pub(crate) fn call_code(vm: &mut Vm, cval: &Value) -> Result<Value, Thrown> {
    let code = cval
        .as_code()
        .cloned()
        .ok_or_else(|| vm.throw(&core().internal_error, "expected a code object"))?;
    let globals = vm
        .frames
        .last()
        .map(|f| f.globals.clone())
        .unwrap_or_else(Value::dict);
    run_code(vm, code, globals)
}

/// Execute `code` at module level against `globals`.
pub fn run_code(vm: &mut Vm, code: Arc<Code>, globals: Value) -> Result<Value, Thrown> {
    if vm.frames.len() >= MAX_CALL_DEPTH {
        return Err(vm.throw(&core().internal_error, "call stack overflow"));
    }
    vm.frames.push(Frame {
        func: None,
        name: code.name.clone(),
        code,
        locals: globals.clone(),
        globals,
        closure: Vec::new(),
        pc: 0,
        last_off: 0,
        stack_base: vm.stack.len(),
        handlers: Vec::new(),
    });
    run(vm, vm.frames.len() - 1)
}
