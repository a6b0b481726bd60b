//! Protocol operations over values: calling, operator dispatch,
//! conversion, attribute and item access, iteration.
//!
//! Every operation first takes the fast path its operands allow (the
//! numeric tower, payload-level truthiness and hashing) and otherwise
//! dispatches through the operand type's slot table. Method access binds
//! the instance by partial application, so `obj.method` is an ordinary
//! callable value.

use crate::consts::MAX_CALL_DEPTH;
use crate::error::Thrown;
use crate::interpreter::{self, Vm};
use crate::numeric;
use crate::object::{issub, SlotId};
use crate::types::core;
use crate::types::func::{self, Func};
use crate::types::iter as iter_mod;
use crate::value::{Payload, Value};

/// Binary operator selector, mirroring the instruction set plus the
/// protocol-only bitwise family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BinOr,
    BinAnd,
    BinXor,
    Lshift,
    Rshift,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl BinOp {
    const fn slot(self) -> SlotId {
        match self {
            BinOp::Add => SlotId::Add,
            BinOp::Sub => SlotId::Sub,
            BinOp::Mul => SlotId::Mul,
            BinOp::Div => SlotId::Div,
            BinOp::Mod => SlotId::Mod,
            BinOp::Pow => SlotId::Pow,
            BinOp::BinOr => SlotId::BinOr,
            BinOp::BinAnd => SlotId::BinAnd,
            BinOp::BinXor => SlotId::BinXor,
            BinOp::Lshift => SlotId::Lshift,
            BinOp::Rshift => SlotId::Rshift,
            BinOp::Lt => SlotId::Lt,
            BinOp::Le => SlotId::Le,
            BinOp::Gt => SlotId::Gt,
            BinOp::Ge => SlotId::Ge,
            BinOp::Eq => SlotId::Eq,
            BinOp::Ne => SlotId::Ne,
        }
    }

    /// Operator spelling for diagnostics.
    pub const fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::BinOr => "|",
            BinOp::BinAnd => "&",
            BinOp::BinXor => "^",
            BinOp::Lshift => "<<",
            BinOp::Rshift => ">>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
        }
    }

    const fn numeric_arith(self) -> Option<numeric::ArithOp> {
        Some(match self {
            BinOp::Add => numeric::ArithOp::Add,
            BinOp::Sub => numeric::ArithOp::Sub,
            BinOp::Mul => numeric::ArithOp::Mul,
            BinOp::Div => numeric::ArithOp::Div,
            BinOp::Mod => numeric::ArithOp::Mod,
            BinOp::Pow => numeric::ArithOp::Pow,
            _ => return None,
        })
    }

    const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Eq | BinOp::Ne
        )
    }
}

/// Unary operator selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UnOp {
    Pos,
    Neg,
    Abs,
    Sqig,
}

impl UnOp {
    const fn slot(self) -> SlotId {
        match self {
            UnOp::Pos => SlotId::Pos,
            UnOp::Neg => SlotId::Neg,
            UnOp::Abs => SlotId::Abs,
            UnOp::Sqig => SlotId::Sqig,
        }
    }
}

/// Whether `f` can be the target of a call.
pub fn is_callable(f: &Value) -> bool {
    match f.payload() {
        Payload::Func(_) | Payload::Type(_) | Payload::Code(_) => true,
        _ => f.ty().slot(SlotId::Call).is_some(),
    }
}

/// Call `f` with positional `args`.
pub fn call(vm: &mut Vm, f: &Value, args: Vec<Value>) -> Result<Value, Thrown> {
    if vm.depth >= MAX_CALL_DEPTH {
        return Err(vm.throw(&core().internal_error, "maximum call depth exceeded"));
    }
    vm.depth += 1;
    let out = call_inner(vm, f, args);
    vm.depth -= 1;
    out
}

fn call_inner(vm: &mut Vm, f: &Value, args: Vec<Value>) -> Result<Value, Thrown> {
    match f.payload() {
        Payload::Func(Func::Native(n)) => (n.func)(vm, &args),
        Payload::Func(Func::Compiled(_)) => interpreter::call_compiled(vm, f, args),
        Payload::Func(Func::Partial(p)) => {
            let spliced = func::splice(p, &args);
            let target = p.target.clone();
            call(vm, &target, spliced)
        }
        Payload::Type(_) => call_type(vm, f, &args),
        Payload::Code(_) => interpreter::call_code(vm, f),
        _ => match f.ty().slot(SlotId::Call) {
            Some(slot) => {
                let mut with_self = Vec::with_capacity(args.len() + 1);
                with_self.push(f.clone());
                with_self.extend(args);
                call(vm, &slot, with_self)
            }
            None => Err(vm.throw(
                &core().op_error,
                format!("'{}' object is not callable", f.type_name()),
            )),
        },
    }
}

/// Instantiate by calling a type: `new` then `init`.
fn call_type(vm: &mut Vm, tyval: &Value, args: &[Value]) -> Result<Value, Thrown> {
    let ty = tyval.as_type().expect("checked by caller").clone();
    let new = ty.slot(SlotId::New).ok_or_else(|| {
        vm.throw(
            &core().op_error,
            format!("type '{}' cannot be instantiated", ty.name()),
        )
    })?;

    let mut new_args = Vec::with_capacity(args.len() + 1);
    new_args.push(tyval.clone());
    new_args.extend_from_slice(args);
    let inst = call(vm, &new, new_args)?;

    if let Some(init) = ty.slot(SlotId::Init) {
        let mut init_args = Vec::with_capacity(args.len() + 1);
        init_args.push(inst.clone());
        init_args.extend_from_slice(args);
        call(vm, &init, init_args)?;
    }
    Ok(inst)
}

fn slot_of(v: &Value, id: SlotId) -> Option<Value> {
    v.ty().slot(id)
}

/// Operand pair of a binary native method.
pub fn operands<'v>(vm: &Vm, args: &'v [Value]) -> Result<(&'v Value, &'v Value), Thrown> {
    match args {
        [l, r, ..] => Ok((l, r)),
        _ => Err(vm.throw(&core().arg_error, "binary method takes two operands")),
    }
}

fn binop_undefined(vm: &Vm, op: BinOp, l: &Value, r: &Value) -> Thrown {
    vm.throw(
        &core().op_error,
        format!(
            "binary '{}' is not defined between '{}' and '{}'",
            op.symbol(),
            l.type_name(),
            r.type_name()
        ),
    )
}

/// Binary operator dispatch.
pub fn binary(vm: &mut Vm, op: BinOp, l: &Value, r: &Value) -> Result<Value, Thrown> {
    let both_numeric = numeric::is_number(l.payload()) && numeric::is_number(r.payload());

    if both_numeric {
        if let Some(arith) = op.numeric_arith() {
            return numeric::arith(vm, arith, l, r);
        }
        match op {
            BinOp::Eq => return Ok(Value::bool_(numeric::eq_numbers(l.payload(), r.payload()))),
            BinOp::Ne => return Ok(Value::bool_(!numeric::eq_numbers(l.payload(), r.payload()))),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                match numeric::cmp_numbers(l.payload(), r.payload()) {
                    Some(ord) => return Ok(Value::bool_(ord_matches(op, ord))),
                    None => return Err(binop_undefined(vm, op, l, r)),
                }
            }
            // the bitwise family has no numeric fast path; fall through
            // to slot dispatch
            _ => {}
        }
    }

    // slot dispatch: the left operand's type first, then the right's
    if let Some(slot) = slot_of(l, op.slot()).or_else(|| slot_of(r, op.slot())) {
        return call(vm, &slot, vec![l.clone(), r.clone()]);
    }

    if op.is_comparison() {
        // equality has a structural fallback; ordering derives from cmp
        match op {
            BinOp::Eq => return Ok(Value::bool_(l.equals(r))),
            BinOp::Ne => return Ok(Value::bool_(!l.equals(r))),
            _ => {}
        }
        if let Some(cmp) = slot_of(l, SlotId::Cmp).or_else(|| slot_of(r, SlotId::Cmp)) {
            let sign = call(vm, &cmp, vec![l.clone(), r.clone()])?;
            let sign = sign
                .as_i64()
                .ok_or_else(|| vm.throw(&core().type_error, "__cmp__ must return an integer"))?;
            let ord = sign.cmp(&0);
            return Ok(Value::bool_(ord_matches(op, ord)));
        }
    }

    Err(binop_undefined(vm, op, l, r))
}

fn ord_matches(op: BinOp, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        BinOp::Lt => ord == Less,
        BinOp::Le => ord != Greater,
        BinOp::Gt => ord == Greater,
        BinOp::Ge => ord != Less,
        BinOp::Eq => ord == Equal,
        BinOp::Ne => ord != Equal,
        _ => false,
    }
}

/// Unary operator dispatch.
pub fn unary(vm: &mut Vm, op: UnOp, v: &Value) -> Result<Value, Thrown> {
    if numeric::is_number(v.payload()) {
        let num_op = match op {
            UnOp::Pos => numeric::UnaryOp::Pos,
            UnOp::Neg => numeric::UnaryOp::Neg,
            UnOp::Abs => numeric::UnaryOp::Abs,
            UnOp::Sqig => numeric::UnaryOp::Sqig,
        };
        return numeric::unary(vm, num_op, v);
    }
    match slot_of(v, op.slot()) {
        Some(slot) => call(vm, &slot, vec![v.clone()]),
        None => Err(vm.throw(
            &core().op_error,
            format!("unary operator is not defined for '{}'", v.type_name()),
        )),
    }
}

/// Truthiness.
pub fn truthy(vm: &mut Vm, v: &Value) -> Result<bool, Thrown> {
    match v.payload() {
        Payload::Bool(b) => Ok(*b),
        Payload::None => Ok(false),
        Payload::Int(i) => Ok(i.sign() != 0),
        Payload::Float(f) => Ok(*f != 0.0),
        Payload::Complex { re, im } => Ok(*re != 0.0 || *im != 0.0),
        Payload::Str(s) => Ok(!s.text.is_empty()),
        Payload::Bytes(b) => Ok(!b.data.is_empty()),
        Payload::Tuple(t) => Ok(!t.is_empty()),
        Payload::List(l) => Ok(!l.read().is_empty()),
        Payload::Dict(d) => Ok(!d.read().is_empty()),
        Payload::Set(s) => Ok(!s.read().is_empty()),
        _ => match slot_of(v, SlotId::Bool) {
            Some(slot) => {
                let out = call(vm, &slot, vec![v.clone()])?;
                truthy(vm, &out)
            }
            None => Err(vm.throw(
                &core().type_error,
                format!("'{}' object could not be converted to bool", v.type_name()),
            )),
        },
    }
}

/// `str(v)` as a value.
pub fn str_of(vm: &mut Vm, v: &Value) -> Result<Value, Thrown> {
    if matches!(v.payload(), Payload::Str(_)) {
        return Ok(v.clone());
    }
    match slot_of(v, SlotId::Str) {
        Some(slot) => {
            let out = call(vm, &slot, vec![v.clone()])?;
            if out.as_str().is_some() {
                Ok(out)
            } else {
                Err(vm.throw(
                    &core().type_error,
                    format!("__str__ of '{}' did not return a str", v.type_name()),
                ))
            }
        }
        None => Ok(Value::str(format!(
            "<'{}' obj @ {:#x}>",
            v.type_name(),
            v.addr()
        ))),
    }
}

/// `str(v)` as a host string.
pub fn str_string(vm: &mut Vm, v: &Value) -> Result<String, Thrown> {
    Ok(str_of(vm, v)?.as_str().unwrap_or_default().to_owned())
}

/// `repr(v)` as a value.
pub fn repr_of(vm: &mut Vm, v: &Value) -> Result<Value, Thrown> {
    match slot_of(v, SlotId::Repr) {
        Some(slot) => {
            let out = call(vm, &slot, vec![v.clone()])?;
            if out.as_str().is_some() {
                Ok(out)
            } else {
                Err(vm.throw(
                    &core().type_error,
                    format!("__repr__ of '{}' did not return a str", v.type_name()),
                ))
            }
        }
        None => str_of(vm, v),
    }
}

/// `repr(v)` as a host string.
pub fn repr_string(vm: &mut Vm, v: &Value) -> Result<String, Thrown> {
    Ok(repr_of(vm, v)?.as_str().unwrap_or_default().to_owned())
}

/// Content hash with slot fallback for user types.
pub fn hash_of(vm: &mut Vm, v: &Value) -> Result<u64, Thrown> {
    if let Some(h) = v.builtin_hash() {
        return Ok(h);
    }
    match slot_of(v, SlotId::Hash) {
        Some(slot) => {
            let out = call(vm, &slot, vec![v.clone()])?;
            out.builtin_hash().ok_or_else(|| {
                vm.throw(&core().type_error, "__hash__ must return a hashable value")
            })
        }
        None => Err(vm.throw(
            &core().type_error,
            format!("'{}' object is unhashable", v.type_name()),
        )),
    }
}

/// `len(v)`.
pub fn len_of(vm: &mut Vm, v: &Value) -> Result<i64, Thrown> {
    let fast = match v.payload() {
        Payload::Str(s) => Some(s.text.len()),
        Payload::Bytes(b) => Some(b.data.len()),
        Payload::Tuple(t) => Some(t.len()),
        Payload::List(l) => Some(l.read().len()),
        Payload::Dict(d) => Some(d.read().len()),
        Payload::Set(s) => Some(s.read().len()),
        _ => None,
    };
    if let Some(n) = fast {
        return Ok(n as i64);
    }
    match slot_of(v, SlotId::Len) {
        Some(slot) => {
            let out = call(vm, &slot, vec![v.clone()])?;
            out.as_i64()
                .ok_or_else(|| vm.throw(&core().type_error, "__len__ must return an integer"))
        }
        None => Err(vm.throw(
            &core().type_error,
            format!("'{}' object has no length", v.type_name()),
        )),
    }
}

fn attr_error(vm: &Vm, obj: &Value, name: &str) -> Thrown {
    vm.throw(
        &core().attr_error,
        format!("'{}' object has no attribute '{}'", obj.type_name(), name),
    )
}

/// Last resort of an attribute miss: a type-level `getattr` hook, called
/// with `(obj, name)`.
fn getattr_hook(vm: &mut Vm, obj: &Value, name: &str) -> Result<Value, Thrown> {
    match slot_of(obj, SlotId::GetAttr) {
        Some(slot) => call(vm, &slot, vec![obj.clone(), Value::str(name)]),
        None => Err(attr_error(vm, obj, name)),
    }
}

/// Attribute lookup: instance dictionary, then the type's (binding
/// callables to the instance as partials), then the `getattr` hook.
pub fn getattr(vm: &mut Vm, obj: &Value, name: &str) -> Result<Value, Thrown> {
    match obj.payload() {
        Payload::Type(ty) => {
            return match name {
                "__name__" => Ok(Value::str(ty.name())),
                "__parents__" => Ok(Value::list(
                    ty.parents().into_iter().map(Value::type_value).collect(),
                )),
                _ => match ty.attr(name) {
                    Some(v) => Ok(v),
                    None => getattr_hook(vm, obj, name),
                },
            };
        }
        Payload::Module(m) => {
            if let Some(t) = m.attrs.as_dict() {
                if let Some(v) = t.read().get_str(name) {
                    return Ok(v);
                }
            }
            return getattr_hook(vm, obj, name);
        }
        Payload::Complex { re, im } => match name {
            "real" => return Ok(Value::float(*re)),
            "imag" => return Ok(Value::float(*im)),
            _ => {}
        },
        Payload::EnumVal(ev) => match name {
            "name" => return Ok(ev.name.clone()),
            "value" => return Ok(ev.value.clone()),
            _ => {}
        },
        Payload::Instance(attrs) => {
            if let Some(v) = attrs.read().get_str(name) {
                return Ok(v);
            }
        }
        _ => {}
    }

    match obj.ty().attr(name) {
        Some(entry) if is_callable(&entry) => Ok(func::bind_method(entry, obj.clone())),
        Some(entry) => Ok(entry),
        None => getattr_hook(vm, obj, name),
    }
}

/// Attribute write: the instance's dictionary, or the type's for type
/// values. Anything else dispatches the type-level `setattr` hook with
/// `(obj, name, val)`, and rejects the write when there is none.
pub fn setattr(vm: &mut Vm, obj: &Value, name: &str, val: Value) -> Result<(), Thrown> {
    match obj.payload() {
        Payload::Type(ty) => {
            ty.set_attr(name, val);
            Ok(())
        }
        Payload::Module(m) => {
            if let Some(t) = m.attrs.as_dict() {
                t.write().insert_str(name, val);
                Ok(())
            } else {
                Err(attr_error(vm, obj, name))
            }
        }
        Payload::Instance(attrs) => {
            attrs.write().insert_str(name, val);
            Ok(())
        }
        _ => match slot_of(obj, SlotId::SetAttr) {
            Some(slot) => {
                call(vm, &slot, vec![obj.clone(), Value::str(name), val])?;
                Ok(())
            }
            None => Err(vm.throw(
                &core().attr_error,
                format!(
                    "cannot set attribute '{}' on a '{}' object",
                    name,
                    obj.type_name()
                ),
            )),
        },
    }
}

/// Subscript read; `args[0]` is the target, the rest index it.
pub fn getitem(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let target = args
        .first()
        .ok_or_else(|| vm.throw(&core().arg_error, "subscript takes a target"))?;
    match slot_of(target, SlotId::GetItem) {
        Some(slot) => call(vm, &slot, args.to_vec()),
        None => Err(vm.throw(
            &core().type_error,
            format!("'{}' object is not subscriptable", target.type_name()),
        )),
    }
}

/// Subscript write; `args` is `(target, indices…, value)`. The assigned
/// value is returned so the instruction can leave it on the stack.
pub fn setitem(vm: &mut Vm, args: &[Value]) -> Result<Value, Thrown> {
    let [target, .., value] = args else {
        return Err(vm.throw(
            &core().arg_error,
            "subscript assignment takes a target, indices and a value",
        ));
    };
    match slot_of(target, SlotId::SetItem) {
        Some(slot) => {
            call(vm, &slot, args.to_vec())?;
            Ok(value.clone())
        }
        None => Err(vm.throw(
            &core().type_error,
            format!(
                "'{}' object does not support subscript assignment",
                target.type_name()
            ),
        )),
    }
}

/// Begin iterating `v`.
pub fn iter_new(vm: &mut Vm, v: &Value) -> Result<Value, Thrown> {
    if let Some(slot) = slot_of(v, SlotId::Iter) {
        return call(vm, &slot, vec![v.clone()]);
    }
    if v.ty().slot(SlotId::Next).is_some() {
        return Ok(v.clone());
    }
    Err(vm.throw(
        &core().type_error,
        format!("'{}' object is not iterable", v.type_name()),
    ))
}

/// Produce the next element, raising `OutOfIterError` at the end.
pub fn iter_next(vm: &mut Vm, it: &Value) -> Result<Value, Thrown> {
    if matches!(it.payload(), Payload::Iter(_)) {
        return iter_mod::advance(vm, it);
    }
    match slot_of(it, SlotId::Next) {
        Some(slot) => call(vm, &slot, vec![it.clone()]),
        None => Err(vm.throw(
            &core().type_error,
            format!("'{}' object is not an iterator", it.type_name()),
        )),
    }
}

/// Whether a thrown value is the end-of-iteration sentinel.
pub fn ends_iteration(thrown: &Thrown) -> bool {
    issub(thrown.value.ty(), &core().out_of_iter_error)
}

/// Drain an iterable into a vector.
pub fn collect(vm: &mut Vm, v: &Value) -> Result<Vec<Value>, Thrown> {
    let it = iter_new(vm, v)?;
    let mut out = Vec::new();
    loop {
        match iter_next(vm, &it) {
            Ok(item) => out.push(item),
            Err(thrown) if ends_iteration(&thrown) => return Ok(out),
            Err(thrown) => return Err(thrown),
        }
    }
}
