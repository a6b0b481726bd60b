//! AST to bytecode lowering.
//!
//! Instructions append into a growable byte array; forward jumps emit a
//! placeholder payload and are patched once the target offset is known
//! (payloads are fixed-width, so no relinking pass is needed). Every
//! emitted instruction records its source token for the traceback
//! renderer. Constants are interned into the per-code pool.
//!
//! `for` loops lower to the iterator protocol: the produced iterator is
//! parked in a hidden local, the `next` call runs under a one-shot
//! exception handler, and the handler hands the caught value to the
//! internal `__iterdone__` builtin, which swallows the end-of-iteration
//! sentinel and re-raises anything else.

use std::sync::Arc;

use kestrel_asm::{Instruction, Opcode, ARG_SIZE};

use crate::ast::{BinaryOp, Expr, ExprKind, Stmt, StmtKind, UnaryOp};
use crate::error::{syntax_error, Thrown};
use crate::lexer::{Source, Token};
use crate::types::code::Code;
use crate::types::func::{CompiledFunc, Func};
use crate::types::int::Int;
use crate::value::{Payload, Value};

struct LoopCtx {
    continue_target: usize,
    breaks: Vec<usize>,
}

struct Compiler<'a> {
    src: &'a Arc<Source>,
    name: String,
    bc: Vec<u8>,
    consts: Vec<Value>,
    tokens: Vec<(u32, Token)>,
    loops: Vec<LoopCtx>,
    tmp_count: usize,
}

impl<'a> Compiler<'a> {
    fn new(src: &'a Arc<Source>, name: impl Into<String>) -> Compiler<'a> {
        Compiler {
            src,
            name: name.into(),
            bc: Vec::new(),
            consts: Vec::new(),
            tokens: Vec::new(),
            loops: Vec::new(),
            tmp_count: 0,
        }
    }

    fn here(&self) -> usize {
        self.bc.len()
    }

    fn emit(&mut self, instr: Instruction, tok: Token) {
        self.tokens.push((self.bc.len() as u32, tok));
        instr.encode(&mut self.bc);
    }

    /// Emit a jump with a placeholder offset; returns the patch site.
    fn emit_jump(&mut self, op: Opcode, tok: Token) -> usize {
        let at = self.here();
        let instr = match op {
            Opcode::Jmp => Instruction::Jmp(0),
            Opcode::Jmpt => Instruction::Jmpt(0),
            Opcode::Jmpf => Instruction::Jmpf(0),
            _ => unreachable!("only jumps are patched relative"),
        };
        self.emit(instr, tok);
        at
    }

    /// Point the jump at `site` to `target`.
    fn patch_jump(&mut self, site: usize, target: usize) {
        let rel = target as i64 - (site + 1 + ARG_SIZE) as i64;
        self.bc[site + 1..site + 1 + ARG_SIZE].copy_from_slice(&(rel as i32).to_le_bytes());
    }

    /// Emit a handler push with a placeholder absolute offset.
    fn emit_exc_add(&mut self, tok: Token) -> usize {
        let at = self.here();
        self.emit(Instruction::ExcAdd(0), tok);
        at
    }

    fn patch_abs(&mut self, site: usize, target: usize) {
        self.bc[site + 1..site + 1 + ARG_SIZE].copy_from_slice(&(target as u32).to_le_bytes());
    }

    fn const_idx(&mut self, v: Value) -> u32 {
        // intern simple constants by content
        let dedupe = matches!(
            v.payload(),
            Payload::Str(_) | Payload::Int(_) | Payload::Float(_)
        );
        if dedupe {
            for (i, existing) in self.consts.iter().enumerate() {
                if std::mem::discriminant(existing.payload()) == std::mem::discriminant(v.payload())
                    && existing.equals(&v)
                {
                    return i as u32;
                }
            }
        }
        self.consts.push(v);
        (self.consts.len() - 1) as u32
    }

    fn name_idx(&mut self, name: &str) -> u32 {
        self.const_idx(Value::str(name))
    }

    fn tmp_name(&mut self, prefix: &str) -> String {
        let n = self.tmp_count;
        self.tmp_count += 1;
        format!(".{prefix}{n}")
    }

    fn finish(self) -> Arc<Code> {
        Arc::new(Code {
            name: self.name,
            bc: self.bc,
            consts: self.consts,
            tokens: self.tokens,
            src: self.src.clone(),
        })
    }

    // ---- statements ----

    fn stmt(&mut self, s: &Stmt) -> Result<(), Thrown> {
        let tok = s.tok;
        match &s.kind {
            StmtKind::Expr(e) => {
                self.expr(e)?;
                self.emit(Instruction::Popu, tok);
            }
            StmtKind::Block(body) => {
                for s in body {
                    self.stmt(s)?;
                }
            }
            StmtKind::If { arms, otherwise } => {
                let mut ends = Vec::new();
                for (cond, body) in arms {
                    self.expr(cond)?;
                    let skip = self.emit_jump(Opcode::Jmpf, cond.tok);
                    self.stmt(body)?;
                    ends.push(self.emit_jump(Opcode::Jmp, tok));
                    let next = self.here();
                    self.patch_jump(skip, next);
                }
                if let Some(body) = otherwise {
                    self.stmt(body)?;
                }
                let end = self.here();
                for site in ends {
                    self.patch_jump(site, end);
                }
            }
            StmtKind::While { cond, body } => {
                let head = self.here();
                self.expr(cond)?;
                let exit = self.emit_jump(Opcode::Jmpf, cond.tok);
                self.loops.push(LoopCtx {
                    continue_target: head,
                    breaks: Vec::new(),
                });
                self.stmt(body)?;
                self.emit_back_jump(head, tok);
                let end = self.here();
                self.patch_jump(exit, end);
                let ctx = self.loops.pop().expect("loop context");
                for site in ctx.breaks {
                    self.patch_jump(site, end);
                }
            }
            StmtKind::For {
                var,
                iterable,
                body,
            } => self.for_stmt(tok, var, iterable, body)?,
            StmtKind::Try { body, name, catch } => {
                let guard = self.emit_exc_add(tok);
                self.stmt(body)?;
                self.emit(Instruction::ExcRem, tok);
                let after = self.emit_jump(Opcode::Jmp, tok);

                let handler = self.here();
                self.patch_abs(guard, handler);
                if let Some(name) = name {
                    let idx = self.name_idx(name);
                    self.emit(Instruction::Store(idx), tok);
                }
                self.emit(Instruction::Popu, tok);
                self.stmt(catch)?;

                let end = self.here();
                self.patch_jump(after, end);
            }
            StmtKind::Throw(e) => {
                let idx = self.name_idx("__throw__");
                self.emit(Instruction::Load(idx), tok);
                self.expr(e)?;
                self.emit(Instruction::Call(2), tok);
                self.emit(Instruction::Popu, tok);
            }
            StmtKind::Ret(value) => match value {
                Some(e) => {
                    self.expr(e)?;
                    self.emit(Instruction::Ret, tok);
                }
                None => self.emit(Instruction::RetNone, tok),
            },
            StmtKind::Break => {
                let site = self.emit_jump(Opcode::Jmp, tok);
                match self.loops.last_mut() {
                    Some(ctx) => ctx.breaks.push(site),
                    None => return Err(syntax_error(self.src, tok, "'break' outside of a loop")),
                }
            }
            StmtKind::Continue => {
                let target = match self.loops.last() {
                    Some(ctx) => ctx.continue_target,
                    None => {
                        return Err(syntax_error(self.src, tok, "'continue' outside of a loop"))
                    }
                };
                self.emit_back_jump(target, tok);
            }
            StmtKind::Func { name, params, body } => {
                let mut inner = Compiler::new(self.src, name.clone());
                inner.stmt(body)?;
                inner.emit(Instruction::RetNone, tok);
                let code = inner.finish();
                let proto = Value::func(Func::Compiled(CompiledFunc {
                    name: name.clone(),
                    code,
                    params: params.clone(),
                    closure: Vec::new(),
                    globals: None,
                }));
                let cidx = self.const_idx(proto);
                self.emit(Instruction::Const(cidx), tok);
                let nidx = self.name_idx(name);
                self.emit(Instruction::Store(nidx), tok);
                self.emit(Instruction::Popu, tok);
            }
            StmtKind::Import(name) => {
                let imp = self.name_idx("__import__");
                self.emit(Instruction::Load(imp), tok);
                let arg = self.const_idx(Value::str(name.clone()));
                self.emit(Instruction::Const(arg), tok);
                self.emit(Instruction::Call(2), tok);
                let nidx = self.name_idx(name);
                self.emit(Instruction::Store(nidx), tok);
                self.emit(Instruction::Popu, tok);
            }
        }
        Ok(())
    }

    fn emit_back_jump(&mut self, target: usize, tok: Token) {
        let site = self.emit_jump(Opcode::Jmp, tok);
        self.patch_jump(site, target);
    }

    fn for_stmt(
        &mut self,
        tok: Token,
        var: &str,
        iterable: &Expr,
        body: &Stmt,
    ) -> Result<(), Thrown> {
        let it_name = self.tmp_name("it");
        let exc_name = self.tmp_name("exc");

        // .it = iter(<iterable>)
        let iter_idx = self.name_idx("iter");
        self.emit(Instruction::Load(iter_idx), tok);
        self.expr(iterable)?;
        self.emit(Instruction::Call(2), tok);
        let it_idx = self.name_idx(&it_name);
        self.emit(Instruction::Store(it_idx), tok);
        self.emit(Instruction::Popu, tok);

        // loop head: guarded next(.it)
        let head = self.here();
        let guard = self.emit_exc_add(tok);
        let next_idx = self.name_idx("next");
        self.emit(Instruction::Load(next_idx), tok);
        self.emit(Instruction::Load(it_idx), tok);
        self.emit(Instruction::Call(2), tok);
        self.emit(Instruction::ExcRem, tok);
        let var_idx = self.name_idx(var);
        self.emit(Instruction::Store(var_idx), tok);
        self.emit(Instruction::Popu, tok);

        self.loops.push(LoopCtx {
            continue_target: head,
            breaks: Vec::new(),
        });
        self.stmt(body)?;
        self.emit_back_jump(head, tok);

        // handler: swallow only the end-of-iteration sentinel
        let handler = self.here();
        self.patch_abs(guard, handler);
        let exc_idx = self.name_idx(&exc_name);
        self.emit(Instruction::Store(exc_idx), tok);
        self.emit(Instruction::Popu, tok);
        let done_idx = self.name_idx("__iterdone__");
        self.emit(Instruction::Load(done_idx), tok);
        self.emit(Instruction::Load(exc_idx), tok);
        self.emit(Instruction::Call(2), tok);
        self.emit(Instruction::Popu, tok);

        let end = self.here();
        let ctx = self.loops.pop().expect("loop context");
        for site in ctx.breaks {
            self.patch_jump(site, end);
        }
        Ok(())
    }

    // ---- expressions ----

    fn expr(&mut self, e: &Expr) -> Result<(), Thrown> {
        let tok = e.tok;
        match &e.kind {
            ExprKind::Literal(v) => self.emit_const(v.clone(), tok),
            ExprKind::Name(name) => {
                let idx = self.name_idx(name);
                self.emit(Instruction::Load(idx), tok);
            }
            ExprKind::Attr { obj, name } => {
                self.expr(obj)?;
                let idx = self.name_idx(name);
                self.emit(Instruction::LoadAttr(idx), tok);
            }
            ExprKind::Index { obj, args } => {
                self.expr(obj)?;
                for a in args {
                    self.expr(a)?;
                }
                self.emit(Instruction::GetItem(args.len() as u32 + 1), tok);
            }
            ExprKind::Call { func, args } => {
                self.expr(func)?;
                for a in args {
                    self.expr(a)?;
                }
                self.emit(Instruction::Call(args.len() as u32 + 1), tok);
            }
            ExprKind::Binary { op, l, r } => {
                self.expr(l)?;
                self.expr(r)?;
                self.emit(binary_instr(*op), tok);
            }
            ExprKind::Unary { op, operand } => self.unary(tok, *op, operand)?,
            ExprKind::Assign { target, value } => self.assign(tok, target, value, None)?,
            ExprKind::AugAssign { op, target, value } => {
                self.assign(tok, target, value, Some(*op))?
            }
            ExprKind::List(elems) => {
                for e in elems {
                    self.expr(e)?;
                }
                self.emit(Instruction::List(elems.len() as u32), tok);
            }
            ExprKind::Tuple(elems) => {
                for e in elems {
                    self.expr(e)?;
                }
                self.emit(Instruction::Tuple(elems.len() as u32), tok);
            }
            ExprKind::Dict(pairs) => {
                // no dict-build opcode: call the dict type on a pair list
                let idx = self.name_idx("dict");
                self.emit(Instruction::Load(idx), tok);
                for (k, v) in pairs {
                    self.expr(k)?;
                    self.expr(v)?;
                    self.emit(Instruction::Tuple(2), tok);
                }
                self.emit(Instruction::List(pairs.len() as u32), tok);
                self.emit(Instruction::Call(2), tok);
            }
        }
        Ok(())
    }

    fn emit_const(&mut self, v: Value, tok: Token) {
        match v.payload() {
            Payload::None => self.emit(Instruction::ConstNone, tok),
            Payload::Bool(true) => self.emit(Instruction::ConstTrue, tok),
            Payload::Bool(false) => self.emit(Instruction::ConstFalse, tok),
            _ => {
                let idx = self.const_idx(v);
                self.emit(Instruction::Const(idx), tok);
            }
        }
    }

    fn unary(&mut self, tok: Token, op: UnaryOp, operand: &Expr) -> Result<(), Thrown> {
        match op {
            UnaryOp::Pos => {
                if let ExprKind::Literal(v) = &operand.kind {
                    if let Some(folded) = fold_pos(v) {
                        self.emit_const(folded, tok);
                        return Ok(());
                    }
                }
                self.expr(operand)?;
                let idx = self.name_idx("__pos__");
                self.emit(Instruction::LoadAttr(idx), tok);
                self.emit(Instruction::Call(1), tok);
                Ok(())
            }
            UnaryOp::Neg => {
                if let ExprKind::Literal(v) = &operand.kind {
                    if let Some(folded) = fold_neg(v) {
                        self.emit_const(folded, tok);
                        return Ok(());
                    }
                }
                self.expr(operand)?;
                let idx = self.name_idx("__neg__");
                self.emit(Instruction::LoadAttr(idx), tok);
                self.emit(Instruction::Call(1), tok);
                Ok(())
            }
            UnaryOp::Sqig => {
                self.expr(operand)?;
                let idx = self.name_idx("__sqig__");
                self.emit(Instruction::LoadAttr(idx), tok);
                self.emit(Instruction::Call(1), tok);
                Ok(())
            }
            UnaryOp::Not => {
                self.expr(operand)?;
                let to_false = self.emit_jump(Opcode::Jmpt, tok);
                self.emit(Instruction::ConstTrue, tok);
                let done = self.emit_jump(Opcode::Jmp, tok);
                let false_at = self.here();
                self.patch_jump(to_false, false_at);
                self.emit(Instruction::ConstFalse, tok);
                let end = self.here();
                self.patch_jump(done, end);
                Ok(())
            }
        }
    }

    fn assign(
        &mut self,
        tok: Token,
        target: &Expr,
        value: &Expr,
        aug: Option<BinaryOp>,
    ) -> Result<(), Thrown> {
        match &target.kind {
            ExprKind::Name(name) => {
                match aug {
                    None => self.expr(value)?,
                    Some(op) => {
                        let idx = self.name_idx(name);
                        self.emit(Instruction::Load(idx), target.tok);
                        self.expr(value)?;
                        self.emit(binary_instr(op), tok);
                    }
                }
                let idx = self.name_idx(name);
                self.emit(Instruction::Store(idx), tok);
                Ok(())
            }
            ExprKind::Attr { obj, name } => {
                self.expr(obj)?;
                match aug {
                    None => self.expr(value)?,
                    Some(op) => {
                        // the target object is evaluated a second time
                        // to read the old value
                        self.expr(obj)?;
                        let idx = self.name_idx(name);
                        self.emit(Instruction::LoadAttr(idx), target.tok);
                        self.expr(value)?;
                        self.emit(binary_instr(op), tok);
                    }
                }
                let idx = self.name_idx(name);
                self.emit(Instruction::StoreAttr(idx), tok);
                Ok(())
            }
            ExprKind::Index { obj, args } => {
                self.expr(obj)?;
                for a in args {
                    self.expr(a)?;
                }
                match aug {
                    None => self.expr(value)?,
                    Some(op) => {
                        self.expr(obj)?;
                        for a in args {
                            self.expr(a)?;
                        }
                        self.emit(Instruction::GetItem(args.len() as u32 + 1), target.tok);
                        self.expr(value)?;
                        self.emit(binary_instr(op), tok);
                    }
                }
                self.emit(Instruction::SetItem(args.len() as u32 + 2), tok);
                Ok(())
            }
            _ => Err(syntax_error(
                self.src,
                target.tok,
                "cannot assign to this expression",
            )),
        }
    }
}

const fn binary_instr(op: BinaryOp) -> Instruction {
    match op {
        BinaryOp::Add => Instruction::Add,
        BinaryOp::Sub => Instruction::Sub,
        BinaryOp::Mul => Instruction::Mul,
        BinaryOp::Div => Instruction::Div,
        BinaryOp::Mod => Instruction::Mod,
        BinaryOp::Pow => Instruction::Pow,
        BinaryOp::Lt => Instruction::Lt,
        BinaryOp::Le => Instruction::Le,
        BinaryOp::Gt => Instruction::Gt,
        BinaryOp::Ge => Instruction::Ge,
        BinaryOp::Eq => Instruction::Eq,
        BinaryOp::Ne => Instruction::Ne,
    }
}

fn fold_pos(v: &Value) -> Option<Value> {
    match v.payload() {
        Payload::Int(_) | Payload::Float(_) | Payload::Complex { .. } => Some(v.clone()),
        _ => None,
    }
}

fn fold_neg(v: &Value) -> Option<Value> {
    match v.payload() {
        Payload::Int(Int::Small(x)) => Some(match x.checked_neg() {
            Some(n) => Value::int(n),
            None => Value::big(-num_bigint::BigInt::from(*x)),
        }),
        Payload::Int(Int::Big(b)) => Some(Value::big(-b.clone())),
        Payload::Float(f) => Some(Value::float(-f)),
        Payload::Complex { re, im } => Some(Value::complex(-re, -im)),
        _ => None,
    }
}

/// Compile a parsed program into a code object named `name`.
pub fn compile_program(
    src: &Arc<Source>,
    prog: &[Stmt],
    name: impl Into<String>,
) -> Result<Arc<Code>, Thrown> {
    let mut c = Compiler::new(src, name);
    for (i, s) in prog.iter().enumerate() {
        let last = i + 1 == prog.len();
        // the value of a trailing expression statement becomes the
        // program's result (what `-e` and the prompt print)
        if last {
            if let StmtKind::Expr(e) = &s.kind {
                c.expr(e)?;
                c.emit(Instruction::Ret, s.tok);
                continue;
            }
        }
        c.stmt(s)?;
    }
    c.emit(Instruction::RetNone, eof_token(src));
    Ok(c.finish())
}

fn eof_token(src: &Arc<Source>) -> Token {
    Token {
        kind: crate::lexer::TokKind::Eof,
        offset: src.text.len() as u32,
        len: 0,
        line: src.text.lines().count().max(1) as u32,
        col: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::parser;
    use kestrel_asm::Instructions;

    fn compile(text: &str) -> Arc<Code> {
        let src = Source::new("<test>", text);
        let toks = lexer::lex(&src).unwrap();
        let prog = parser::parse(&src, &toks).unwrap();
        compile_program(&src, &prog, "<test>").unwrap()
    }

    fn opcodes(code: &Code) -> Vec<Opcode> {
        Instructions::new(&code.bc)
            .map(|r| r.unwrap().1.opcode())
            .collect()
    }

    #[test]
    fn expression_statement_shape() {
        let code = compile("print(1 + 2 * 3)");
        assert_eq!(
            opcodes(&code),
            vec![
                Opcode::Load,
                Opcode::Const,
                Opcode::Const,
                Opcode::Const,
                Opcode::Mul,
                Opcode::Add,
                Opcode::Call,
                Opcode::Ret,
                Opcode::RetNone,
            ]
        );
    }

    #[test]
    fn jumps_resolve_in_bounds() {
        let code = compile(
            "x = 0\nwhile x < 10 { if x % 2 == 0 x += 1 else x += 3 }\nfor i in range(3) print(i)",
        );
        for item in Instructions::new(&code.bc) {
            let (off, instr) = item.unwrap();
            match instr {
                Instruction::Jmp(rel) | Instruction::Jmpt(rel) | Instruction::Jmpf(rel) => {
                    let target = off as i64 + instr.size() as i64 + rel as i64;
                    assert!(target >= 0 && target <= code.bc.len() as i64, "{instr} at {off}");
                }
                Instruction::ExcAdd(abs) => {
                    assert!((abs as usize) < code.bc.len(), "handler target in range");
                }
                _ => {}
            }
        }
    }

    #[test]
    fn constants_are_interned() {
        let code = compile("a = 1; b = 1; c = \"x\"; d = \"x\"");
        let ints = code
            .consts
            .iter()
            .filter(|v| matches!(v.payload(), Payload::Int(_)))
            .count();
        assert_eq!(ints, 1);
        let strs = code
            .consts
            .iter()
            .filter(|v| v.as_str() == Some("x"))
            .count();
        assert_eq!(strs, 1);
    }

    #[test]
    fn loops_guard_only_the_next_call() {
        let code = compile("for i in range(3) print(i)");
        let ops = opcodes(&code);
        let adds = ops.iter().filter(|o| **o == Opcode::ExcAdd).count();
        let rems = ops.iter().filter(|o| **o == Opcode::ExcRem).count();
        assert_eq!(adds, 1);
        assert_eq!(rems, 1);
    }

    #[test]
    fn negative_literals_fold() {
        let code = compile("x = -5");
        assert!(code
            .consts
            .iter()
            .any(|v| matches!(v.payload(), Payload::Int(Int::Small(-5)))));
        assert!(!opcodes(&code).contains(&Opcode::LoadAttr));
    }

    #[test]
    fn unary_plus_dispatches_like_neg() {
        // on a literal it folds away entirely
        let code = compile("x = +5");
        assert!(!opcodes(&code).contains(&Opcode::LoadAttr));

        // on anything else it goes through the dunder hook
        let code = compile("x = 1\ny = +x");
        assert!(opcodes(&code).contains(&Opcode::LoadAttr));
        assert!(code.consts.iter().any(|v| v.as_str() == Some("__pos__")));
    }

    #[test]
    fn every_instruction_has_a_token() {
        let code = compile("a = [1, 2]\na.push(3)\nprint(a)");
        let offsets: Vec<usize> = Instructions::new(&code.bc)
            .map(|r| r.unwrap().0)
            .collect();
        for off in offsets {
            assert!(code.token_at(off as u32).is_some(), "token at {off}");
        }
    }

    #[test]
    fn break_and_continue_need_a_loop() {
        let src = Source::new("<test>", "break");
        let toks = lexer::lex(&src).unwrap();
        let prog = parser::parse(&src, &toks).unwrap();
        assert!(compile_program(&src, &prog, "<t>").is_err());
    }
}
