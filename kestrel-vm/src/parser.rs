//! Recursive-descent parser with precedence climbing for operators.

use std::sync::Arc;

use crate::ast::{BinaryOp, Expr, ExprKind, Stmt, StmtKind, UnaryOp};
use crate::error::{syntax_error, Thrown};
use crate::lexer::{unescape, Source, TokKind, Token};
use crate::types::int::Int;
use crate::value::Value;

struct Parser<'a> {
    src: &'a Arc<Source>,
    toks: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Token {
        self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn kind(&self) -> TokKind {
        self.peek().kind
    }

    fn bump(&mut self) -> Token {
        let t = self.peek();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: TokKind) -> bool {
        if self.kind() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokKind, what: &str) -> Result<Token, Thrown> {
        if self.kind() == kind {
            Ok(self.bump())
        } else {
            Err(self.err(self.peek(), format!("expected {what}")))
        }
    }

    fn err(&self, tok: Token, what: impl Into<String>) -> Thrown {
        syntax_error(self.src, tok, what)
    }

    fn text(&self, tok: Token) -> &'a str {
        tok.text(self.src)
    }

    fn skip_seps(&mut self) {
        while matches!(self.kind(), TokKind::Newline | TokKind::Semi) {
            self.bump();
        }
    }

    fn skip_newlines(&mut self) {
        while self.kind() == TokKind::Newline {
            self.bump();
        }
    }

    /// Whether `kind` appears next after any separators, committing the
    /// skip when it does.
    fn eat_after_seps(&mut self, kind: TokKind) -> bool {
        let mut ahead = self.pos;
        while matches!(
            self.toks.get(ahead).map(|t| t.kind),
            Some(TokKind::Newline) | Some(TokKind::Semi)
        ) {
            ahead += 1;
        }
        if self.toks.get(ahead).map(|t| t.kind) == Some(kind) {
            self.pos = ahead + 1;
            true
        } else {
            false
        }
    }

    // ---- statements ----

    fn program(&mut self) -> Result<Vec<Stmt>, Thrown> {
        let mut out = Vec::new();
        loop {
            self.skip_seps();
            if self.kind() == TokKind::Eof {
                return Ok(out);
            }
            out.push(self.stmt()?);
        }
    }

    fn stmt(&mut self) -> Result<Stmt, Thrown> {
        let tok = self.peek();
        let kind = match self.kind() {
            TokKind::LBrace if self.looks_like_block() => {
                self.bump();
                let mut body = Vec::new();
                loop {
                    self.skip_seps();
                    if self.eat(TokKind::RBrace) {
                        break;
                    }
                    if self.kind() == TokKind::Eof {
                        return Err(self.err(tok, "unterminated block"));
                    }
                    body.push(self.stmt()?);
                }
                StmtKind::Block(body)
            }
            TokKind::KwIf => {
                self.bump();
                let mut arms = Vec::new();
                let cond = self.expr()?;
                self.skip_newlines();
                let body = self.stmt()?;
                arms.push((cond, body));
                let mut otherwise = None;
                loop {
                    if self.eat_after_seps(TokKind::KwElif) {
                        let cond = self.expr()?;
                        self.skip_newlines();
                        let body = self.stmt()?;
                        arms.push((cond, body));
                        continue;
                    }
                    if self.eat_after_seps(TokKind::KwElse) {
                        self.skip_newlines();
                        otherwise = Some(Box::new(self.stmt()?));
                    }
                    break;
                }
                StmtKind::If { arms, otherwise }
            }
            TokKind::KwWhile => {
                self.bump();
                let cond = self.expr()?;
                self.skip_newlines();
                let body = Box::new(self.stmt()?);
                StmtKind::While { cond, body }
            }
            TokKind::KwFor => {
                self.bump();
                let var = self.expect(TokKind::Ident, "a loop variable after 'for'")?;
                let var = self.text(var).to_owned();
                self.expect(TokKind::KwIn, "'in' after the loop variable")?;
                let iterable = self.expr()?;
                self.skip_newlines();
                let body = Box::new(self.stmt()?);
                StmtKind::For {
                    var,
                    iterable,
                    body,
                }
            }
            TokKind::KwTry => {
                self.bump();
                self.skip_newlines();
                let body = Box::new(self.stmt()?);
                if !self.eat_after_seps(TokKind::KwCatch) {
                    return Err(self.err(self.peek(), "expected 'catch' after a try body"));
                }
                let name = if self.kind() == TokKind::Ident {
                    let t = self.bump();
                    Some(self.text(t).to_owned())
                } else {
                    None
                };
                self.skip_newlines();
                let catch = Box::new(self.stmt()?);
                StmtKind::Try { body, name, catch }
            }
            TokKind::KwThrow => {
                self.bump();
                StmtKind::Throw(self.expr()?)
            }
            TokKind::KwRet => {
                self.bump();
                let value = if matches!(
                    self.kind(),
                    TokKind::Newline | TokKind::Semi | TokKind::RBrace | TokKind::Eof
                ) {
                    None
                } else {
                    Some(self.expr()?)
                };
                StmtKind::Ret(value)
            }
            TokKind::KwBreak => {
                self.bump();
                StmtKind::Break
            }
            TokKind::KwContinue => {
                self.bump();
                StmtKind::Continue
            }
            TokKind::KwFunc => {
                self.bump();
                let name = self.expect(TokKind::Ident, "a function name after 'func'")?;
                let name = self.text(name).to_owned();
                self.expect(TokKind::LParen, "'(' after the function name")?;
                let mut params = Vec::new();
                if !self.eat(TokKind::RParen) {
                    loop {
                        let p = self.expect(TokKind::Ident, "a parameter name")?;
                        params.push(self.text(p).to_owned());
                        if self.eat(TokKind::Comma) {
                            continue;
                        }
                        self.expect(TokKind::RParen, "')' after the parameters")?;
                        break;
                    }
                }
                self.skip_newlines();
                let body = Box::new(self.stmt()?);
                StmtKind::Func { name, params, body }
            }
            TokKind::KwImport => {
                self.bump();
                let name = self.expect(TokKind::Ident, "a module name after 'import'")?;
                StmtKind::Import(self.text(name).to_owned())
            }
            _ => StmtKind::Expr(self.expr()?),
        };
        Ok(Stmt { tok, kind })
    }

    /// Distinguish a block from a dict literal at statement position:
    /// `{}` and `{ expr : …` read as a dict only in expression context,
    /// so statements treat `{` followed by `}` or a `key :` shape as a
    /// dict expression statement.
    fn looks_like_block(&self) -> bool {
        let mut ahead = self.pos + 1;
        while matches!(
            self.toks.get(ahead).map(|t| t.kind),
            Some(TokKind::Newline) | Some(TokKind::Semi)
        ) {
            ahead += 1;
        }
        match self.toks.get(ahead).map(|t| t.kind) {
            Some(TokKind::RBrace) => false,
            Some(TokKind::Str) | Some(TokKind::Int) => {
                self.toks.get(ahead + 1).map(|t| t.kind) != Some(TokKind::Colon)
            }
            _ => true,
        }
    }

    // ---- expressions ----

    fn expr(&mut self) -> Result<Expr, Thrown> {
        self.assign()
    }

    fn assign(&mut self) -> Result<Expr, Thrown> {
        let target = self.comparison()?;
        let aug = match self.kind() {
            TokKind::Assign => None,
            TokKind::PlusAssign => Some(BinaryOp::Add),
            TokKind::MinusAssign => Some(BinaryOp::Sub),
            TokKind::StarAssign => Some(BinaryOp::Mul),
            TokKind::SlashAssign => Some(BinaryOp::Div),
            TokKind::PercentAssign => Some(BinaryOp::Mod),
            _ => return Ok(target),
        };
        let tok = self.bump();
        if !matches!(
            target.kind,
            ExprKind::Name(_) | ExprKind::Attr { .. } | ExprKind::Index { .. }
        ) {
            return Err(self.err(tok, "cannot assign to this expression"));
        }
        let value = Box::new(self.assign()?);
        let target = Box::new(target);
        Ok(Expr {
            tok,
            kind: match aug {
                None => ExprKind::Assign { target, value },
                Some(op) => ExprKind::AugAssign { op, target, value },
            },
        })
    }

    fn comparison(&mut self) -> Result<Expr, Thrown> {
        let mut l = self.sum()?;
        loop {
            let op = match self.kind() {
                TokKind::Lt => BinaryOp::Lt,
                TokKind::Le => BinaryOp::Le,
                TokKind::Gt => BinaryOp::Gt,
                TokKind::Ge => BinaryOp::Ge,
                TokKind::EqEq => BinaryOp::Eq,
                TokKind::Ne => BinaryOp::Ne,
                _ => return Ok(l),
            };
            let tok = self.bump();
            let r = self.sum()?;
            l = Expr {
                tok,
                kind: ExprKind::Binary {
                    op,
                    l: Box::new(l),
                    r: Box::new(r),
                },
            };
        }
    }

    fn sum(&mut self) -> Result<Expr, Thrown> {
        let mut l = self.term()?;
        loop {
            let op = match self.kind() {
                TokKind::Plus => BinaryOp::Add,
                TokKind::Minus => BinaryOp::Sub,
                _ => return Ok(l),
            };
            let tok = self.bump();
            let r = self.term()?;
            l = Expr {
                tok,
                kind: ExprKind::Binary {
                    op,
                    l: Box::new(l),
                    r: Box::new(r),
                },
            };
        }
    }

    fn term(&mut self) -> Result<Expr, Thrown> {
        let mut l = self.unary()?;
        loop {
            let op = match self.kind() {
                TokKind::Star => BinaryOp::Mul,
                TokKind::Slash => BinaryOp::Div,
                TokKind::Percent => BinaryOp::Mod,
                _ => return Ok(l),
            };
            let tok = self.bump();
            let r = self.unary()?;
            l = Expr {
                tok,
                kind: ExprKind::Binary {
                    op,
                    l: Box::new(l),
                    r: Box::new(r),
                },
            };
        }
    }

    fn unary(&mut self) -> Result<Expr, Thrown> {
        let op = match self.kind() {
            TokKind::Plus => UnaryOp::Pos,
            TokKind::Minus => UnaryOp::Neg,
            TokKind::Bang => UnaryOp::Not,
            TokKind::Tilde => UnaryOp::Sqig,
            _ => return self.power(),
        };
        let tok = self.bump();
        let operand = Box::new(self.unary()?);
        Ok(Expr {
            tok,
            kind: ExprKind::Unary { op, operand },
        })
    }

    fn power(&mut self) -> Result<Expr, Thrown> {
        let base = self.postfix()?;
        if self.kind() == TokKind::StarStar {
            let tok = self.bump();
            // right-associative; the exponent may itself be signed
            let exp = self.unary()?;
            return Ok(Expr {
                tok,
                kind: ExprKind::Binary {
                    op: BinaryOp::Pow,
                    l: Box::new(base),
                    r: Box::new(exp),
                },
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, Thrown> {
        let mut e = self.atom()?;
        loop {
            match self.kind() {
                TokKind::LParen => {
                    let tok = self.bump();
                    let mut args = Vec::new();
                    if !self.eat(TokKind::RParen) {
                        loop {
                            args.push(self.expr()?);
                            if self.eat(TokKind::Comma) {
                                continue;
                            }
                            self.expect(TokKind::RParen, "')' after the arguments")?;
                            break;
                        }
                    }
                    e = Expr {
                        tok,
                        kind: ExprKind::Call {
                            func: Box::new(e),
                            args,
                        },
                    };
                }
                TokKind::LBracket => {
                    let tok = self.bump();
                    let mut args = Vec::new();
                    if !self.eat(TokKind::RBracket) {
                        loop {
                            args.push(self.expr()?);
                            if self.eat(TokKind::Comma) {
                                continue;
                            }
                            self.expect(TokKind::RBracket, "']' after the subscript")?;
                            break;
                        }
                    }
                    e = Expr {
                        tok,
                        kind: ExprKind::Index {
                            obj: Box::new(e),
                            args,
                        },
                    };
                }
                TokKind::Dot => {
                    let tok = self.bump();
                    let name = self.expect(TokKind::Ident, "an attribute name after '.'")?;
                    e = Expr {
                        tok,
                        kind: ExprKind::Attr {
                            obj: Box::new(e),
                            name: self.text(name).to_owned(),
                        },
                    };
                }
                _ => return Ok(e),
            }
        }
    }

    fn atom(&mut self) -> Result<Expr, Thrown> {
        let tok = self.peek();
        match self.kind() {
            TokKind::Int => {
                self.bump();
                let text = self.text(tok);
                let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    Int::from_str_radix(hex, 16)
                } else {
                    Int::from_str_radix(text, 10)
                };
                match parsed {
                    Some(i) => Ok(Expr {
                        tok,
                        kind: ExprKind::Literal(Value::int_from(i)),
                    }),
                    None => Err(self.err(tok, "malformed integer literal")),
                }
            }
            TokKind::Float => {
                self.bump();
                let text = self.text(tok);
                match text.parse::<f64>() {
                    Ok(f) => Ok(Expr {
                        tok,
                        kind: ExprKind::Literal(Value::float(f)),
                    }),
                    Err(_) => Err(self.err(tok, "malformed float literal")),
                }
            }
            TokKind::Imag => {
                self.bump();
                let text = self.text(tok);
                let body = &text[..text.len() - 1];
                match body.parse::<f64>() {
                    Ok(f) => Ok(Expr {
                        tok,
                        kind: ExprKind::Literal(Value::complex(0.0, f)),
                    }),
                    Err(_) => Err(self.err(tok, "malformed imaginary literal")),
                }
            }
            TokKind::Str => {
                self.bump();
                Ok(Expr {
                    tok,
                    kind: ExprKind::Literal(Value::str(unescape(self.text(tok)))),
                })
            }
            TokKind::KwTrue => {
                self.bump();
                Ok(Expr {
                    tok,
                    kind: ExprKind::Literal(Value::bool_(true)),
                })
            }
            TokKind::KwFalse => {
                self.bump();
                Ok(Expr {
                    tok,
                    kind: ExprKind::Literal(Value::bool_(false)),
                })
            }
            TokKind::KwNone => {
                self.bump();
                Ok(Expr {
                    tok,
                    kind: ExprKind::Literal(Value::none()),
                })
            }
            TokKind::Ident => {
                self.bump();
                Ok(Expr {
                    tok,
                    kind: ExprKind::Name(self.text(tok).to_owned()),
                })
            }
            TokKind::LParen => {
                self.bump();
                if self.eat(TokKind::RParen) {
                    return Ok(Expr {
                        tok,
                        kind: ExprKind::Tuple(Vec::new()),
                    });
                }
                let first = self.expr()?;
                if self.eat(TokKind::RParen) {
                    return Ok(first);
                }
                let mut elems = vec![first];
                while self.eat(TokKind::Comma) {
                    if self.kind() == TokKind::RParen {
                        break;
                    }
                    elems.push(self.expr()?);
                }
                self.expect(TokKind::RParen, "')' to close the tuple")?;
                Ok(Expr {
                    tok,
                    kind: ExprKind::Tuple(elems),
                })
            }
            TokKind::LBracket => {
                self.bump();
                let mut elems = Vec::new();
                if !self.eat(TokKind::RBracket) {
                    loop {
                        elems.push(self.expr()?);
                        if self.eat(TokKind::Comma) {
                            continue;
                        }
                        self.expect(TokKind::RBracket, "']' to close the list")?;
                        break;
                    }
                }
                Ok(Expr {
                    tok,
                    kind: ExprKind::List(elems),
                })
            }
            TokKind::LBrace => {
                self.bump();
                self.skip_newlines();
                let mut pairs = Vec::new();
                if !self.eat(TokKind::RBrace) {
                    loop {
                        let key = self.expr()?;
                        self.expect(TokKind::Colon, "':' after a dict key")?;
                        self.skip_newlines();
                        let val = self.expr()?;
                        pairs.push((key, val));
                        self.skip_newlines();
                        if self.eat(TokKind::Comma) {
                            self.skip_newlines();
                            if self.eat(TokKind::RBrace) {
                                break;
                            }
                            continue;
                        }
                        self.expect(TokKind::RBrace, "'}' to close the dict")?;
                        break;
                    }
                }
                Ok(Expr {
                    tok,
                    kind: ExprKind::Dict(pairs),
                })
            }
            _ => Err(self.err(tok, "expected an expression")),
        }
    }
}

/// Parse a token stream into a program.
pub fn parse(src: &Arc<Source>, toks: &[Token]) -> Result<Vec<Stmt>, Thrown> {
    let mut p = Parser { src, toks, pos: 0 };
    p.program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse_text(text: &str) -> Result<Vec<Stmt>, Thrown> {
        let src = Source::new("<test>", text);
        let toks = lexer::lex(&src)?;
        parse(&src, &toks)
    }

    #[test]
    fn precedence() {
        let prog = parse_text("1 + 2 * 3").unwrap();
        let StmtKind::Expr(e) = &prog[0].kind else {
            panic!("expected expression statement")
        };
        let ExprKind::Binary { op: BinaryOp::Add, r, .. } = &e.kind else {
            panic!("expected + at the top, got {e:?}")
        };
        assert!(matches!(r.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn assignment_targets() {
        assert!(parse_text("a = 1").is_ok());
        assert!(parse_text("a.b = 1").is_ok());
        assert!(parse_text("a[0] = 1").is_ok());
        assert!(parse_text("a += 1").is_ok());
        assert!(parse_text("1 = 2").is_err());
    }

    #[test]
    fn statements() {
        let prog = parse_text(
            "for i in range(3) print(i)\n\
             while x < 10 { x = x + 1 }\n\
             if a b() elif c d() else e()\n\
             try { throw Error(\"boom\") } catch e { print(e.what) }",
        )
        .unwrap();
        assert_eq!(prog.len(), 4);
        assert!(matches!(prog[0].kind, StmtKind::For { .. }));
        assert!(matches!(prog[1].kind, StmtKind::While { .. }));
        assert!(matches!(prog[2].kind, StmtKind::If { .. }));
        assert!(matches!(prog[3].kind, StmtKind::Try { .. }));
    }

    #[test]
    fn func_defs_and_calls() {
        let prog = parse_text("func add(a, b) { ret a + b }\nprint(add(1, 2))").unwrap();
        let StmtKind::Func { name, params, .. } = &prog[0].kind else {
            panic!("expected func def")
        };
        assert_eq!(name, "add");
        assert_eq!(params, &["a", "b"]);
    }

    #[test]
    fn literals() {
        let prog = parse_text("[1, 2.5, \"x\", true, none, 3i]").unwrap();
        let StmtKind::Expr(e) = &prog[0].kind else { panic!() };
        let ExprKind::List(elems) = &e.kind else { panic!() };
        assert_eq!(elems.len(), 6);
    }

    #[test]
    fn dict_literal_vs_block() {
        let prog = parse_text("d = {\"a\": 1}").unwrap();
        let StmtKind::Expr(e) = &prog[0].kind else { panic!() };
        let ExprKind::Assign { value, .. } = &e.kind else { panic!() };
        assert!(matches!(value.kind, ExprKind::Dict(_)));

        let prog = parse_text("{ print(1) }").unwrap();
        assert!(matches!(prog[0].kind, StmtKind::Block(_)));

        // an empty brace pair at statement position reads as a dict
        let prog = parse_text("{}").unwrap();
        assert!(matches!(prog[0].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn method_chain() {
        let prog = parse_text("a.push(4)").unwrap();
        let StmtKind::Expr(e) = &prog[0].kind else { panic!() };
        let ExprKind::Call { func, .. } = &e.kind else { panic!() };
        assert!(matches!(func.kind, ExprKind::Attr { .. }));
    }

    #[test]
    fn errors_are_syntax_errors() {
        for bad in ["(1", "a.", "func f(", "if", "d = {\"a\": }"] {
            let e = parse_text(bad).expect_err(bad);
            assert_eq!(e.value.type_name(), "SyntaxError", "{bad}");
        }
    }

    #[test]
    fn power_is_right_associative_and_tight() {
        let prog = parse_text("-2 ** 2").unwrap();
        let StmtKind::Expr(e) = &prog[0].kind else { panic!() };
        // unary minus applies to the whole power
        assert!(matches!(e.kind, ExprKind::Unary { op: UnaryOp::Neg, .. }));
    }
}
