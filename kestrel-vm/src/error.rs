//! Exception values, propagation and diagnostics.
//!
//! Script-level failures are ordinary values (instances of the error
//! kinds, each carrying a `what` string) transported through
//! `Result<Value, Thrown>`. A [`Thrown`] pairs the error value with a
//! snapshot of the call-frame stack taken at the throw site, which is
//! what the caret diagnostics render when an exception escapes the main
//! thread.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::lexer::{Source, Token};
use crate::object::Type;
use crate::types::dict::Table;
use crate::value::{Payload, Value};

/// One captured frame of a throw-site snapshot.
#[derive(Debug, Clone)]
pub struct TraceFrame {
    /// Human-readable frame name (function or `<module>`).
    pub name: String,
    /// Source the frame was executing, when known.
    pub src: Option<Arc<Source>>,
    /// Token of the instruction that was executing, when known.
    pub tok: Option<Token>,
}

/// A thrown value plus the frame stack captured when it was thrown.
#[derive(Debug)]
pub struct Thrown {
    /// The thrown value (usually an error instance).
    pub value: Value,
    /// Captured frames, outermost first.
    pub trace: Vec<TraceFrame>,
}

impl Thrown {
    /// Pair a thrown value with a captured stack.
    pub fn new(value: Value, trace: Vec<TraceFrame>) -> Thrown {
        Thrown { value, trace }
    }
}

/// Construct an error instance of `kind` carrying `what`.
pub fn new_error(kind: &Type, what: impl Into<String>) -> Value {
    let mut attrs = Table::new();
    attrs.insert_str("what", Value::str(what.into()));
    Value::instance(kind.clone(), attrs)
}

/// The `what` string of an error instance, if present.
pub fn error_what(v: &Value) -> Option<String> {
    match v.payload() {
        Payload::Instance(attrs) => attrs
            .read()
            .get_str("what")
            .and_then(|w| w.as_str().map(str::to_owned)),
        _ => None,
    }
}

/// Throw with an empty stack snapshot (frontend and host boundaries).
pub fn throw_plain(kind: &Type, what: impl Into<String>) -> Thrown {
    Thrown::new(new_error(kind, what), Vec::new())
}

/// A syntax error anchored at `tok`, rendered with a caret by [`render`].
pub fn syntax_error(src: &Arc<Source>, tok: Token, what: impl Into<String>) -> Thrown {
    Thrown::new(
        new_error(&crate::types::core().syntax_error, what),
        vec![TraceFrame {
            name: "<parse>".into(),
            src: Some(src.clone()),
            tok: Some(tok),
        }],
    )
}

fn describe_value(v: &Value) -> String {
    match error_what(v) {
        Some(what) if what.is_empty() => v.type_name(),
        Some(what) => format!("{}: {}", v.type_name(), what),
        None => format!("{:?}", v),
    }
}

/// Underline `tok` below its source line.
fn underline(out: &mut String, src: &Source, tok: Token) {
    let line = src.line_text(tok.line);
    let _ = writeln!(out, "    {}", line);
    let pad = " ".repeat(tok.col.saturating_sub(1) as usize);
    let span = "^".repeat((tok.len.max(1)) as usize);
    let _ = writeln!(out, "    {}{}", pad, span);
}

/// Render a thrown value and its captured frames for stderr.
pub fn render(thrown: &Thrown) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", describe_value(&thrown.value));
    for frame in &thrown.trace {
        match (&frame.src, frame.tok) {
            (Some(src), Some(tok)) => {
                let _ = writeln!(
                    out,
                    "  in {} ({}:{}:{})",
                    frame.name, src.name, tok.line, tok.col
                );
                underline(&mut out, src, tok);
            }
            _ => {
                let _ = writeln!(out, "  in {}", frame.name);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokKind;
    use crate::types::core;

    #[test]
    fn error_values_carry_what() {
        let e = new_error(&core().key_error, "key 'x' not found");
        assert_eq!(e.type_name(), "KeyError");
        assert_eq!(error_what(&e).as_deref(), Some("key 'x' not found"));
    }

    #[test]
    fn render_underlines_the_token() {
        let src = Source::new("probe.ks", "a = oops + 1");
        let tok = Token {
            kind: TokKind::Ident,
            offset: 4,
            len: 4,
            line: 1,
            col: 5,
        };
        let text = render(&syntax_error(&src, tok, "use of undeclared variable"));
        assert!(text.contains("SyntaxError: use of undeclared variable"));
        assert!(text.contains("probe.ks:1:5"));
        assert!(text.contains("a = oops + 1"));
        assert!(text.contains("    ^^^^"));
    }

    #[test]
    fn subtype_relations_hold() {
        use crate::object::issub;
        let c = core();
        assert!(issub(&c.key_error, &c.error));
        assert!(issub(&c.out_of_iter_error, &c.error));
        assert!(!issub(&c.error, &c.key_error));
    }
}
