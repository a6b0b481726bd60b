//! Unicode-aware tokenizer.
//!
//! Tokens carry their kind plus byte offset, length, line and column into
//! the owning [`Source`], which is enough for the caret diagnostics the
//! error subsystem renders. Newlines are significant separators except
//! inside parentheses, brackets or braces.

use std::sync::Arc;

use crate::error::{syntax_error, Thrown};

/// A unit of source text fed to the frontend.
#[derive(Debug)]
pub struct Source {
    /// Display name (file path, `<expr>`, `<stdin>`).
    pub name: String,
    /// Full program text.
    pub text: String,
}

impl Source {
    /// Wrap a named chunk of program text.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            text: text.into(),
        })
    }

    /// Text of the 1-based `line`, without its terminator.
    pub fn line_text(&self, line: u32) -> &str {
        self.text
            .lines()
            .nth(line.saturating_sub(1) as usize)
            .unwrap_or("")
    }
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum TokKind {
    Ident,
    Int,
    Float,
    Imag,
    Str,

    KwIf,
    KwElif,
    KwElse,
    KwWhile,
    KwFor,
    KwIn,
    KwTry,
    KwCatch,
    KwThrow,
    KwRet,
    KwBreak,
    KwContinue,
    KwFunc,
    KwImport,
    KwTrue,
    KwFalse,
    KwNone,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Semi,
    Dot,
    Newline,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,

    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    Bang,
    Tilde,

    Eof,
}

/// A single token: kind plus position in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Classification.
    pub kind: TokKind,
    /// Byte offset of the first character.
    pub offset: u32,
    /// Byte length.
    pub len: u32,
    /// 1-based source line.
    pub line: u32,
    /// 1-based source column (in characters).
    pub col: u32,
}

impl Token {
    /// Slice of `src` this token covers.
    pub fn text<'s>(&self, src: &'s Source) -> &'s str {
        &src.text[self.offset as usize..(self.offset + self.len) as usize]
    }
}

fn keyword(text: &str) -> Option<TokKind> {
    Some(match text {
        "if" => TokKind::KwIf,
        "elif" => TokKind::KwElif,
        "else" => TokKind::KwElse,
        "while" => TokKind::KwWhile,
        "for" => TokKind::KwFor,
        "in" => TokKind::KwIn,
        "try" => TokKind::KwTry,
        "catch" => TokKind::KwCatch,
        "throw" => TokKind::KwThrow,
        "ret" | "return" => TokKind::KwRet,
        "break" => TokKind::KwBreak,
        "continue" => TokKind::KwContinue,
        "func" => TokKind::KwFunc,
        "import" => TokKind::KwImport,
        "true" => TokKind::KwTrue,
        "false" => TokKind::KwFalse,
        "none" => TokKind::KwNone,
        _ => return None,
    })
}

struct Lexer<'s> {
    src: &'s Arc<Source>,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: u32,
    col: u32,
    depth: u32,
    out: Vec<Token>,
}

impl<'s> Lexer<'s> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).map(|&(_, c)| c)
    }

    fn offset(&self) -> u32 {
        self.chars
            .get(self.pos)
            .map(|&(o, _)| o as u32)
            .unwrap_or(self.src.text.len() as u32)
    }

    fn bump(&mut self) -> Option<char> {
        let &(_, c) = self.chars.get(self.pos)?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn token_from(&mut self, kind: TokKind, offset: u32, line: u32, col: u32) {
        let end = self.offset();
        self.out.push(Token {
            kind,
            offset,
            len: end - offset,
            line,
            col,
        });
    }

    fn error(&self, what: impl Into<String>, offset: u32, line: u32, col: u32) -> Thrown {
        let tok = Token {
            kind: TokKind::Eof,
            offset,
            len: 1,
            line,
            col,
        };
        syntax_error(self.src, tok, what)
    }

    fn run(mut self) -> Result<Vec<Token>, Thrown> {
        while let Some(c) = self.peek() {
            let (offset, line, col) = (self.offset(), self.line, self.col);

            if c == '#' {
                while matches!(self.peek(), Some(ch) if ch != '\n') {
                    self.bump();
                }
                continue;
            }

            if c == '\n' {
                self.bump();
                if self.depth == 0 {
                    if !matches!(
                        self.out.last().map(|t| t.kind),
                        None | Some(TokKind::Newline) | Some(TokKind::Semi)
                    ) {
                        self.token_from(TokKind::Newline, offset, line, col);
                    }
                }
                continue;
            }

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if c.is_alphabetic() || c == '_' {
                while matches!(self.peek(), Some(ch) if ch.is_alphanumeric() || ch == '_') {
                    self.bump();
                }
                let end = self.offset();
                let text = &self.src.text[offset as usize..end as usize];
                let kind = keyword(text).unwrap_or(TokKind::Ident);
                self.token_from(kind, offset, line, col);
                continue;
            }

            if c.is_ascii_digit() {
                self.lex_number(offset, line, col)?;
                continue;
            }

            if c == '"' || c == '\'' {
                self.lex_string(c, offset, line, col)?;
                continue;
            }

            self.bump();
            let two = self.peek();
            let kind = match (c, two) {
                ('*', Some('*')) => {
                    self.bump();
                    TokKind::StarStar
                }
                ('=', Some('=')) => {
                    self.bump();
                    TokKind::EqEq
                }
                ('!', Some('=')) => {
                    self.bump();
                    TokKind::Ne
                }
                ('<', Some('=')) => {
                    self.bump();
                    TokKind::Le
                }
                ('>', Some('=')) => {
                    self.bump();
                    TokKind::Ge
                }
                ('+', Some('=')) => {
                    self.bump();
                    TokKind::PlusAssign
                }
                ('-', Some('=')) => {
                    self.bump();
                    TokKind::MinusAssign
                }
                ('*', Some('=')) => {
                    self.bump();
                    TokKind::StarAssign
                }
                ('/', Some('=')) => {
                    self.bump();
                    TokKind::SlashAssign
                }
                ('%', Some('=')) => {
                    self.bump();
                    TokKind::PercentAssign
                }
                ('(', _) => {
                    self.depth += 1;
                    TokKind::LParen
                }
                (')', _) => {
                    self.depth = self.depth.saturating_sub(1);
                    TokKind::RParen
                }
                ('[', _) => {
                    self.depth += 1;
                    TokKind::LBracket
                }
                (']', _) => {
                    self.depth = self.depth.saturating_sub(1);
                    TokKind::RBracket
                }
                ('{', _) => TokKind::LBrace,
                ('}', _) => TokKind::RBrace,
                (',', _) => TokKind::Comma,
                (':', _) => TokKind::Colon,
                (';', _) => TokKind::Semi,
                ('.', _) => TokKind::Dot,
                ('=', _) => TokKind::Assign,
                ('+', _) => TokKind::Plus,
                ('-', _) => TokKind::Minus,
                ('*', _) => TokKind::Star,
                ('/', _) => TokKind::Slash,
                ('%', _) => TokKind::Percent,
                ('<', _) => TokKind::Lt,
                ('>', _) => TokKind::Gt,
                ('!', _) => TokKind::Bang,
                ('~', _) => TokKind::Tilde,
                _ => {
                    return Err(self.error(
                        format!("unexpected character {c:?}"),
                        offset,
                        line,
                        col,
                    ))
                }
            };
            self.token_from(kind, offset, line, col);
        }

        let end = self.src.text.len() as u32;
        self.out.push(Token {
            kind: TokKind::Eof,
            offset: end,
            len: 0,
            line: self.line,
            col: self.col,
        });
        Ok(self.out)
    }

    fn lex_number(&mut self, offset: u32, line: u32, col: u32) -> Result<(), Thrown> {
        if self.peek() == Some('0') && matches!(self.peek2(), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            if !matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                return Err(self.error("malformed hex literal", offset, line, col));
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.bump();
            }
            self.token_from(TokKind::Int, offset, line, col);
            return Ok(());
        }

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut ahead = self.pos + 1;
            if matches!(self.chars.get(ahead), Some(&(_, '+')) | Some(&(_, '-'))) {
                ahead += 1;
            }
            if matches!(self.chars.get(ahead), Some(&(_, c)) if c.is_ascii_digit()) {
                is_float = true;
                self.bump();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.bump();
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        if self.peek() == Some('i') {
            self.bump();
            self.token_from(TokKind::Imag, offset, line, col);
        } else if is_float {
            self.token_from(TokKind::Float, offset, line, col);
        } else {
            self.token_from(TokKind::Int, offset, line, col);
        }
        Ok(())
    }

    fn lex_string(&mut self, quote: char, offset: u32, line: u32, col: u32) -> Result<(), Thrown> {
        self.bump();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(self.error("unterminated string literal", offset, line, col))
                }
                Some('\\') => {
                    self.bump();
                    if self.bump().is_none() {
                        return Err(self.error("unterminated string literal", offset, line, col));
                    }
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        self.token_from(TokKind::Str, offset, line, col);
        Ok(())
    }
}

/// Tokenize `src`, including a trailing [`TokKind::Eof`].
pub fn lex(src: &Arc<Source>) -> Result<Vec<Token>, Thrown> {
    let lexer = Lexer {
        src,
        chars: src.text.char_indices().collect(),
        pos: 0,
        line: 1,
        col: 1,
        depth: 0,
        out: Vec::new(),
    };
    lexer.run()
}

/// Decode the escapes of a string literal token into its value.
pub fn unescape(raw: &str) -> String {
    let inner = &raw[1..raw.len().saturating_sub(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokKind> {
        let src = Source::new("<test>", text);
        lex(&src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn simple_expression() {
        assert_eq!(
            kinds("print(1 + 2 * 3)"),
            vec![
                TokKind::Ident,
                TokKind::LParen,
                TokKind::Int,
                TokKind::Plus,
                TokKind::Int,
                TokKind::Star,
                TokKind::Int,
                TokKind::RParen,
                TokKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("for i in xs"),
            vec![
                TokKind::KwFor,
                TokKind::Ident,
                TokKind::KwIn,
                TokKind::Ident,
                TokKind::Eof
            ]
        );
        // `ret` and `return` are the same statement keyword
        assert_eq!(kinds("ret"), kinds("return"));
    }

    #[test]
    fn newlines_suppressed_in_parens() {
        assert_eq!(
            kinds("f(1,\n2)"),
            vec![
                TokKind::Ident,
                TokKind::LParen,
                TokKind::Int,
                TokKind::Comma,
                TokKind::Int,
                TokKind::RParen,
                TokKind::Eof,
            ]
        );
        assert!(kinds("a\nb").contains(&TokKind::Newline));
    }

    #[test]
    fn unicode_identifiers() {
        let src = Source::new("<test>", "λ = 1");
        let toks = lex(&src).unwrap();
        assert_eq!(toks[0].kind, TokKind::Ident);
        assert_eq!(toks[0].text(&src), "λ");
    }

    #[test]
    fn positions() {
        let src = Source::new("<test>", "a = 1\nbb = 2");
        let toks = lex(&src).unwrap();
        let bb = toks.iter().find(|t| t.text(&src) == "bb").unwrap();
        assert_eq!((bb.line, bb.col), (2, 1));
        assert_eq!(bb.len, 2);
    }

    #[test]
    fn string_escapes() {
        let src = Source::new("<test>", r#""a\n\t\"b""#);
        let toks = lex(&src).unwrap();
        assert_eq!(toks[0].kind, TokKind::Str);
        assert_eq!(unescape(toks[0].text(&src)), "a\n\t\"b");
    }

    #[test]
    fn number_shapes() {
        assert_eq!(kinds("1 2.5 3e2 0xff 4i")[..5].to_vec(), vec![
            TokKind::Int,
            TokKind::Float,
            TokKind::Float,
            TokKind::Int,
            TokKind::Imag,
        ]);
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        let src = Source::new("<test>", "\"oops");
        assert!(lex(&src).is_err());
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 # trailing\n2"),
            vec![TokKind::Int, TokKind::Newline, TokKind::Int, TokKind::Eof]
        );
    }
}
