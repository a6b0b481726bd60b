//! Abstract syntax trees produced by the parser.

use crate::lexer::Token;
use crate::value::Value;

/// Binary operators of the surface syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

/// Unary operators of the surface syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
    Sqig,
}

/// An expression, anchored at the token that introduced it.
#[derive(Debug)]
pub struct Expr {
    /// Anchor token for diagnostics.
    pub tok: Token,
    /// The node itself.
    pub kind: ExprKind,
}

/// Expression variants.
#[derive(Debug)]
pub enum ExprKind {
    /// A literal constant (int, float, imaginary, string, bool, none).
    Literal(Value),
    /// Identifier reference.
    Name(String),
    /// `obj.name`.
    Attr {
        /// Object expression.
        obj: Box<Expr>,
        /// Attribute name.
        name: String,
    },
    /// `obj[args…]`.
    Index {
        /// Target expression.
        obj: Box<Expr>,
        /// Subscript arguments.
        args: Vec<Expr>,
    },
    /// `f(args…)`.
    Call {
        /// Callee expression.
        func: Box<Expr>,
        /// Positional arguments.
        args: Vec<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        l: Box<Expr>,
        /// Right operand.
        r: Box<Expr>,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// `target = value` (an expression; leaves the value).
    Assign {
        /// Name, attribute or subscript target.
        target: Box<Expr>,
        /// Assigned expression.
        value: Box<Expr>,
    },
    /// `target op= value`.
    AugAssign {
        /// The combining operator.
        op: BinaryOp,
        /// Name, attribute or subscript target.
        target: Box<Expr>,
        /// Right-hand expression.
        value: Box<Expr>,
    },
    /// `[a, b, …]`.
    List(Vec<Expr>),
    /// `(a, b, …)` with a comma.
    Tuple(Vec<Expr>),
    /// `{k: v, …}`.
    Dict(Vec<(Expr, Expr)>),
}

/// A statement, anchored at the token that introduced it.
#[derive(Debug)]
pub struct Stmt {
    /// Anchor token for diagnostics.
    pub tok: Token,
    /// The node itself.
    pub kind: StmtKind,
}

/// Statement variants.
#[derive(Debug)]
pub enum StmtKind {
    /// Expression statement (result discarded).
    Expr(Expr),
    /// `{ … }`.
    Block(Vec<Stmt>),
    /// `if cond stmt (elif cond stmt)* (else stmt)?`.
    If {
        /// `(condition, body)` arms, the `if` first.
        arms: Vec<(Expr, Stmt)>,
        /// Optional `else` body.
        otherwise: Option<Box<Stmt>>,
    },
    /// `while cond body`.
    While {
        /// Loop condition.
        cond: Expr,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `for var in iterable body`.
    For {
        /// Loop variable.
        var: String,
        /// Iterated expression.
        iterable: Expr,
        /// Loop body.
        body: Box<Stmt>,
    },
    /// `try body catch [name] handler`.
    Try {
        /// Protected body.
        body: Box<Stmt>,
        /// Optional binding for the caught value.
        name: Option<String>,
        /// Handler body.
        catch: Box<Stmt>,
    },
    /// `throw expr`.
    Throw(Expr),
    /// `ret [expr]`.
    Ret(Option<Expr>),
    /// `break`.
    Break,
    /// `continue`.
    Continue,
    /// `func name(params) body`.
    Func {
        /// Function name.
        name: String,
        /// Parameter names.
        params: Vec<String>,
        /// Body.
        body: Box<Stmt>,
    },
    /// `import name`.
    Import(String),
}
