//! Embedded expression transpiler.
//!
//! An expression fragment such as `A + B * C` is parsed into an [`Expr`] tree
//! and lowered post-order into single-assignment instructions:
//!
//! ```text
//! {{$__jade_1 := __jade_mul .B .C}}
//! {{$__jade_2 := __jade_add .A $__jade_1}}
//! ```
//!
//! with `$__jade_2` as the value reference the caller embeds.

mod lower;
mod parse;

use std::collections::BTreeSet;

use crate::diagnostics::{Diagnostic, SourcePosition};

pub use lower::Lowered;
pub use parse::parse_expression;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numbers, strings (always double-quoted), `true`, `false`, `nil`.
    Literal(String),
    Ident(String),
    /// `$`, the current context.
    Context,
    /// `$name`, including the sigil.
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Select {
        target: Box<Expr>,
        field: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Pipe,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("unable to parse expression `{fragment}`: {message}")]
    Unparsable { fragment: String, message: String },
    #[error("unsupported expression: {0}")]
    Unsupported(String),
}

impl ExprError {
    pub fn code(&self) -> &'static str {
        match self {
            ExprError::Unparsable { .. } => "E3001",
            ExprError::Unsupported(_) => "E3002",
        }
    }

    pub fn into_diagnostic(self, position: SourcePosition) -> Diagnostic {
        Diagnostic::expression(self.code(), self.to_string(), position)
    }
}

/// Parses and lowers one fragment. `temps` is the running temporary counter of
/// the enclosing compile; `functions` holds the caller's custom function names.
pub fn transpile(
    source: &str,
    functions: &BTreeSet<String>,
    temps: &mut usize,
) -> Result<Lowered, ExprError> {
    let expr = parse_expression(source)?;
    lower::lower(&expr, functions, temps)
}
