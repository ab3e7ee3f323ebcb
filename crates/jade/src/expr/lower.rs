use std::collections::BTreeSet;

use log::trace;

use super::{BinaryOp, Expr, ExprError, UnaryOp};
use crate::syntax::{self, TEMP_PREFIX};

/// Instructions to emit ahead of the use site, and the value to embed there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lowered {
    pub instructions: Vec<String>,
    pub value: String,
}

impl Lowered {
    /// The instructions that must run before the value is referenced.
    pub fn prelude(&self) -> String {
        self.instructions.concat()
    }

    /// `{{value}}`.
    pub fn action(&self) -> String {
        format!("{{{{{}}}}}", self.value)
    }

    /// Instructions followed by the action.
    pub fn render(&self) -> String {
        let mut out = self.prelude();
        out.push_str(&self.action());
        out
    }
}

pub(super) fn lower(
    expr: &Expr,
    functions: &BTreeSet<String>,
    temps: &mut usize,
) -> Result<Lowered, ExprError> {
    let mut lowerer = Lowerer {
        functions,
        temps,
        instructions: Vec::new(),
    };
    let value = lowerer.operand(expr)?;
    Ok(Lowered {
        instructions: lowerer.instructions,
        value,
    })
}

struct Lowerer<'a> {
    functions: &'a BTreeSet<String>,
    temps: &'a mut usize,
    instructions: Vec<String>,
}

impl Lowerer<'_> {
    fn is_function(&self, name: &str) -> bool {
        self.functions.contains(name) || syntax::is_runtime_function(name)
    }

    fn emit(&mut self, op: String) -> String {
        *self.temps += 1;
        let name = format!("{TEMP_PREFIX}{}", self.temps);
        trace!("{name} := {op}");
        self.instructions.push(format!("{{{{{name} := {op}}}}}"));
        name
    }

    fn operand(&mut self, expr: &Expr) -> Result<String, ExprError> {
        match expr {
            Expr::Literal(text) => Ok(text.clone()),
            Expr::Context => Ok(".".to_string()),
            Expr::Variable(name) => Ok(name.clone()),
            Expr::Ident(name) if self.is_function(name) => Ok(name.clone()),
            Expr::Ident(name) => Ok(format!(".{name}")),
            Expr::Unary { op, operand } => {
                let value = self.operand(operand)?;
                let function = match op {
                    UnaryOp::Plus => "__jade_plus",
                    UnaryOp::Minus => "__jade_minus",
                    UnaryOp::Not => "not",
                };
                Ok(self.emit(format!("{function} {value}")))
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Select { target, field } => {
                if matches!(**target, Expr::Context) {
                    return Ok(format!(".{field}"));
                }
                let receiver = self.receiver(target)?;
                Ok(self.emit(format!("{receiver}.{field}")))
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Index { target, index } => {
                let target = self.operand(target)?;
                let index = self.operand(index)?;
                Ok(self.emit(format!("index {target} {index}")))
            }
        }
    }

    /// Lowers the target of a field selection or method call.
    fn receiver(&mut self, target: &Expr) -> Result<String, ExprError> {
        match target {
            Expr::Context => Ok(String::new()),
            Expr::Literal(text) => Err(ExprError::Unsupported(format!(
                "cannot select a field of literal {text}"
            ))),
            Expr::Ident(name) if self.is_function(name) => Err(ExprError::Unsupported(format!(
                "cannot select a field of function `{name}`"
            ))),
            other => self.operand(other),
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<String, ExprError> {
        let left = self.operand(left)?;
        let (function, negate) = match op {
            BinaryOp::Pipe => {
                let stage = self.pipeline_stage(right)?;
                return Ok(self.emit(format!("{left} | {stage}")));
            }
            BinaryOp::Or => ("or", false),
            BinaryOp::And => ("and", false),
            BinaryOp::Eq => ("__jade_eql", false),
            BinaryOp::Ne => ("__jade_eql", true),
            BinaryOp::Lt => ("__jade_lss", false),
            BinaryOp::Gt => ("__jade_gtr", false),
            BinaryOp::Le => ("__jade_gtr", true),
            BinaryOp::Ge => ("__jade_lss", true),
            BinaryOp::Add => ("__jade_add", false),
            BinaryOp::Sub => ("__jade_sub", false),
            BinaryOp::Mul => ("__jade_mul", false),
            BinaryOp::Div => ("__jade_quo", false),
            BinaryOp::Rem => ("__jade_rem", false),
        };
        let right = self.operand(right)?;
        let result = self.emit(format!("{function} {left} {right}"));
        if negate {
            return Ok(self.emit(format!("not {result}")));
        }
        Ok(result)
    }

    /// The right-hand side of `x | f`: a function name, or a call whose
    /// arguments precede the piped value.
    fn pipeline_stage(&mut self, stage: &Expr) -> Result<String, ExprError> {
        match stage {
            Expr::Ident(name) if self.is_function(name) => Ok(name.clone()),
            Expr::Call { callee, args } => match &**callee {
                Expr::Ident(name) if self.is_function(name) => {
                    let args = self.arguments(args)?;
                    Ok(invocation(name, &args))
                }
                _ => self.operand(stage),
            },
            other => self.operand(other),
        }
    }

    fn arguments(&mut self, args: &[Expr]) -> Result<Vec<String>, ExprError> {
        args.iter().map(|arg| self.operand(arg)).collect()
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<String, ExprError> {
        match callee {
            Expr::Ident(name) if self.is_function(name) => {
                let args = self.arguments(args)?;
                Ok(self.emit(invocation(name, &args)))
            }
            Expr::Ident(name) => {
                let args = self.arguments(args)?;
                Ok(self.emit(invocation(&format!(".{name}"), &args)))
            }
            Expr::Select { target, field } => {
                let receiver = self.receiver(target)?;
                let args = self.arguments(args)?;
                Ok(self.emit(invocation(&format!("{receiver}.{field}"), &args)))
            }
            Expr::Literal(text) => Err(ExprError::Unsupported(format!(
                "cannot call literal {text}"
            ))),
            other => {
                let function = self.operand(other)?;
                let args = self.arguments(args)?;
                Ok(self.emit(invocation(&format!("call {function}"), &args)))
            }
        }
    }
}

fn invocation(function: &str, args: &[String]) -> String {
    let mut out = function.to_string();
    for arg in args {
        out.push(' ');
        out.push_str(arg);
    }
    out
}
