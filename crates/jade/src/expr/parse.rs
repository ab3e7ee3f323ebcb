use super::{BinaryOp, Expr, ExprError, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(String),
    Str(String),
    Ident(String),
    Dollar(Option<String>),
    Punct(&'static str),
}

const PUNCT_2: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];
const PUNCT_1: [&str; 15] = [
    "(", ")", "[", "]", ".", ",", "+", "-", "*", "/", "%", "!", "<", ">", "|",
];

pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    let fail = |message: String| ExprError::Unparsable {
        fragment: source.to_string(),
        message,
    };
    let tokens = tokenize(source).map_err(fail)?;
    if tokens.is_empty() {
        return Err(fail("empty expression".to_string()));
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.parse_or().map_err(fail)?;
    if let Some(tok) = parser.peek() {
        return Err(fail(format!("unexpected {}", describe(tok))));
    }
    Ok(expr)
}

fn tokenize(source: &str) -> Result<Vec<Tok>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0usize;

    while index < chars.len() {
        let ch = chars[index];
        if ch.is_whitespace() {
            index += 1;
            continue;
        }

        if ch.is_ascii_digit() {
            let start = index;
            while index < chars.len() && (chars[index].is_ascii_alphanumeric() || chars[index] == '_') {
                index += 1;
            }
            if index + 1 < chars.len() && chars[index] == '.' && chars[index + 1].is_ascii_digit() {
                index += 1;
                while index < chars.len() && chars[index].is_ascii_alphanumeric() {
                    index += 1;
                }
            }
            tokens.push(Tok::Number(chars[start..index].iter().collect()));
            continue;
        }

        if ch.is_alphabetic() || ch == '_' {
            let start = index;
            while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_') {
                index += 1;
            }
            tokens.push(Tok::Ident(chars[start..index].iter().collect()));
            continue;
        }

        if ch == '$' {
            index += 1;
            let start = index;
            while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_') {
                index += 1;
            }
            let name: String = chars[start..index].iter().collect();
            tokens.push(Tok::Dollar(Some(name).filter(|n| !n.is_empty())));
            continue;
        }

        if ch == '"' || ch == '\'' || ch == '`' {
            let (literal, next) = read_string(&chars, index)?;
            tokens.push(Tok::Str(literal));
            index = next;
            continue;
        }

        let two: String = chars[index..(index + 2).min(chars.len())].iter().collect();
        if let Some(op) = PUNCT_2.iter().find(|op| **op == two) {
            tokens.push(Tok::Punct(*op));
            index += 2;
            continue;
        }
        let one = ch.to_string();
        if let Some(op) = PUNCT_1.iter().find(|op| **op == one) {
            tokens.push(Tok::Punct(*op));
            index += 1;
            continue;
        }
        return Err(format!("unexpected character `{ch}`"));
    }
    Ok(tokens)
}

/// Reads a quoted string starting at `start`. Single-quoted strings come back
/// double-quoted; double-quoted and backquoted ones keep their source text.
fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut index = start + 1;
    let mut inner = String::new();
    while index < chars.len() {
        let ch = chars[index];
        if ch == quote {
            let literal = match quote {
                '\'' => format!("\"{inner}\""),
                _ => chars[start..=index].iter().collect(),
            };
            return Ok((literal, index + 1));
        }
        if ch == '\\' && quote != '`' && index + 1 < chars.len() {
            let escaped = chars[index + 1];
            match (quote, escaped) {
                ('\'', '\'') => inner.push('\''),
                _ => {
                    inner.push('\\');
                    inner.push(escaped);
                }
            }
            index += 2;
            continue;
        }
        if quote == '\'' && ch == '"' {
            inner.push_str("\\\"");
        } else {
            inner.push(ch);
        }
        index += 1;
    }
    Err("unterminated string literal".to_string())
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Number(text) | Tok::Str(text) | Tok::Ident(text) => format!("`{text}`"),
        Tok::Dollar(Some(name)) => format!("`${name}`"),
        Tok::Dollar(None) => "`$`".to_string(),
        Tok::Punct(op) => format!("`{op}`"),
    }
}

struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Consumes the next token if it is one of `ops` (punctuation or keyword).
    fn eat_any(&mut self, ops: &[&str]) -> Option<String> {
        let matched = match self.peek()? {
            Tok::Punct(op) if ops.contains(op) => op.to_string(),
            Tok::Ident(word) if ops.contains(&word.as_str()) => word.clone(),
            _ => return None,
        };
        self.pos += 1;
        Some(matched)
    }

    fn expect(&mut self, op: &str) -> Result<(), String> {
        match self.next() {
            Some(Tok::Punct(found)) if found == op => Ok(()),
            Some(tok) => Err(format!("expected `{op}`, found {}", describe(&tok))),
            None => Err(format!("expected `{op}`, found end of input")),
        }
    }

    fn binary_level(
        &mut self,
        ops: &[&str],
        operand: fn(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut left = operand(self)?;
        while let Some(op) = self.eat_any(ops) {
            let right = operand(self)?;
            left = Expr::Binary {
                op: binary_op(&op),
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        self.binary_level(&["||", "or"], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        self.binary_level(&["&&", "and"], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        self.binary_level(&["==", "!="], Self::parse_relational)
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        self.binary_level(&["<", ">", "<=", ">="], Self::parse_additive)
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        self.binary_level(&["+", "-", "|"], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        self.binary_level(&["*", "/", "%"], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        let op = match self.eat_any(&["+", "-", "!", "not"]) {
            Some(op) => op,
            None => return self.parse_postfix(),
        };
        let op = match op.as_str() {
            "+" => UnaryOp::Plus,
            "-" => UnaryOp::Minus,
            _ => UnaryOp::Not,
        };
        Ok(Expr::Unary {
            op,
            operand: Box::new(self.parse_unary()?),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_any(&["."]).is_some() {
                expr = Expr::Select {
                    target: Box::new(expr),
                    field: self.field_name()?,
                };
            } else if self.eat_any(&["("]).is_some() {
                let args = self.call_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.eat_any(&["["]).is_some() {
                let index = self.parse_or()?;
                self.expect("]")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.eat_any(&[")"]).is_some() {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if self.eat_any(&[","]).is_some() {
                continue;
            }
            self.expect(")")?;
            return Ok(args);
        }
    }

    fn field_name(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Tok::Ident(name)) => Ok(name),
            Some(tok) => Err(format!("expected a field name, found {}", describe(&tok))),
            None => Err("expected a field name, found end of input".to_string()),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Number(text)) | Some(Tok::Str(text)) => Ok(Expr::Literal(text)),
            Some(Tok::Ident(word)) => Ok(match word.as_str() {
                "true" | "false" | "nil" => Expr::Literal(word),
                _ => Expr::Ident(word),
            }),
            Some(Tok::Dollar(None)) => Ok(Expr::Context),
            Some(Tok::Dollar(Some(name))) => Ok(Expr::Variable(format!("${name}"))),
            Some(Tok::Punct("(")) => {
                let inner = self.parse_or()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some(Tok::Punct(".")) => Ok(Expr::Select {
                target: Box::new(Expr::Context),
                field: self.field_name()?,
            }),
            Some(tok) => Err(format!("unexpected {}", describe(&tok))),
            None => Err("unexpected end of input".to_string()),
        }
    }
}

fn binary_op(op: &str) -> BinaryOp {
    match op {
        "||" | "or" => BinaryOp::Or,
        "&&" | "and" => BinaryOp::And,
        "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Ne,
        "<" => BinaryOp::Lt,
        ">" => BinaryOp::Gt,
        "<=" => BinaryOp::Le,
        ">=" => BinaryOp::Ge,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "|" => BinaryOp::Pipe,
        "*" => BinaryOp::Mul,
        "/" => BinaryOp::Div,
        _ => BinaryOp::Rem,
    }
}
