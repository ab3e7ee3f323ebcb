use std::fmt;

use serde::Serialize;

/// Where a token or node came from. Lines and columns are 1-based; `length` is
/// the length of the offending token in characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourcePosition {
    pub filename: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize, length: usize) -> Self {
        Self {
            filename: String::new(),
            line,
            column,
            length,
        }
    }

    pub fn in_file(mut self, filename: &str) -> Self {
        self.filename = filename.to_string();
        self
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filename.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.filename, self.line, self.column)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Unbalanced indentation, malformed lines, unexpected tokens.
    Syntax,
    /// Well-formed input that breaks a template rule.
    Semantic,
    /// An embedded expression that cannot be translated.
    Expression,
    /// An `extends`/`import` target that cannot be read.
    Resolution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("error[{code}] {position}: {message} (length {})", .position.length)]
pub struct Diagnostic {
    pub code: String,
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: SourcePosition,
}

impl Diagnostic {
    pub fn new(
        code: &str,
        kind: DiagnosticKind,
        message: impl Into<String>,
        position: SourcePosition,
    ) -> Self {
        Self {
            code: code.to_string(),
            kind,
            message: message.into(),
            position,
        }
    }

    pub fn syntax(code: &str, message: impl Into<String>, position: SourcePosition) -> Self {
        Self::new(code, DiagnosticKind::Syntax, message, position)
    }

    pub fn semantic(code: &str, message: impl Into<String>, position: SourcePosition) -> Self {
        Self::new(code, DiagnosticKind::Semantic, message, position)
    }

    pub fn expression(code: &str, message: impl Into<String>, position: SourcePosition) -> Self {
        Self::new(code, DiagnosticKind::Expression, message, position)
    }

    pub fn resolution(code: &str, message: impl Into<String>, position: SourcePosition) -> Self {
        Self::new(code, DiagnosticKind::Resolution, message, position)
    }
}

pub fn render_diagnostic(diagnostic: &Diagnostic) -> String {
    diagnostic.to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_file_line_column_and_length() {
        let diag = Diagnostic::semantic(
            "E2001",
            "named block `content` is already defined",
            SourcePosition::new(4, 3, 13).in_file("views/page.jade"),
        );
        assert_eq!(
            diag.to_string(),
            "error[E2001] views/page.jade:4:3: named block `content` is already defined (length 13)"
        );
    }

    #[test]
    fn omits_empty_file_name() {
        let diag = Diagnostic::syntax("E1001", "unexpected token", SourcePosition::new(1, 1, 0));
        assert_eq!(
            render_diagnostic(&diag),
            "error[E1001] 1:1: unexpected token (length 0)"
        );
    }
}
