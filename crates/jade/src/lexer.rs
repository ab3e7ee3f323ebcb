use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::diagnostics::{Diagnostic, SourcePosition};
use crate::syntax;

const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Eof,
    Indent,
    Outdent,
    Blank,
    NewLine,
    Semicolon,
    Doctype,
    Comment,
    Text,
    Id,
    ClassName,
    Tag,
    Attribute,
    AttributeList,
    If,
    Else,
    Unless,
    Each,
    Assignment,
    Buffered,
    Import,
    Extends,
    NamedBlock,
    Mixin,
    MixinCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<&'static str, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Token>,
    pub position: SourcePosition,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, position: SourcePosition) -> Self {
        Self {
            kind,
            value: value.into(),
            data: BTreeMap::new(),
            children: Vec::new(),
            position,
        }
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.data.insert(key, value.into());
        self
    }

    /// Side data by key; missing keys read as the empty string.
    pub fn data(&self, key: &str) -> &str {
        self.data.get(key).map(String::as_str).unwrap_or("")
    }
}

struct Patterns {
    comment: Regex,
    doctype: Regex,
    extends: Regex,
    import: Regex,
    named_block: Regex,
    mixin: Regex,
    mixin_call: Regex,
    condition: Regex,
    else_branch: Regex,
    each: Regex,
    assignment: Regex,
    buffered: Regex,
    piped: Regex,
    selector: Regex,
    tag: Regex,
    guard: Regex,
    attribute_name: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        comment: pattern(r"^//(-)?\s*(.*)$"),
        doctype: pattern(r"^(?:!!!\s*|doctype(?:\s+|$))(.*)$"),
        extends: pattern(r"^extends\s+(.+)$"),
        import: pattern(r"^(?:import|include)\s+(.+)$"),
        named_block: pattern(r"^block\s+(?:(append|prepend)\s+)?([\w\-. /]+)$"),
        mixin: pattern(r"^mixin\s+([\w\-]+)\s*(?:\((.*)\))?\s*$"),
        mixin_call: pattern(r"^\+([\w\-]+)\s*(?:\((.*)\))?\s*$"),
        condition: pattern(r"^(if|unless)\s+(.+)$"),
        else_branch: pattern(r"^else(?:\s+(.*))?$"),
        each: pattern(r"^each\s+(\$\w+)(?:\s*,\s*(\$\w+))?\s+in\s+(.+)$"),
        assignment: pattern(r"^(\$\w+)\s*=\s*([^=].*)$"),
        buffered: pattern(r"^(!?)=\s*(.*)$"),
        piped: pattern(r"^\|\s?(.*)$"),
        selector: pattern(r"^([#.])([\w\-]+)"),
        tag: pattern(r"^[A-Za-z_][\w\-]*(?::[\w\-]+)*"),
        guard: pattern(r"^\s*\?\s*(.+)$"),
        attribute_name: pattern(r"^[\w\-:@.]+$"),
    })
}

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("scanner patterns are valid")
}

/// A source line whose indentation has been accounted for but whose content
/// has not been tokenized yet.
#[derive(Debug)]
struct PendingLine {
    number: usize,
    indent_chars: usize,
    content: String,
}

/// Indentation-aware tokenizer. Tokens are produced lazily so the parser can
/// switch raw mode on between an `Indent` and the content it introduces.
#[derive(Debug)]
pub struct Scanner {
    filename: String,
    lines: Vec<String>,
    next_line: usize,
    indents: Vec<usize>,
    pending: VecDeque<Token>,
    current: Option<PendingLine>,
    raw_mode: bool,
    finished: bool,
}

impl Scanner {
    pub fn new(input: &str, filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            lines: input.lines().map(str::to_string).collect(),
            next_line: 0,
            indents: vec![0],
            pending: VecDeque::new(),
            current: None,
            raw_mode: false,
            finished: false,
        }
    }

    /// When set, the next token is the whole indented block as one raw `Text`.
    pub fn set_raw_mode(&mut self, raw: bool) {
        self.raw_mode = raw;
    }

    pub fn next_token(&mut self) -> Result<Token, Diagnostic> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Ok(token);
            }
            if let Some(line) = self.current.take() {
                if self.raw_mode {
                    self.raw_mode = false;
                    return Ok(self.read_raw(line));
                }
                self.lex_line(line)?;
                continue;
            }
            if self.finished {
                let line = self.lines.len().max(1);
                return Ok(Token::new(TokenKind::Eof, "", self.position(line, 1, 0)));
            }
            self.advance_line()?;
        }
    }

    fn position(&self, line: usize, column: usize, length: usize) -> SourcePosition {
        SourcePosition::new(line, column, length).in_file(&self.filename)
    }

    fn advance_line(&mut self) -> Result<(), Diagnostic> {
        let Some(raw) = self.lines.get(self.next_line) else {
            let position = self.position(self.lines.len().max(1), 1, 0);
            for _ in 1..self.indents.len() {
                self.pending
                    .push_back(Token::new(TokenKind::Outdent, "", position.clone()));
            }
            self.indents.truncate(1);
            self.finished = true;
            return Ok(());
        };
        self.next_line += 1;
        let number = self.next_line;

        if raw.trim().is_empty() {
            let position = self.position(number, 1, 0);
            self.pending.push_back(Token::new(TokenKind::Blank, "", position));
            return Ok(());
        }

        let (width, indent_chars) = indentation(raw);
        let content: String = raw.chars().skip(indent_chars).collect::<String>();
        let content = content.trim_end().to_string();
        let position = self.position(number, 1, indent_chars);

        let top = self.indents.last().copied().unwrap_or(0);
        if width > top {
            self.indents.push(width);
            self.pending
                .push_back(Token::new(TokenKind::Indent, "", position));
        } else if width < top {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                self.pending
                    .push_back(Token::new(TokenKind::Outdent, "", position.clone()));
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(Diagnostic::syntax(
                    "E1002",
                    format!("inconsistent indentation: dedent to width {width} matches no enclosing level"),
                    position,
                ));
            }
        }

        self.current = Some(PendingLine {
            number,
            indent_chars,
            content,
        });
        Ok(())
    }

    fn read_raw(&mut self, line: PendingLine) -> Token {
        let base = self.indents.last().copied().unwrap_or(0);
        let mut collected = vec![line.content];
        while let Some(raw) = self.lines.get(self.next_line) {
            if raw.trim().is_empty() {
                collected.push(String::new());
            } else if indentation(raw).0 >= base {
                collected.push(strip_indentation(raw, base).trim_end().to_string());
            } else {
                break;
            }
            self.next_line += 1;
        }
        while collected.last().is_some_and(|text| text.is_empty()) {
            collected.pop();
        }
        let value = collected.join("\n");
        let length = value.chars().count();
        Token::new(
            TokenKind::Text,
            value,
            self.position(line.number, line.indent_chars + 1, length),
        )
        .with("Mode", "raw")
    }

    /// Tokenizes one line and closes it with a `NewLine`, so a tag header
    /// never reaches into the line below.
    fn lex_line(&mut self, line: PendingLine) -> Result<(), Diagnostic> {
        let column = line.indent_chars + 1;
        self.lex_line_start(&line.content, line.number, column)?;
        let end = column + line.content.chars().count();
        self.pending
            .push_back(Token::new(TokenKind::NewLine, "", self.position(line.number, end, 0)));
        Ok(())
    }

    fn lex_line_start(&mut self, text: &str, line: usize, column: usize) -> Result<(), Diagnostic> {
        let p = patterns();
        let length = text.chars().count();
        let position = self.position(line, column, length);

        if let Some(caps) = p.comment.captures(text) {
            let mode = if caps.get(1).is_some() { "silent" } else { "" };
            let token = Token::new(TokenKind::Comment, &caps[2], position).with("Mode", mode);
            self.pending.push_back(token);
            return Ok(());
        }
        if let Some(caps) = p.doctype.captures(text) {
            let token = Token::new(TokenKind::Doctype, caps[1].trim(), position);
            self.pending.push_back(token);
            return Ok(());
        }
        if let Some(caps) = p.extends.captures(text) {
            self.pending
                .push_back(Token::new(TokenKind::Extends, caps[1].trim(), position));
            return Ok(());
        }
        if let Some(caps) = p.import.captures(text) {
            self.pending
                .push_back(Token::new(TokenKind::Import, caps[1].trim(), position));
            return Ok(());
        }
        if let Some(caps) = p.named_block.captures(text) {
            let modifier = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let token = Token::new(TokenKind::NamedBlock, caps[2].trim(), position)
                .with("Modifier", modifier);
            self.pending.push_back(token);
            return Ok(());
        }
        if let Some(caps) = p.mixin.captures(text) {
            let args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let token = Token::new(TokenKind::Mixin, &caps[1], position).with("Args", args.trim());
            self.pending.push_back(token);
            return Ok(());
        }
        if let Some(caps) = p.mixin_call.captures(text) {
            let args = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let token =
                Token::new(TokenKind::MixinCall, &caps[1], position).with("Args", args.trim());
            self.pending.push_back(token);
            return Ok(());
        }
        if let Some(caps) = p.condition.captures(text) {
            let kind = if &caps[1] == "if" {
                TokenKind::If
            } else {
                TokenKind::Unless
            };
            self.pending
                .push_back(Token::new(kind, caps[2].trim(), position));
            return Ok(());
        }
        if let Some(caps) = p.else_branch.captures(text) {
            let position = self.position(line, column, "else".len());
            self.pending.push_back(Token::new(TokenKind::Else, "", position));
            if let Some(rest) = caps.get(1) {
                let rest_column = column + text[..rest.start()].chars().count();
                self.lex_line_start(rest.as_str(), line, rest_column)?;
            }
            return Ok(());
        }
        if let Some(caps) = p.each.captures(text) {
            let mut token = Token::new(TokenKind::Each, caps[3].trim(), position)
                .with("X", &caps[1]);
            if let Some(index) = caps.get(2) {
                token = token.with("Y", index.as_str());
            }
            self.pending.push_back(token);
            return Ok(());
        }
        if let Some(caps) = p.assignment.captures(text) {
            let token = Token::new(TokenKind::Assignment, caps[2].trim(), position)
                .with("X", &caps[1]);
            self.pending.push_back(token);
            return Ok(());
        }
        if let Some(caps) = p.buffered.captures(text) {
            let mode = if caps[1].is_empty() { "escaped" } else { "unescaped" };
            let token = Token::new(TokenKind::Buffered, caps[2].trim(), position)
                .with("Mode", mode);
            self.pending.push_back(token);
            return Ok(());
        }
        if let Some(caps) = p.piped.captures(text) {
            let token = Token::new(TokenKind::Text, &caps[1], position).with("Mode", "piped");
            self.pending.push_back(token);
            return Ok(());
        }
        if p.selector.is_match(text) || text.starts_with('[') {
            return self.lex_inline(text, line, column);
        }
        if let Some(found) = p.tag.find(text) {
            let name = found.as_str();
            let token = Token::new(
                TokenKind::Tag,
                name,
                self.position(line, column, name.chars().count()),
            );
            self.pending.push_back(token);
            let rest = &text[found.end()..];
            return self.lex_inline(rest, line, column + name.chars().count());
        }

        self.pending
            .push_back(Token::new(TokenKind::Text, text, position).with("Mode", ""));
        Ok(())
    }

    /// Tokenizes the remainder of a tag header: selectors, attributes,
    /// an inline nested tag, buffered code or trailing text.
    fn lex_inline(&mut self, text: &str, line: usize, column: usize) -> Result<(), Diagnostic> {
        let p = patterns();
        let mut rest = text;
        let mut column = column;

        while !rest.is_empty() {
            let advance;
            if let Some(caps) = p.selector.captures(rest) {
                let kind = if &caps[1] == "#" {
                    TokenKind::Id
                } else {
                    TokenKind::ClassName
                };
                let whole = caps[0].chars().count();
                let token = Token::new(kind, &caps[2], self.position(line, column, whole));
                advance = caps[0].len();
                if self.push_guarded(token, &rest[advance..]) {
                    return Ok(());
                }
            } else if rest.starts_with('[') {
                let close = find_closing(rest, '[', ']').ok_or_else(|| {
                    Diagnostic::syntax(
                        "E1003",
                        "unterminated attribute: missing `]`",
                        self.position(line, column, rest.chars().count()),
                    )
                })?;
                let body = &rest[1..close];
                let position = self.position(line, column, rest[..=close].chars().count());
                let token = self.attribute_token(body, position)?;
                advance = close + 1;
                if self.push_guarded(token, &rest[advance..]) {
                    return Ok(());
                }
            } else if rest.starts_with('(') {
                let close = find_closing(rest, '(', ')').ok_or_else(|| {
                    Diagnostic::syntax(
                        "E1003",
                        "unterminated attribute list: missing `)`",
                        self.position(line, column, rest.chars().count()),
                    )
                })?;
                let position = self.position(line, column, rest[..=close].chars().count());
                let mut list = Token::new(TokenKind::AttributeList, "", position.clone());
                for part in split_top_level(&rest[1..close], ',') {
                    if part.is_empty() {
                        continue;
                    }
                    list.children.push(self.attribute_token(&part, position.clone())?);
                }
                self.pending.push_back(list);
                advance = close + 1;
            } else if rest.starts_with(':') && rest[1..].starts_with(char::is_whitespace) {
                let position = self.position(line, column, 1);
                self.pending
                    .push_back(Token::new(TokenKind::Semicolon, ":", position));
                let nested = rest[1..].trim_start();
                let offset = rest.chars().count() - nested.chars().count();
                return self.lex_line_start(nested, line, column + offset);
            } else if rest.starts_with("!=") || rest.starts_with('=') {
                let unescaped = rest.starts_with('!');
                let operator = if unescaped { 2 } else { 1 };
                let expression = rest[operator..].trim();
                let mode = if unescaped { "unescaped" } else { "escaped" };
                let token = Token::new(
                    TokenKind::Buffered,
                    expression,
                    self.position(line, column, rest.chars().count()),
                )
                .with("Mode", mode);
                self.pending.push_back(token);
                return Ok(());
            } else if rest.starts_with(char::is_whitespace) {
                let value = rest.trim_start();
                if value.is_empty() {
                    return Ok(());
                }
                let offset = rest.chars().count() - value.chars().count();
                let token = Token::new(
                    TokenKind::Text,
                    value,
                    self.position(line, column + offset, value.chars().count()),
                )
                .with("Mode", "inline");
                self.pending.push_back(token);
                return Ok(());
            } else {
                let unexpected = rest.chars().next().unwrap_or(' ');
                return Err(Diagnostic::syntax(
                    "E1003",
                    format!("malformed tag header: unexpected `{unexpected}`"),
                    self.position(line, column, 1),
                ));
            }
            column += rest[..advance].chars().count();
            rest = &rest[advance..];
        }
        Ok(())
    }

    /// Queues a selector or attribute token. A `? guard` suffix consumes the
    /// rest of the line as the token's condition; returns whether it did.
    fn push_guarded(&mut self, mut token: Token, rest: &str) -> bool {
        if let Some(caps) = patterns().guard.captures(rest) {
            token.data.insert("Condition", caps[1].trim().to_string());
            self.pending.push_back(token);
            return true;
        }
        self.pending.push_back(token);
        false
    }

    fn attribute_token(&self, source: &str, position: SourcePosition) -> Result<Token, Diagnostic> {
        let (name, value) = match find_top_level(source, '=') {
            Some(index) => (source[..index].trim(), Some(source[index + 1..].trim())),
            None => (source.trim(), None),
        };
        if !patterns().attribute_name.is_match(name) {
            return Err(Diagnostic::syntax(
                "E1003",
                format!("malformed attribute `{}`", source.trim()),
                position,
            ));
        }
        let token = Token::new(TokenKind::Attribute, name, position);
        Ok(match value {
            None | Some("") => token.with("Mode", "raw").with("Content", ""),
            Some(value) => match single_string_literal(value) {
                Some(inner) => token.with("Mode", "raw").with("Content", inner),
                None => token.with("Mode", "expression").with("Content", value),
            },
        })
    }
}

/// Runs the scanner to `Eof`, switching raw mode on for the bodies of raw-text
/// tags the way the parser does: a raw-text tag keeps its claim on the next
/// `Indent` through the rest of its header line and any blank lines after it.
pub fn tokenize(input: &str, filename: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut scanner = Scanner::new(input, filename);
    let mut tokens = Vec::new();
    let mut in_raw_header = false;
    let mut header_closed = false;
    loop {
        let token = scanner.next_token()?;
        match token.kind {
            TokenKind::Eof => {
                tokens.push(token);
                return Ok(tokens);
            }
            TokenKind::Tag => {
                in_raw_header = syntax::is_raw_text(&token.value);
                header_closed = false;
            }
            TokenKind::Indent if in_raw_header => {
                scanner.set_raw_mode(true);
                in_raw_header = false;
            }
            TokenKind::NewLine | TokenKind::Blank => header_closed = true,
            TokenKind::Id
            | TokenKind::ClassName
            | TokenKind::Attribute
            | TokenKind::AttributeList
            | TokenKind::Text
            | TokenKind::Buffered
                if !header_closed => {}
            _ => in_raw_header = false,
        }
        tokens.push(token);
    }
}

/// Width of the leading whitespace (tabs count as four columns) and the
/// number of characters it spans.
fn indentation(line: &str) -> (usize, usize) {
    let mut width = 0;
    let mut chars = 0;
    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH,
            _ => break,
        }
        chars += 1;
    }
    (width, chars)
}

fn strip_indentation(line: &str, base: usize) -> &str {
    let mut width = 0;
    for (index, ch) in line.char_indices() {
        if width >= base {
            return &line[index..];
        }
        match ch {
            ' ' => width += 1,
            '\t' => width += TAB_WIDTH,
            _ => return &line[index..],
        }
    }
    ""
}

fn single_string_literal(value: &str) -> Option<&str> {
    let inner = value.strip_prefix('"')?.strip_suffix('"')?;
    let mut escaped = false;
    for ch in inner.chars() {
        match ch {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return None,
            _ => escaped = false,
        }
    }
    Some(inner)
}

/// Byte index of the delimiter closing the one `text` starts with, skipping
/// quoted strings and nested pairs.
fn find_closing(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            c if c == open => depth += 1,
            c if c == close => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (index, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            c if c == needle && depth == 0 => return Some(index),
            _ => {}
        }
    }
    None
}

/// Splits at `separator` outside quotes and brackets; parts are trimmed.
pub(crate) fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(index) = find_top_level(rest, separator) {
        parts.push(rest[..index].trim().to_string());
        rest = &rest[index + separator.len_utf8()..];
    }
    if !rest.trim().is_empty() || !parts.is_empty() {
        parts.push(rest.trim().to_string());
    }
    parts
}
