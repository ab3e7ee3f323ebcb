use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use log::debug;

use crate::ast::*;
use crate::diagnostics::{Diagnostic, SourcePosition};
use crate::lexer::{split_top_level, Scanner, Token, TokenKind};
use crate::merge;
use crate::path;
use crate::source::FileSource;

/// Parses one template into an AST. `extends` and `import` targets are parsed
/// by child parsers; the result of [`Parser::parse`] is memoized.
#[derive(Debug)]
pub struct Parser {
    scanner: Scanner,
    filename: String,
    source: Option<Rc<dyn FileSource>>,
    separator: char,
    current: Token,
    named_blocks: HashMap<String, NamedBlock>,
    parent: Option<Box<Parser>>,
    /// Files whose parse is in progress above this one.
    ancestry: Vec<String>,
    result: Option<Result<Block, Diagnostic>>,
}

impl Parser {
    pub fn new(input: &str, filename: &str) -> Self {
        Self {
            scanner: Scanner::new(input, filename),
            filename: filename.to_string(),
            source: None,
            separator: '/',
            current: Token::new(TokenKind::Eof, "", SourcePosition::default()),
            named_blocks: HashMap::new(),
            parent: None,
            ancestry: Vec::new(),
            result: None,
        }
    }

    /// Reads `filename` from `source` and prepares a parser for it.
    pub fn from_source(
        source: Rc<dyn FileSource>,
        separator: char,
        filename: &str,
    ) -> io::Result<Self> {
        let input = source.read(filename, separator)?;
        Ok(Self::new(&input, filename).with_source(source, separator))
    }

    /// Lets a parser resolve `extends` and `import` targets.
    pub fn with_source(mut self, source: Rc<dyn FileSource>, separator: char) -> Self {
        self.source = Some(source);
        self.separator = separator;
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn named_blocks(&self) -> &HashMap<String, NamedBlock> {
        &self.named_blocks
    }

    pub fn parent(&self) -> Option<&Parser> {
        self.parent.as_deref()
    }

    /// Parses the whole file, merging it into its parent when it extends one.
    /// Later calls return the cached tree or the cached failure.
    pub fn parse(&mut self) -> Result<&Block, Diagnostic> {
        let outcome = match self.result.take() {
            Some(outcome) => outcome,
            None => self.parse_root(),
        };
        self.result.insert(outcome).as_ref().map_err(Clone::clone)
    }

    fn parse_root(&mut self) -> Result<Block, Diagnostic> {
        if self.filename.is_empty() {
            debug!("parsing template string");
        } else {
            debug!("parsing {}", self.filename);
        }
        self.advance()?;
        let mut root = Block::new(SourcePosition::new(1, 1, 0).in_file(&self.filename));
        loop {
            match self.current.kind {
                TokenKind::Eof => break,
                TokenKind::Blank | TokenKind::NewLine => self.advance()?,
                _ => {
                    let node = self.parse_node()?;
                    root.push(node);
                }
            }
        }

        let Some(parent) = self.parent.as_mut() else {
            return Ok(root);
        };
        debug!(
            "merging {} named blocks of {} into {}",
            self.named_blocks.len(),
            self.filename,
            parent.filename
        );
        let inherited = parent.parse()?.clone();
        Ok(merge::merge(inherited, &self.named_blocks))
    }

    fn advance(&mut self) -> Result<(), Diagnostic> {
        self.bump().map(|_| ())
    }

    /// Steps over the end of the current line and any blank lines after it.
    fn skip_line_ends(&mut self) -> Result<(), Diagnostic> {
        while matches!(self.current.kind, TokenKind::NewLine | TokenKind::Blank) {
            self.advance()?;
        }
        Ok(())
    }

    /// Moves to the next line and reports whether it opens an indented block.
    fn at_block(&mut self) -> Result<bool, Diagnostic> {
        self.skip_line_ends()?;
        Ok(self.current.kind == TokenKind::Indent)
    }

    fn bump(&mut self) -> Result<Token, Diagnostic> {
        let next = self.scanner.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        if self.current.kind != kind {
            return Err(Diagnostic::syntax(
                "E1001",
                format!("unexpected {:?}, expected {:?}", self.current.kind, kind),
                self.current.position.clone(),
            ));
        }
        self.bump()
    }

    fn unexpected(&self) -> Diagnostic {
        let message = match self.current.kind {
            TokenKind::Else => "`else` without a preceding `if`".to_string(),
            kind => format!("unexpected {kind:?}"),
        };
        Diagnostic::syntax("E1001", message, self.current.position.clone())
    }

    fn misplaced_attribute(&self) -> Diagnostic {
        Diagnostic::semantic(
            "E2004",
            "conditional attributes must be placed immediately within a parent tag",
            self.current.position.clone(),
        )
    }

    fn parse_node(&mut self) -> Result<Node, Diagnostic> {
        match self.current.kind {
            TokenKind::Doctype => self.parse_doctype(),
            TokenKind::Comment => self.parse_comment(),
            TokenKind::Text => Ok(Node::Text(self.parse_text()?)),
            TokenKind::If => Ok(Node::Condition(self.parse_if()?)),
            TokenKind::Unless => self.parse_unless(),
            TokenKind::Each => self.parse_each(),
            TokenKind::Import => self.parse_import(),
            TokenKind::Extends => self.parse_extends(),
            TokenKind::Tag => Ok(Node::Tag(self.parse_tag()?)),
            TokenKind::Id | TokenKind::ClassName => Ok(Node::Tag(self.parse_tagless()?)),
            TokenKind::Buffered => Ok(Node::Buffered(self.parse_buffered()?)),
            TokenKind::Assignment => self.parse_assignment(),
            TokenKind::NamedBlock => self.parse_named_block(),
            TokenKind::Mixin => self.parse_mixin(),
            TokenKind::MixinCall => self.parse_mixin_call(),
            TokenKind::Indent => Ok(Node::Block(self.parse_block(None)?)),
            TokenKind::Attribute => Err(self.misplaced_attribute()),
            TokenKind::Else
            | TokenKind::AttributeList
            | TokenKind::Semicolon
            | TokenKind::Outdent
            | TokenKind::Blank
            | TokenKind::NewLine
            | TokenKind::Eof => Err(self.unexpected()),
        }
    }

    fn parse_block(&mut self, mut owner: Option<&mut Tag>) -> Result<Block, Diagnostic> {
        let position = self.current.position.clone();
        self.expect(TokenKind::Indent)?;
        let mut block = Block::new(position);

        loop {
            match self.current.kind {
                TokenKind::Eof | TokenKind::Outdent => break,
                TokenKind::Blank | TokenKind::NewLine => {
                    self.advance()?;
                    continue;
                }
                _ => {}
            }
            if let Some(tag) = owner.as_deref_mut() {
                if let Some(attribute) = self.parse_owned_attribute()? {
                    tag.attributes.push(attribute);
                    continue;
                }
            }
            block.push(self.parse_node()?);
        }

        if self.current.kind == TokenKind::Outdent {
            self.advance()?;
        }
        Ok(block)
    }

    /// Attribute lines, and guarded `#id`/`.class` lines, directly inside a
    /// tag's block belong to that tag.
    fn parse_owned_attribute(&mut self) -> Result<Option<Attribute>, Diagnostic> {
        let guarded = !self.current.data("Condition").is_empty();
        let name = match self.current.kind {
            TokenKind::Attribute => None,
            TokenKind::Id if guarded => Some("id"),
            TokenKind::ClassName if guarded => Some("class"),
            _ => return Ok(None),
        };
        let token = self.bump()?;
        let condition = Some(token.data("Condition").to_string()).filter(|c| !c.is_empty());
        let attribute = match name {
            Some(name) => Attribute {
                name: name.to_string(),
                value: token.value.clone(),
                is_raw: true,
                condition,
                position: token.position.clone(),
            },
            None => Attribute {
                condition,
                ..attribute_from_token(&token)
            },
        };
        Ok(Some(attribute))
    }

    fn parse_if(&mut self) -> Result<Condition, Diagnostic> {
        let token = self.expect(TokenKind::If)?;
        let mut condition = Condition {
            expression: token.value,
            positive: Block::new(token.position.clone()),
            negative: None,
            position: token.position,
        };

        if self.at_block()? {
            condition.positive = self.parse_block(None)?;
        }
        if self.current.kind == TokenKind::Else {
            self.advance()?;
            self.skip_line_ends()?;
            match self.current.kind {
                TokenKind::If => {
                    let nested = self.parse_if()?;
                    let mut negative = Block::new(nested.position.clone());
                    negative.push(Node::Condition(nested));
                    condition.negative = Some(negative);
                }
                TokenKind::Indent => condition.negative = Some(self.parse_block(None)?),
                _ => return Err(self.unexpected()),
            }
        }
        Ok(condition)
    }

    fn parse_unless(&mut self) -> Result<Node, Diagnostic> {
        let token = self.expect(TokenKind::Unless)?;
        let positive = if self.at_block()? {
            self.parse_block(None)?
        } else {
            Block::new(token.position.clone())
        };
        Ok(Node::Condition(Condition {
            expression: format!("!({})", token.value),
            positive,
            negative: None,
            position: token.position,
        }))
    }

    fn parse_each(&mut self) -> Result<Node, Diagnostic> {
        let token = self.expect(TokenKind::Each)?;
        let block = if self.at_block()? {
            Some(self.parse_block(None)?)
        } else {
            None
        };
        let index_name = Some(token.data("Y").to_string()).filter(|y| !y.is_empty());
        Ok(Node::Each(Each {
            value_name: token.data("X").to_string(),
            index_name,
            expression: token.value,
            block,
            position: token.position,
        }))
    }

    fn parse_import(&mut self) -> Result<Node, Diagnostic> {
        let token = self.expect(TokenKind::Import)?;
        let mut child = self.relative_parser(&token.value, &token.position)?;
        let mut spliced = child.parse()?.clone();
        spliced.position = token.position;
        Ok(Node::Block(spliced))
    }

    fn parse_extends(&mut self) -> Result<Node, Diagnostic> {
        if self.parent.is_some() {
            return Err(Diagnostic::semantic(
                "E2002",
                "a template can extend only one parent",
                self.current.position.clone(),
            ));
        }
        let token = self.expect(TokenKind::Extends)?;
        let mut parent = self.relative_parser(&token.value, &token.position)?;
        parent.parse()?;
        self.parent = Some(Box::new(parent));
        Ok(Node::Block(Block::new(token.position)))
    }

    fn relative_parser(
        &self,
        target: &str,
        position: &SourcePosition,
    ) -> Result<Parser, Diagnostic> {
        let source = match &self.source {
            Some(source) if !self.filename.is_empty() => Rc::clone(source),
            _ => {
                return Err(Diagnostic::semantic(
                    "E2008",
                    format!("cannot resolve `{target}` from a template that has no file"),
                    position.clone(),
                ))
            }
        };

        let current = path::clean(self.separator, &self.filename);
        let resolved = path::resolve_relative(self.separator, &current, target);
        if resolved == current || self.ancestry.contains(&resolved) {
            let mut chain = self.ancestry.clone();
            chain.push(current);
            chain.push(resolved);
            return Err(Diagnostic::semantic(
                "E2007",
                format!("template cycle: {}", chain.join(" -> ")),
                position.clone(),
            ));
        }

        debug!("resolving {target} from {} as {resolved}", self.filename);
        let input = source.read(&resolved, self.separator).map_err(|err| {
            Diagnostic::resolution(
                "E4001",
                format!("unable to read `{resolved}`: {err}"),
                position.clone(),
            )
        })?;

        let mut parser = Parser::new(&input, &resolved).with_source(source, self.separator);
        parser.ancestry = self.ancestry.clone();
        parser.ancestry.push(current);
        Ok(parser)
    }

    fn parse_named_block(&mut self) -> Result<Node, Diagnostic> {
        let token = self.expect(TokenKind::NamedBlock)?;
        if self.named_blocks.contains_key(&token.value) {
            return Err(Diagnostic::semantic(
                "E2001",
                format!("named block `{}` is already defined", token.value),
                token.position,
            ));
        }
        let modifier = match token.data("Modifier") {
            "append" => BlockModifier::Append,
            "prepend" => BlockModifier::Prepend,
            _ => BlockModifier::Default,
        };
        let block = if self.at_block()? {
            self.parse_block(None)?
        } else {
            Block::new(token.position.clone())
        };
        let named = NamedBlock {
            name: token.value,
            modifier,
            block,
            position: token.position,
        };
        self.named_blocks.insert(named.name.clone(), named.clone());
        Ok(Node::NamedBlock(named))
    }

    fn parse_doctype(&mut self) -> Result<Node, Diagnostic> {
        let token = self.expect(TokenKind::Doctype)?;
        Ok(Node::Doctype(Doctype {
            value: token.value,
            position: token.position,
        }))
    }

    fn parse_comment(&mut self) -> Result<Node, Diagnostic> {
        let token = self.expect(TokenKind::Comment)?;
        let block = if self.at_block()? {
            Some(self.parse_block(None)?)
        } else {
            None
        };
        Ok(Node::Comment(Comment {
            silent: token.data("Mode") == "silent",
            value: token.value,
            block,
            position: token.position,
        }))
    }

    fn parse_text(&mut self) -> Result<Text, Diagnostic> {
        let token = self.expect(TokenKind::Text)?;
        Ok(Text {
            raw: token.data("Mode") == "raw",
            value: token.value,
            position: token.position,
        })
    }

    fn parse_buffered(&mut self) -> Result<Buffered, Diagnostic> {
        let token = self.expect(TokenKind::Buffered)?;
        Ok(Buffered {
            escaped: token.data("Mode") == "escaped",
            expression: token.value,
            position: token.position,
        })
    }

    fn parse_assignment(&mut self) -> Result<Node, Diagnostic> {
        let token = self.expect(TokenKind::Assignment)?;
        Ok(Node::Assignment(Assignment {
            variable: token.data("X").to_string(),
            expression: token.value,
            position: token.position,
        }))
    }

    fn parse_tag(&mut self) -> Result<Tag, Diagnostic> {
        let token = self.expect(TokenKind::Tag)?;
        let tag = Tag::new(&token.value, token.position);
        self.parse_tag_body(tag)
    }

    fn parse_tagless(&mut self) -> Result<Tag, Diagnostic> {
        if !self.current.data("Condition").is_empty() {
            return Err(self.misplaced_attribute());
        }
        let token = self.bump()?;
        let name = if token.kind == TokenKind::Id { "id" } else { "class" };
        let mut tag = Tag::new("div", token.position.clone());
        tag.attributes.push(Attribute {
            name: name.to_string(),
            value: token.value,
            is_raw: true,
            condition: None,
            position: token.position,
        });
        self.parse_tag_body(tag)
    }

    fn parse_tag_body(&mut self, mut tag: Tag) -> Result<Tag, Diagnostic> {
        loop {
            match self.current.kind {
                TokenKind::Id | TokenKind::ClassName | TokenKind::Attribute => {
                    if !self.current.data("Condition").is_empty() {
                        return Err(Diagnostic::semantic(
                            "E2003",
                            "conditional attributes must be placed in a block within a tag",
                            self.current.position.clone(),
                        ));
                    }
                    let token = self.bump()?;
                    let attribute = match token.kind {
                        TokenKind::Id => selector_attribute("id", &token),
                        TokenKind::ClassName => selector_attribute("class", &token),
                        _ => attribute_from_token(&token),
                    };
                    tag.attributes.push(attribute);
                }
                TokenKind::AttributeList => {
                    let token = self.bump()?;
                    tag.attributes
                        .extend(token.children.iter().map(attribute_from_token));
                }
                TokenKind::Text if self.current.data("Mode") != "piped" => {
                    let text = self.parse_text()?;
                    tag.block_mut().push_front(Node::Text(text));
                }
                TokenKind::Buffered => {
                    let buffered = self.parse_buffered()?;
                    tag.block_mut().push_front(Node::Buffered(buffered));
                }
                TokenKind::Semicolon => {
                    self.advance()?;
                    let inner = match self.current.kind {
                        TokenKind::Tag => self.parse_tag()?,
                        TokenKind::Id | TokenKind::ClassName => self.parse_tagless()?,
                        _ => return Err(self.unexpected()),
                    };
                    tag.block_mut().push(Node::Tag(inner));
                    break;
                }
                TokenKind::NewLine => {
                    if self.at_block()? {
                        if tag.raw_text {
                            self.scanner.set_raw_mode(true);
                        }
                        let block = self.parse_block(Some(&mut tag))?;
                        match tag.block.as_mut() {
                            Some(existing) => existing.children.extend(block.children),
                            None => tag.block = Some(block),
                        }
                    }
                    break;
                }
                _ => break,
            }
        }
        Ok(tag)
    }

    fn parse_mixin(&mut self) -> Result<Node, Diagnostic> {
        let token = self.expect(TokenKind::Mixin)?;
        let params = token
            .data("Args")
            .split(',')
            .map(str::trim)
            .filter(|param| !param.is_empty())
            .map(str::to_string)
            .collect();
        let block = if self.at_block()? {
            self.parse_block(None)?
        } else {
            Block::new(token.position.clone())
        };
        Ok(Node::Mixin(Mixin {
            name: token.value,
            params,
            block,
            position: token.position,
        }))
    }

    fn parse_mixin_call(&mut self) -> Result<Node, Diagnostic> {
        let token = self.expect(TokenKind::MixinCall)?;
        Ok(Node::MixinCall(MixinCall {
            args: split_top_level(token.data("Args"), ','),
            name: token.value,
            position: token.position,
        }))
    }
}

fn selector_attribute(name: &str, token: &Token) -> Attribute {
    Attribute {
        name: name.to_string(),
        value: token.value.clone(),
        is_raw: true,
        condition: None,
        position: token.position.clone(),
    }
}

fn attribute_from_token(token: &Token) -> Attribute {
    Attribute {
        name: token.value.clone(),
        value: token.data("Content").to_string(),
        is_raw: token.data("Mode") == "raw",
        condition: None,
        position: token.position.clone(),
    }
}
