use serde::Serialize;

use crate::diagnostics::SourcePosition;
use crate::syntax;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "node")]
pub enum Node {
    Block(Block),
    Tag(Tag),
    Text(Text),
    Buffered(Buffered),
    Assignment(Assignment),
    Condition(Condition),
    Each(Each),
    Doctype(Doctype),
    Comment(Comment),
    Mixin(Mixin),
    MixinCall(MixinCall),
    NamedBlock(NamedBlock),
}

impl Node {
    pub fn position(&self) -> &SourcePosition {
        match self {
            Node::Block(node) => &node.position,
            Node::Tag(node) => &node.position,
            Node::Text(node) => &node.position,
            Node::Buffered(node) => &node.position,
            Node::Assignment(node) => &node.position,
            Node::Condition(node) => &node.position,
            Node::Each(node) => &node.position,
            Node::Doctype(node) => &node.position,
            Node::Comment(node) => &node.position,
            Node::Mixin(node) => &node.position,
            Node::MixinCall(node) => &node.position,
            Node::NamedBlock(node) => &node.position,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Block {
    pub children: Vec<Node>,
    pub position: SourcePosition,
}

impl Block {
    pub fn new(position: SourcePosition) -> Self {
        Self {
            children: Vec::new(),
            position,
        }
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn push_front(&mut self, node: Node) {
        self.children.insert(0, node);
    }

    /// A block renders on its owner's line when it is empty or holds only
    /// single-line text.
    pub fn can_inline(&self) -> bool {
        self.children.iter().all(|child| match child {
            Node::Text(text) => !text.value.contains('\n'),
            _ => false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub block: Option<Block>,
    pub self_closing: bool,
    pub raw_text: bool,
    pub position: SourcePosition,
}

impl Tag {
    pub fn new(name: &str, position: SourcePosition) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            block: None,
            self_closing: syntax::is_self_closing(name),
            raw_text: syntax::is_raw_text(name),
            position,
        }
    }

    pub fn block_mut(&mut self) -> &mut Block {
        let position = self.position.clone();
        self.block.get_or_insert_with(|| Block::new(position))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    /// Literal text rather than an expression.
    pub is_raw: bool,
    pub condition: Option<String>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Text {
    pub value: String,
    pub raw: bool,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Buffered {
    pub expression: String,
    pub escaped: bool,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub variable: String,
    pub expression: String,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub expression: String,
    pub positive: Block,
    pub negative: Option<Block>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Each {
    pub expression: String,
    pub value_name: String,
    pub index_name: Option<String>,
    pub block: Option<Block>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Doctype {
    pub value: String,
    pub position: SourcePosition,
}

impl Doctype {
    pub fn markup(&self) -> String {
        syntax::doctype_markup(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub value: String,
    pub silent: bool,
    pub block: Option<Block>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mixin {
    pub name: String,
    pub params: Vec<String>,
    pub block: Block,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixinCall {
    pub name: String,
    pub args: Vec<String>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockModifier {
    Default,
    Append,
    Prepend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedBlock {
    pub name: String,
    pub modifier: BlockModifier,
    pub block: Block,
    pub position: SourcePosition,
}
