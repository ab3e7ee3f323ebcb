use std::collections::{HashMap, HashSet};

use log::trace;

use crate::ast::{Block, BlockModifier, NamedBlock, Node};

/// Applies a child template's named blocks to its parent's effective tree.
///
/// Every named block of `parent` whose name the child also declares is
/// overridden once, at its first occurrence in pre-order. Parent content kept
/// by `append`/`prepend` is walked as well, so nested parent blocks stay
/// overridable.
pub fn merge(mut parent: Block, overrides: &HashMap<String, NamedBlock>) -> Block {
    let mut applied = HashSet::new();
    walk_block(&mut parent, overrides, &mut applied);
    parent
}

fn walk_block(
    block: &mut Block,
    overrides: &HashMap<String, NamedBlock>,
    applied: &mut HashSet<String>,
) {
    for node in &mut block.children {
        walk_node(node, overrides, applied);
    }
}

fn walk_node(
    node: &mut Node,
    overrides: &HashMap<String, NamedBlock>,
    applied: &mut HashSet<String>,
) {
    match node {
        Node::NamedBlock(named) => {
            let own = overrides
                .get(&named.name)
                .filter(|_| !applied.contains(&named.name));
            let Some(own) = own else {
                walk_block(&mut named.block, overrides, applied);
                return;
            };
            applied.insert(named.name.clone());
            trace!("overriding block `{}` ({:?})", named.name, own.modifier);
            match own.modifier {
                BlockModifier::Default => {
                    named.block.children = own.block.children.clone();
                }
                BlockModifier::Append => {
                    walk_block(&mut named.block, overrides, applied);
                    named.block.children.extend(own.block.children.iter().cloned());
                }
                BlockModifier::Prepend => {
                    walk_block(&mut named.block, overrides, applied);
                    let mut children = own.block.children.clone();
                    children.append(&mut named.block.children);
                    named.block.children = children;
                }
            }
        }
        Node::Block(block) => walk_block(block, overrides, applied),
        Node::Tag(tag) => {
            if let Some(block) = tag.block.as_mut() {
                walk_block(block, overrides, applied);
            }
        }
        Node::Condition(condition) => {
            walk_block(&mut condition.positive, overrides, applied);
            if let Some(block) = condition.negative.as_mut() {
                walk_block(block, overrides, applied);
            }
        }
        Node::Each(each) => {
            if let Some(block) = each.block.as_mut() {
                walk_block(block, overrides, applied);
            }
        }
        Node::Comment(comment) => {
            if let Some(block) = comment.block.as_mut() {
                walk_block(block, overrides, applied);
            }
        }
        Node::Mixin(mixin) => walk_block(&mut mixin.block, overrides, applied),
        Node::Text(_)
        | Node::Buffered(_)
        | Node::Assignment(_)
        | Node::Doctype(_)
        | Node::MixinCall(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Text;
    use crate::diagnostics::SourcePosition;

    fn text(value: &str) -> Node {
        Node::Text(Text {
            value: value.to_string(),
            raw: false,
            position: SourcePosition::default(),
        })
    }

    fn named(name: &str, modifier: BlockModifier, children: Vec<Node>) -> NamedBlock {
        NamedBlock {
            name: name.to_string(),
            modifier,
            block: Block {
                children,
                position: SourcePosition::default(),
            },
            position: SourcePosition::default(),
        }
    }

    fn parent_tree() -> Block {
        Block {
            children: vec![Node::NamedBlock(named(
                "content",
                BlockModifier::Default,
                vec![text("P1"), text("P2")],
            ))],
            position: SourcePosition::default(),
        }
    }

    fn merged_values(modifier: BlockModifier) -> Vec<String> {
        let mut overrides = HashMap::new();
        overrides.insert(
            "content".to_string(),
            named("content", modifier, vec![text("C1"), text("C2")]),
        );
        let merged = merge(parent_tree(), &overrides);
        let Node::NamedBlock(block) = &merged.children[0] else {
            panic!("expected named block");
        };
        block
            .block
            .children
            .iter()
            .map(|node| match node {
                Node::Text(text) => text.value.clone(),
                other => panic!("unexpected node {other:?}"),
            })
            .collect()
    }

    #[test]
    fn append_prepend_and_replace() {
        assert_eq!(merged_values(BlockModifier::Append), ["P1", "P2", "C1", "C2"]);
        assert_eq!(merged_values(BlockModifier::Prepend), ["C1", "C2", "P1", "P2"]);
        assert_eq!(merged_values(BlockModifier::Default), ["C1", "C2"]);
    }

    #[test]
    fn blocks_without_override_are_kept() {
        let merged = merge(parent_tree(), &HashMap::new());
        assert_eq!(merged, parent_tree());
    }

    #[test]
    fn nested_parent_blocks_stay_overridable_under_append() {
        let parent = Block {
            children: vec![Node::NamedBlock(named(
                "outer",
                BlockModifier::Default,
                vec![Node::NamedBlock(named(
                    "inner",
                    BlockModifier::Default,
                    vec![text("old")],
                ))],
            ))],
            position: SourcePosition::default(),
        };
        let mut overrides = HashMap::new();
        overrides.insert(
            "outer".to_string(),
            named("outer", BlockModifier::Append, vec![text("tail")]),
        );
        overrides.insert(
            "inner".to_string(),
            named("inner", BlockModifier::Default, vec![text("new")]),
        );

        let merged = merge(parent, &overrides);
        let Node::NamedBlock(outer) = &merged.children[0] else {
            panic!("expected outer block");
        };
        let Node::NamedBlock(inner) = &outer.block.children[0] else {
            panic!("expected inner block");
        };
        assert_eq!(inner.block.children, vec![text("new")]);
        assert_eq!(outer.block.children[1], text("tail"));
    }
}
