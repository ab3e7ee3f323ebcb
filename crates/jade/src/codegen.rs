//! Tree walk from a merged [`Block`] to flat executor instructions.
//!
//! Expressions embedded in attributes, text and control nodes are handed to
//! [`crate::expr::transpile`]; the temporaries it produces are written ahead of
//! the construct that uses them so every `{{...}}` action stays primitive.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::ast::{
    Assignment, Block, BlockModifier, Buffered, Comment, Condition, Each, Mixin, MixinCall, Node,
    Tag, Text,
};
use crate::diagnostics::{Diagnostic, SourcePosition};
use crate::expr::{self, Lowered};
use crate::mixins::MixinTable;
use crate::Options;

fn interpolation() -> &'static Regex {
    static INTERPOLATION: OnceLock<Regex> = OnceLock::new();
    INTERPOLATION.get_or_init(|| Regex::new(r"#\{(.*?)\}").expect("interpolation pattern is valid"))
}

fn delimiters() -> &'static Regex {
    static DELIMITERS: OnceLock<Regex> = OnceLock::new();
    DELIMITERS.get_or_init(|| Regex::new(r"\{\{|\}\}").expect("delimiter pattern is valid"))
}

/// Rewrites literal action delimiters so the executor prints them instead of
/// evaluating them.
pub fn neutralise(text: &str) -> String {
    delimiters()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            format!("{{{{\"{}\"}}}}", &caps[0])
        })
        .into_owned()
}

/// Neutralises a literal run that sits next to emitted actions. A lone `{`
/// just before an action, or `}` just after one, would otherwise fuse with
/// the action's delimiters.
fn literal_between(text: &str, after_action: bool, before_action: bool) -> String {
    let mut out = neutralise(text);
    if before_action && out.ends_with('{') {
        out.pop();
        out.push_str("{{\"{\"}}");
    }
    if after_action && out.starts_with('}') {
        out.replace_range(..1, "{{\"}\"}}");
    }
    out
}

/// Escapes `text` for use inside a double-quoted instruction string.
fn quote_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Clone)]
struct RenderedAttribute {
    value: String,
    condition: Option<String>,
}

impl RenderedAttribute {
    /// Moves the guard into the value so it can be concatenated.
    fn fold_condition(&mut self) {
        if let Some(condition) = self.condition.take() {
            self.value = format!("{{{{if {condition}}}}}{}{{{{end}}}}", self.value);
        }
    }
}

/// Traversal state of one compile: output buffer, indentation, temporary
/// counter and the mixins registered so far.
#[derive(Debug)]
pub struct Emitter<'a> {
    options: &'a Options,
    buffer: String,
    indent_level: usize,
    temps: usize,
    mixins: MixinTable,
    last_marker: Option<(String, usize)>,
}

impl<'a> Emitter<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self {
            options,
            buffer: String::new(),
            indent_level: 0,
            temps: 0,
            mixins: MixinTable::new(),
            last_marker: None,
        }
    }

    /// Renders `root`. Every call starts from a clean state, so compiling the
    /// same tree twice gives identical text.
    pub fn compile(&mut self, root: &Block) -> Result<String, Diagnostic> {
        self.buffer.clear();
        self.indent_level = 0;
        self.temps = 0;
        self.mixins.clear();
        self.last_marker = None;

        self.visit_block(root)?;
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        debug!(
            "emitted {} bytes using {} temporaries",
            self.buffer.len(),
            self.temps
        );
        Ok(std::mem::take(&mut self.buffer))
    }

    fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    fn indent(&mut self, offset: usize, newline: bool) {
        if !self.options.pretty_print {
            return;
        }
        if newline && !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        for _ in 0..self.indent_level + offset {
            self.buffer.push('\t');
        }
    }

    fn lower(&mut self, source: &str, position: &SourcePosition) -> Result<Lowered, Diagnostic> {
        expr::transpile(source, &self.options.functions, &mut self.temps)
            .map_err(|err| err.into_diagnostic(position.clone()))
    }

    /// Writes the temporaries of `source` and returns its value reference.
    fn lower_inline(&mut self, source: &str, position: &SourcePosition) -> Result<String, Diagnostic> {
        let lowered = self.lower(source, position)?;
        self.write(&lowered.prelude());
        Ok(lowered.value)
    }

    fn mark_line(&mut self, position: &SourcePosition) {
        if !self.options.line_numbers || position.line == 0 {
            return;
        }
        let marker = (position.filename.clone(), position.line);
        if self.last_marker.as_ref() == Some(&marker) {
            return;
        }
        let text = if marker.0.is_empty() {
            format!("{{{{/* line {} */}}}}", marker.1)
        } else {
            format!("{{{{/* {}:{} */}}}}", marker.0, marker.1)
        };
        self.write(&text);
        self.last_marker = Some(marker);
    }

    fn visit(&mut self, node: &Node) -> Result<(), Diagnostic> {
        if !matches!(node, Node::Block(_) | Node::NamedBlock(_) | Node::Mixin(_)) {
            self.mark_line(node.position());
        }
        match node {
            Node::Block(block) => self.visit_block(block),
            Node::Tag(tag) => self.visit_tag(tag),
            Node::Text(text) => self.visit_text(text),
            Node::Buffered(buffered) => self.visit_buffered(buffered),
            Node::Assignment(assignment) => self.visit_assignment(assignment),
            Node::Condition(condition) => self.visit_condition(condition),
            Node::Each(each) => self.visit_each(each),
            Node::Doctype(doctype) => {
                self.write(&doctype.markup());
                Ok(())
            }
            Node::Comment(comment) => self.visit_comment(comment),
            Node::Mixin(mixin) => {
                self.visit_mixin(mixin);
                Ok(())
            }
            Node::MixinCall(call) => self.visit_mixin_call(call),
            Node::NamedBlock(named) => match named.modifier {
                BlockModifier::Default => self.visit_block(&named.block),
                BlockModifier::Append | BlockModifier::Prepend => Ok(()),
            },
        }
    }

    fn visit_block(&mut self, block: &Block) -> Result<(), Diagnostic> {
        let inline = block.can_inline();
        for child in &block.children {
            if !inline && matches!(child, Node::Text(_)) {
                self.indent(0, true);
            }
            self.visit(child)?;
        }
        Ok(())
    }

    fn visit_tag(&mut self, tag: &Tag) -> Result<(), Diagnostic> {
        let mut prelude = String::new();
        let mut rendered: BTreeMap<String, RenderedAttribute> = BTreeMap::new();

        for attribute in &tag.attributes {
            let value = if attribute.is_raw {
                neutralise(&attribute.value)
            } else {
                let lowered = self.lower(&attribute.value, &attribute.position)?;
                prelude.push_str(&lowered.prelude());
                if attribute.name.starts_with("on") {
                    format!("{{{{safeJS {}}}}}", lowered.value)
                } else {
                    lowered.action()
                }
            };
            let condition = match &attribute.condition {
                Some(guard) => {
                    let lowered = self.lower(guard, &attribute.position)?;
                    prelude.push_str(&lowered.prelude());
                    Some(lowered.value)
                }
                None => None,
            };
            let mut current = RenderedAttribute { value, condition };

            match rendered.get_mut(&attribute.name) {
                Some(previous) if attribute.name == "class" => {
                    current.value.insert(0, ' ');
                    current.fold_condition();
                    previous.fold_condition();
                    previous.value.push_str(&current.value);
                }
                _ => {
                    rendered.insert(attribute.name.clone(), current);
                }
            }
        }

        self.indent(0, true);
        self.write(&prelude);
        self.write("<");
        self.write(&tag.name);
        for (name, attribute) in &rendered {
            if let Some(condition) = &attribute.condition {
                self.write(&format!("{{{{if {condition}}}}}"));
            }
            if attribute.value.is_empty() {
                self.write(&format!(" {name}"));
            } else {
                self.write(&format!(" {name}=\"{}\"", attribute.value));
            }
            if attribute.condition.is_some() {
                self.write("{{end}}");
            }
        }

        if tag.self_closing {
            self.write(" />");
            return Ok(());
        }
        self.write(">");

        if let Some(block) = &tag.block {
            let inline = block.can_inline();
            if !inline {
                self.indent_level += 1;
            }
            self.visit_block(block)?;
            if !inline {
                self.indent_level -= 1;
                self.indent(0, true);
            }
        }

        self.write("</");
        self.write(&tag.name);
        self.write(">");
        Ok(())
    }

    fn visit_text(&mut self, text: &Text) -> Result<(), Diagnostic> {
        let value = if text.raw {
            neutralise(&text.value)
        } else {
            self.interpolate(&text.value, &text.position)?
        };

        let mut lines = value.split('\n').peekable();
        while let Some(line) = lines.next() {
            self.write(line);
            if lines.peek().is_some() {
                self.write("\n");
                self.indent(0, false);
            }
        }
        Ok(())
    }

    /// Replaces `#{expr}` markers with value references, writing their
    /// temporaries first, and neutralises the literal parts.
    fn interpolate(&mut self, text: &str, position: &SourcePosition) -> Result<String, Diagnostic> {
        let mut out = String::new();
        let mut last = 0;
        for caps in interpolation().captures_iter(text) {
            let (Some(marker), Some(source)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&literal_between(&text[last..marker.start()], last > 0, true));
            let lowered = self.lower(source.as_str(), position)?;
            self.write(&lowered.prelude());
            out.push_str(&lowered.action());
            last = marker.end();
        }
        out.push_str(&literal_between(&text[last..], last > 0, false));
        Ok(out)
    }

    fn visit_buffered(&mut self, buffered: &Buffered) -> Result<(), Diagnostic> {
        if buffered.escaped {
            let lowered = self.lower(&buffered.expression, &buffered.position)?;
            self.write(&lowered.render());
        } else {
            let value = self.lower_inline(&buffered.expression, &buffered.position)?;
            self.write(&format!("{{{{unescaped {value}}}}}"));
        }
        Ok(())
    }

    fn visit_assignment(&mut self, assignment: &Assignment) -> Result<(), Diagnostic> {
        let value = self.lower_inline(&assignment.expression, &assignment.position)?;
        self.write(&format!("{{{{{} := {value}}}}}", assignment.variable));
        Ok(())
    }

    fn visit_condition(&mut self, condition: &Condition) -> Result<(), Diagnostic> {
        let value = self.lower_inline(&condition.expression, &condition.position)?;
        self.write(&format!("{{{{if {value}}}}}"));
        self.visit_block(&condition.positive)?;
        if let Some(negative) = &condition.negative {
            self.write("{{else}}");
            self.visit_block(negative)?;
        }
        self.write("{{end}}");
        Ok(())
    }

    fn visit_each(&mut self, each: &Each) -> Result<(), Diagnostic> {
        let Some(block) = &each.block else {
            return Ok(());
        };
        let value = self.lower_inline(&each.expression, &each.position)?;
        match &each.index_name {
            Some(index) => self.write(&format!(
                "{{{{range {index}, {} := {value}}}}}",
                each.value_name
            )),
            None => self.write(&format!("{{{{range {} := {value}}}}}", each.value_name)),
        }
        self.visit_block(block)?;
        self.write("{{end}}");
        Ok(())
    }

    fn visit_comment(&mut self, comment: &Comment) -> Result<(), Diagnostic> {
        if comment.silent {
            return Ok(());
        }
        self.indent(0, true);
        match &comment.block {
            None => self.write(&format!(
                "{{{{unescaped \"<!-- {} -->\"}}}}",
                quote_escape(&comment.value)
            )),
            Some(block) => {
                self.write("<!-- ");
                self.write(&neutralise(&comment.value));
                self.visit_block(block)?;
                self.write(" -->");
            }
        }
        Ok(())
    }

    fn visit_mixin(&mut self, mixin: &Mixin) {
        debug!("registering mixin `{}`", mixin.name);
        self.mixins.register(mixin);
    }

    fn visit_mixin_call(&mut self, call: &MixinCall) -> Result<(), Diagnostic> {
        let mixin = self.mixins.resolve(call)?.clone();
        for (param, arg) in mixin.params.iter().zip(&call.args) {
            let value = self.lower_inline(arg, &call.position)?;
            self.write(&format!("{{{{{param} := {value}}}}}"));
        }
        self.visit_block(&mixin.block)
    }
}

#[cfg(test)]
mod tests;
