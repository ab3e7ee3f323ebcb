//! Compiler from indentation-based Jade templates to flat `{{...}}`
//! instruction text for a `text/template` style executor.
//!
//! ```no_run
//! let options = jade::Options::default();
//! let body = jade::compile("div#main\n\tp Hello #{Name}", &options)?;
//! assert!(body.starts_with("<div id=\"main\">"));
//! # Ok::<(), jade::JadeError>(())
//! ```

pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod expr;
pub mod lexer;
pub mod merge;
pub mod mixins;
pub mod parser;
pub mod path;
pub mod source;
pub mod syntax;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::rc::Rc;

use log::debug;
use serde::Serialize;

use crate::ast::Block;
use crate::codegen::Emitter;
use crate::parser::Parser;
use crate::source::{DiskSource, FileSource};

pub use crate::config::{read_jade_toml, JadeToml};
pub use crate::diagnostics::{render_diagnostic, Diagnostic, DiagnosticKind, SourcePosition};
pub use crate::source::MemorySource;

#[derive(Debug, Clone)]
pub struct Options {
    /// Indent the output with tabs. Compact output otherwise.
    pub pretty_print: bool,
    /// Emit `{{/* file:line */}}` markers ahead of nodes.
    pub line_numbers: bool,
    /// Where `extends`, `import` and directory compiles read templates from.
    pub source: Rc<dyn FileSource>,
    pub path_separator: char,
    /// Custom function names; calls to them are emitted by name.
    pub functions: BTreeSet<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pretty_print: true,
            line_numbers: false,
            source: Rc::new(DiskSource::default()),
            path_separator: '/',
            functions: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirOptions {
    /// Only files ending in this extension are compiled.
    pub extension: String,
    pub recursive: bool,
}

impl Default for DirOptions {
    fn default() -> Self {
        Self {
            extension: syntax::DEFAULT_EXTENSION.to_string(),
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledTemplate {
    /// Path relative to the compiled directory, without its extension.
    pub name: String,
    pub path: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum JadeError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("unable to read `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid template directory `{path}`: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parses templates and renders the parsed tree.
///
/// A compiler holds at most one parsed tree; every `parse*` call replaces it.
#[derive(Debug)]
pub struct Compiler {
    options: Options,
    filename: String,
    root: Block,
}

impl Compiler {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            filename: String::new(),
            root: Block::default(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Names the template parsed by [`Compiler::parse`]. Positions report it
    /// and relative `extends`/`import` targets resolve against it.
    pub fn set_filename(&mut self, filename: &str) {
        self.filename = filename.to_string();
    }

    pub fn parse(&mut self, input: &str) -> Result<(), JadeError> {
        let mut parser = Parser::new(input, &self.filename)
            .with_source(Rc::clone(&self.options.source), self.options.path_separator);
        self.root = parser.parse()?.clone();
        Ok(())
    }

    pub fn parse_file(&mut self, filename: &str) -> Result<(), JadeError> {
        debug!("parsing {filename}");
        let mut parser = Parser::from_source(
            Rc::clone(&self.options.source),
            self.options.path_separator,
            filename,
        )
        .map_err(|source| JadeError::Read {
            path: filename.to_string(),
            source,
        })?;
        self.root = parser.parse()?.clone();
        self.filename = filename.to_string();
        Ok(())
    }

    /// The merged tree of the last successful parse.
    pub fn ast(&self) -> &Block {
        &self.root
    }

    pub fn compile_string(&self) -> Result<String, JadeError> {
        let body = Emitter::new(&self.options).compile(&self.root)?;
        Ok(body)
    }

    pub fn compile_writer(&self, out: &mut impl Write) -> Result<(), JadeError> {
        let body = self.compile_string()?;
        out.write_all(body.as_bytes())?;
        Ok(())
    }
}

/// Compiles template text. Relative `extends`/`import` targets cannot be
/// resolved because the text has no file name.
pub fn compile(input: &str, options: &Options) -> Result<String, JadeError> {
    let mut compiler = Compiler::new(options.clone());
    compiler.parse(input)?;
    compiler.compile_string()
}

pub fn compile_file(filename: &str, options: &Options) -> Result<String, JadeError> {
    let mut compiler = Compiler::new(options.clone());
    compiler.parse_file(filename)?;
    compiler.compile_string()
}

/// Compiles every template below `dir` whose name ends in the configured
/// extension, keyed by its relative path without that extension, e.g.
/// `layouts/base` for `dir/layouts/base.jade`.
pub fn compile_dir(
    dir: &str,
    dir_options: &DirOptions,
    options: &Options,
) -> Result<BTreeMap<String, CompiledTemplate>, JadeError> {
    let separator = options.path_separator;
    let files = options
        .source
        .list(dir, separator, dir_options.recursive)
        .map_err(|source| JadeError::InvalidPath {
            path: dir.to_string(),
            source,
        })?;

    let mut compiled = BTreeMap::new();
    for relative in files {
        if !path::base(separator, &relative).ends_with(&dir_options.extension) {
            continue;
        }
        let name = path::strip_extension(separator, &relative, &dir_options.extension).to_string();
        let full_path = path::join(separator, &[dir, relative.as_str()]);
        debug!("compiling {full_path} as `{name}`");
        let body = compile_file(&full_path, options)?;
        compiled.insert(
            name.clone(),
            CompiledTemplate {
                name,
                path: full_path,
                body,
            },
        );
    }
    Ok(compiled)
}
