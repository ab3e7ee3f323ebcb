use std::path::Path;

use serde::Deserialize;

use crate::syntax::DEFAULT_EXTENSION;
use crate::{DirOptions, JadeError, Options};

/// Contents of a `jade.toml` file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JadeToml {
    #[serde(default)]
    pub compiler: JadeTomlCompiler,
    #[serde(default)]
    pub dir: JadeTomlDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JadeTomlCompiler {
    #[serde(default = "default_pretty_print")]
    pub pretty_print: bool,
    #[serde(default)]
    pub line_numbers: bool,
    #[serde(default = "default_path_separator")]
    pub path_separator: String,
    /// Names of custom functions the executor registers.
    #[serde(default)]
    pub functions: Vec<String>,
}

impl Default for JadeTomlCompiler {
    fn default() -> Self {
        Self {
            pretty_print: default_pretty_print(),
            line_numbers: false,
            path_separator: default_path_separator(),
            functions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JadeTomlDir {
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

impl Default for JadeTomlDir {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            recursive: default_recursive(),
        }
    }
}

fn default_pretty_print() -> bool {
    true
}

fn default_path_separator() -> String {
    "/".to_string()
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_recursive() -> bool {
    true
}

impl JadeToml {
    /// Applies the `[compiler]` table on top of `options`.
    pub fn apply(&self, options: &mut Options) -> Result<(), JadeError> {
        let mut chars = self.compiler.path_separator.chars();
        let separator = match (chars.next(), chars.next()) {
            (Some(separator), None) => separator,
            _ => {
                return Err(JadeError::Config(format!(
                    "path_separator must be a single character, got `{}`",
                    self.compiler.path_separator
                )))
            }
        };
        options.pretty_print = self.compiler.pretty_print;
        options.line_numbers = self.compiler.line_numbers;
        options.path_separator = separator;
        options
            .functions
            .extend(self.compiler.functions.iter().cloned());
        Ok(())
    }

    pub fn dir_options(&self) -> DirOptions {
        DirOptions {
            extension: self.dir.extension.clone(),
            recursive: self.dir.recursive,
        }
    }
}

pub fn parse_jade_toml(text: &str) -> Result<JadeToml, JadeError> {
    toml::from_str(text).map_err(|err| JadeError::Config(err.to_string()))
}

pub fn read_jade_toml(path: &Path) -> Result<JadeToml, JadeError> {
    let text = std::fs::read_to_string(path).map_err(|source| JadeError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text)
        .map_err(|err| JadeError::Config(format!("failed to parse {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_jade_toml("").expect("parse");
        assert_eq!(config, JadeToml::default());
        assert!(config.compiler.pretty_print);
        assert_eq!(config.dir.extension, ".jade");
        assert!(config.dir.recursive);
    }

    #[test]
    fn applies_compiler_settings() {
        let config = parse_jade_toml(
            "[compiler]\npretty_print = false\nline_numbers = true\npath_separator = \"\\\\\"\nfunctions = [\"foo\", \"bar\"]\n\n[dir]\nextension = \".pug\"\nrecursive = false\n",
        )
        .expect("parse");
        let mut options = Options::default();
        config.apply(&mut options).expect("apply");
        assert!(!options.pretty_print);
        assert!(options.line_numbers);
        assert_eq!(options.path_separator, '\\');
        assert!(options.functions.contains("foo"));

        let dir = config.dir_options();
        assert_eq!(dir.extension, ".pug");
        assert!(!dir.recursive);
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(matches!(
            parse_jade_toml("[compiler]\nunknown = 1\n"),
            Err(JadeError::Config(_))
        ));
        let config = parse_jade_toml("[compiler]\npath_separator = \"//\"\n").expect("parse");
        let err = config.apply(&mut Options::default()).expect_err("separator");
        assert!(err.to_string().contains("single character"));
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jade.toml");
        std::fs::write(&path, "[dir]\nrecursive = false\n").expect("write");
        let config = read_jade_toml(&path).expect("read");
        assert!(!config.dir.recursive);
        assert!(matches!(
            read_jade_toml(&dir.path().join("missing.toml")),
            Err(JadeError::Read { .. })
        ));
    }
}
