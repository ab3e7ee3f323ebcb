//! Static tables shared by the scanner, parser and code generator.
//!
//! The executor that runs compiled templates must provide every name in
//! [`RUNTIME_FUNCTIONS`] in addition to the builtins of its own instruction
//! language (`and`, `or`, `not`, `len`, `index`, `print`, ...).

pub const DEFAULT_EXTENSION: &str = ".jade";

/// Builtins of the executor that compiled templates call by name.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "len",
    "print",
    "printf",
    "println",
    "urlquery",
    "js",
    "json",
    "index",
    "html",
    "unescaped",
];

/// Helpers the compiled instructions reference by name.
pub const RUNTIME_FUNCTIONS: &[&str] = &[
    "__jade_add",
    "__jade_sub",
    "__jade_mul",
    "__jade_quo",
    "__jade_rem",
    "__jade_minus",
    "__jade_plus",
    "__jade_eql",
    "__jade_lss",
    "__jade_gtr",
    "json",
    "unescaped",
    "safeJS",
];

pub const SELF_CLOSING_TAGS: &[&str] = &[
    "meta", "img", "link", "input", "source", "area", "base", "col", "br", "hr",
];

/// Tags whose indented body is captured verbatim instead of being tokenized.
pub const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

pub const TEMP_PREFIX: &str = "$__jade_";

pub fn is_self_closing(tag: &str) -> bool {
    SELF_CLOSING_TAGS.contains(&tag)
}

pub fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_TAGS.contains(&tag)
}

pub fn is_runtime_function(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&name) || RUNTIME_FUNCTIONS.contains(&name)
}

pub fn doctype_markup(value: &str) -> String {
    let markup = match value {
        "5" | "html" => "<!DOCTYPE html>",
        "xml" => r#"<?xml version="1.0" encoding="utf-8" ?>"#,
        "" | "def" | "default" | "transitional" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#
        }
        "strict" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#
        }
        "frameset" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Frameset//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-frameset.dtd">"#
        }
        "1.1" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">"#
        }
        "basic" => {
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML Basic 1.1//EN" "http://www.w3.org/TR/xhtml-basic/xhtml-basic11.dtd">"#
        }
        "mobile" => {
            r#"<!DOCTYPE html PUBLIC "-//WAPFORUM//DTD XHTML Mobile 1.2//EN" "http://www.openmobilealliance.org/tech/DTD/xhtml-mobile12.dtd">"#
        }
        other => return format!("<!DOCTYPE {other}>"),
    };
    markup.to_string()
}
