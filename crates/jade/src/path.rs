//! Separator-aware path helpers for template names.
//!
//! Template paths are plain strings using a configurable separator so the
//! same templates resolve identically on disk and in an in-memory source.

use crate::syntax::DEFAULT_EXTENSION;

pub fn dir(separator: char, path: &str) -> &str {
    match path.rfind(separator) {
        Some(0) => &path[..separator.len_utf8()],
        Some(index) => &path[..index],
        None => "",
    }
}

pub fn base(separator: char, path: &str) -> &str {
    match path.rfind(separator) {
        Some(index) => &path[index + separator.len_utf8()..],
        None => path,
    }
}

pub fn has_extension(separator: char, path: &str) -> bool {
    base(separator, path).contains('.')
}

pub fn strip_extension<'a>(separator: char, path: &'a str, extension: &str) -> &'a str {
    if !extension.is_empty() && base(separator, path).ends_with(extension) {
        &path[..path.len() - extension.len()]
    } else {
        path
    }
}

/// Joins the non-empty parts and cleans the result lexically.
pub fn join(separator: char, parts: &[&str]) -> String {
    let mut joined = String::new();
    for part in parts.iter().filter(|part| !part.is_empty()) {
        if !joined.is_empty() {
            joined.push(separator);
        }
        joined.push_str(part);
    }
    clean(separator, &joined)
}

/// Removes empty and `.` segments and folds `..` into its parent where one
/// exists. Leading `..` segments of a relative path are kept.
pub fn clean(separator: char, path: &str) -> String {
    let absolute = path.starts_with(separator);
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(separator) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }
    let body = segments.join(&separator.to_string());
    match (absolute, body.is_empty()) {
        (true, _) => format!("{separator}{body}"),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

/// Resolves `target` against the directory of `current`, appending the
/// default extension when the target's base name has none.
pub fn resolve_relative(separator: char, current: &str, target: &str) -> String {
    let target = target.trim();
    let mut resolved = join(separator, &[dir(separator, current), target]);
    if !has_extension(separator, &resolved) {
        resolved.push_str(DEFAULT_EXTENSION);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_against_current_directory() {
        assert_eq!(
            resolve_relative('/', "views/pages/home.jade", "../layout"),
            "views/layout.jade"
        );
        assert_eq!(
            resolve_relative('/', "home.jade", "partials/nav.jade"),
            "partials/nav.jade"
        );
        assert_eq!(resolve_relative('\\', r"a\b.jade", "c"), r"a\c.jade");
    }

    #[test]
    fn clean_folds_dot_segments() {
        assert_eq!(clean('/', "a/./b//c/../d"), "a/b/d");
        assert_eq!(clean('/', "../x"), "../x");
        assert_eq!(clean('/', "/../x"), "/x");
        assert_eq!(clean('/', ""), ".");
    }

    #[test]
    fn splits_dir_and_base() {
        assert_eq!(dir('/', "a/b/c.jade"), "a/b");
        assert_eq!(dir('/', "c.jade"), "");
        assert_eq!(base('/', "a/b/c.jade"), "c.jade");
        assert_eq!(strip_extension('/', "a/b/c.jade", ".jade"), "a/b/c");
        assert_eq!(strip_extension('/', "a/b/c.pug", ".jade"), "a/b/c.pug");
    }
}
