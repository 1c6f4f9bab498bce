//! logical paths are `/` delimited and normalized to either the empty string
//! (the storage root) or a leading slash followed by segments with no
//! trailing slash, e.g. `/docs/sub`.

use crate::fs::{basename_valid, has_drive_prefix};

pub const SEPARATOR: char = '/';

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path segment would leave the storage root")]
    Traversal,

    #[error("path segment \"{0}\" is not a valid name")]
    InvalidSegment(String),
}

/// splits a logical path into its segments, ignoring empty segments created
/// by repeated or surrounding slashes.
pub fn segments(given: &str) -> Result<Vec<&str>, PathError> {
    let mut rtn = Vec::new();

    for segment in given.split(SEPARATOR) {
        if segment.is_empty() {
            continue;
        }

        if segment == "." || segment == ".." {
            return Err(PathError::Traversal);
        }

        // drive prefixes would turn into an absolute override when joined
        // onto a physical path on some platforms
        if has_drive_prefix(segment) {
            return Err(PathError::Traversal);
        }

        if !basename_valid(segment) {
            return Err(PathError::InvalidSegment(segment.to_owned()));
        }

        rtn.push(segment);
    }

    Ok(rtn)
}

pub fn normalize(given: &str) -> Result<String, PathError> {
    let parts = segments(given)?;
    let mut rtn = String::with_capacity(given.len() + 1);

    for part in parts {
        rtn.push(SEPARATOR);
        rtn.push_str(part);
    }

    Ok(rtn)
}

/// joins a normalized parent with a name. an empty name returns the parent.
pub fn join(parent: &str, name: &str) -> String {
    if name.is_empty() {
        parent.to_owned()
    } else {
        format!("{}{SEPARATOR}{name}", parent.trim_end_matches(SEPARATOR))
    }
}

/// splits a normalized full path into its parent path and name
pub fn split_full(full: &str) -> (&str, &str) {
    match full.rfind(SEPARATOR) {
        Some(index) => (&full[..index], &full[index + 1..]),
        None => ("", full),
    }
}

pub fn is_root(path: &str) -> bool {
    path.trim_matches(SEPARATOR).is_empty()
}

/// true if `path` is `ancestor` or is contained by it
pub fn is_within(ancestor: &str, path: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }

    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// replaces the `old_prefix` portion of `path` with `new_prefix`. returns
/// None if `path` is not within `old_prefix`.
pub fn rebase(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    if !is_within(old_prefix, path) {
        return None;
    }

    let rest = &path[old_prefix.len()..];

    Some(format!("{}{rest}", new_prefix.trim_end_matches(SEPARATOR)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalize_paths() {
        let valid = [
            ("", ""),
            ("/", ""),
            ("docs", "/docs"),
            ("/docs/", "/docs"),
            ("//docs//sub", "/docs/sub"),
        ];

        for (given, expected) in valid {
            assert_eq!(normalize(given).as_deref(), Ok(expected), "given {:?}", given);
        }

        let traversal = [
            "..",
            "../../etc",
            "/docs/../../etc",
            "/docs/./sub",
            "C:/windows",
        ];

        for test in traversal {
            assert_eq!(normalize(test), Err(PathError::Traversal), "given {:?}", test);
        }

        assert!(matches!(normalize("/docs/a\\b"), Err(PathError::InvalidSegment(_))));
    }

    #[test]
    fn join_and_split() {
        assert_eq!(join("", "a.txt"), "/a.txt");
        assert_eq!(join("/docs", "a.txt"), "/docs/a.txt");
        assert_eq!(join("/docs", ""), "/docs");

        assert_eq!(split_full("/docs/a.txt"), ("/docs", "a.txt"));
        assert_eq!(split_full("/a.txt"), ("", "a.txt"));
    }

    #[test]
    fn containment() {
        assert!(is_within("/docs", "/docs"));
        assert!(is_within("/docs", "/docs/sub/a.txt"));
        assert!(!is_within("/docs", "/docs2/a.txt"));
        assert!(is_within("", "/anything"));

        assert_eq!(rebase("/docs/sub/a.txt", "/docs", "/archive").as_deref(), Some("/archive/sub/a.txt"));
        assert_eq!(rebase("/docs", "/docs", "/archive").as_deref(), Some("/archive"));
        assert_eq!(rebase("/other", "/docs", "/archive"), None);
    }
}
