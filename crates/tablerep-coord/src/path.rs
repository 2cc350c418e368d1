//! Store path helpers.
//!
//! Paths are absolute, `/`-separated and never contain empty segments, so
//! `/hbase/replication/peers/1` is valid while `hbase//peers` is not.

use crate::error::StoreError;

/// Path separator used by the coordination store.
pub const SEPARATOR: char = '/';

/// Validate an absolute store path.
pub fn validate(path: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with(SEPARATOR) {
        return Err(invalid("must be absolute"));
    }
    if path.len() > 1 && path.ends_with(SEPARATOR) {
        return Err(invalid("must not end with a separator"));
    }
    if path.len() > 1 && path[1..].split(SEPARATOR).any(|s| s.is_empty()) {
        return Err(invalid("empty segment"));
    }
    Ok(())
}

/// Join a child segment onto a parent path.
pub fn join(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches(SEPARATOR);
    let child = child.trim_start_matches(SEPARATOR);
    format!("{}{}{}", parent, SEPARATOR, child)
}

/// Last segment of a path.
pub fn basename(path: &str) -> &str {
    path.rsplit(SEPARATOR).next().unwrap_or(path)
}

/// Parent of a path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind(SEPARATOR) {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// True if `path` equals `prefix` or lies underneath it.
pub fn is_under(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path.starts_with(SEPARATOR);
    }
    path == prefix
        || (path.starts_with(prefix) && path[prefix.len()..].starts_with(SEPARATOR))
}
