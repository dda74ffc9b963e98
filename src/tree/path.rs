//! Relative path form, validation and normalization
//!
//! Every tree path is rooted at the workspace root and starts with `/`.
//! Directories end with `/`, files never do. The root directory is `/`.

use crate::error::ScanError;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// The workspace root directory
pub const ROOT: &str = "/";

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ' ' | '/' | '-')
}

/// Check that a wire path is well formed for the given kind
///
/// Accepted characters are ASCII letters, digits, `_`, `.`, space, `/` and `-`.
/// `//`, `.` segments and `..` segments are rejected, and the trailing `/`
/// must agree with `expect_directory`.
pub fn is_valid_path(path: &str, expect_directory: bool) -> bool {
    if !path.starts_with('/') || path.ends_with('/') != expect_directory {
        return false;
    }
    if !path.chars().all(is_allowed_char) || path.contains("//") {
        return false;
    }
    path.split('/').all(|segment| segment != "." && segment != "..")
}

/// Whether a path names a directory
pub fn is_directory(path: &str) -> bool {
    path.ends_with('/')
}

/// Parent directory of a path (`None` for the root)
///
/// `/a/b/` and `/a/b.txt` both have parent `/a/`.
pub fn parent_directory(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    trimmed.rfind('/').map(|idx| &path[..=idx])
}

/// Whether `path` lies strictly below directory `dir`
pub fn is_nested_under(path: &str, dir: &str) -> bool {
    path.len() > dir.len() && path.starts_with(dir)
}

/// Normalize one file name component to NFC
pub fn normalize_component(name: &str) -> String {
    name.nfc().collect()
}

/// Build the wire path of an on-disk entry below `root`
///
/// Components are NFC-normalized. Names that are not valid UTF-8, or that
/// would not survive validation, are rejected so the scanner can skip them.
pub fn relative_path(root: &Path, entry: &Path, is_dir: bool) -> Result<String, ScanError> {
    let relative = entry
        .strip_prefix(root)
        .map_err(|_| ScanError::UnsupportedPath(entry.to_string_lossy().to_string()))?;

    let mut result = String::from(ROOT);
    for component in relative.components() {
        let name = match component {
            Component::Normal(name) => name,
            _ => return Err(ScanError::UnsupportedPath(relative.to_string_lossy().to_string())),
        };
        let name = name.to_str().ok_or_else(|| ScanError::InvalidFileName {
            parent: result.clone(),
            name: name.to_string_lossy().to_string(),
        })?;
        result.push_str(&normalize_component(name));
        result.push('/');
    }
    if !is_dir && result != ROOT {
        result.pop();
    }

    if !is_valid_path(&result, is_dir) {
        let (parent, name) = match parent_directory(&result) {
            Some(parent) => (parent.to_string(), result[parent.len()..].to_string()),
            None => (ROOT.to_string(), result.clone()),
        };
        return Err(ScanError::InvalidFileName { parent, name });
    }
    Ok(result)
}

/// Resolve a validated wire path to a location below `root`
///
/// Returns `None` for invalid paths and for the root itself.
pub fn resolve(root: &Path, path: &str) -> Option<PathBuf> {
    if path == ROOT || !is_valid_path(path, is_directory(path)) {
        return None;
    }
    let mut resolved = root.to_path_buf();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        resolved.push(segment);
    }
    Some(resolved)
}
