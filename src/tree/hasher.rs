//! Line-oriented content checksum using MD5
//!
//! The digest is fed each line's UTF-8 bytes in order, with no separator.
//! An empty line contributes the bytes `{2, 5, 2}` instead, so that blank
//! lines still move the digest. Output is lowercase hex.

use md5::{Digest, Md5};
use std::fs;
use std::io;
use std::path::Path;

const EMPTY_LINE_BYTES: [u8; 3] = [2, 5, 2];

/// Compute the checksum of a file's lines
pub fn compute_lines_checksum<S: AsRef<str>>(lines: &[S]) -> String {
    let mut hasher = Md5::new();
    for line in lines {
        let line = line.as_ref();
        if line.is_empty() {
            hasher.update(EMPTY_LINE_BYTES);
        } else {
            hasher.update(line.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// Read a text file as lines
///
/// Lines are split on `\n` with a trailing `\r` dropped, and the final line
/// terminator is optional.
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Render lines the way write-back stores them: each line followed by `\n`
pub fn render_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut content = String::new();
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
    }
    content
}
