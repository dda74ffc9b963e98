//! Wire protocol
//!
//! Line-oriented: every message is one JSON document followed by `\n`.
//!
//! Handshake: the client sends `<developer key><room>` (the key is only
//! present for a source). The hub answers [`ACCEPTED`] or [`REJECTED`];
//! a rejection closes the connection.
//!
//! After the handshake:
//! - source → hub: one snapshot, then changesets (`lines` and both removal
//!   fields always present),
//! - replica → hub: one hash-only snapshot, then user-code reports,
//! - hub → replica: changesets in the source form,
//! - hub → source: user-code broadcasts tagged with the reporting session.

use crate::error::{ProtocolError, SessionError, TreeError};
use crate::tree::changeset::{Changeset, FileEntry};
use crate::tree::hasher;
use crate::tree::path;
use crate::types::{Role, SessionId, UserCodeMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Read, Write};

/// Hub answer for an accepted handshake
pub const ACCEPTED: &str = "Accepted!";

/// Hub answer for a rejected handshake
pub const REJECTED: &str = "Incorrect room!";

/// Longest line either side accepts unless configured otherwise
pub const MAX_LINE_BYTES: usize = 64 * 1024 * 1024;

/// Limits applied to user-code reports
#[derive(Debug, Clone, Copy)]
pub struct UserCodeLimits {
    /// Maximum number of regions in one report
    pub max_entries: usize,
    /// Maximum characters in one region body
    pub max_length: usize,
}

impl Default for UserCodeLimits {
    fn default() -> Self {
        Self {
            max_entries: 10,
            max_length: 5000,
        }
    }
}

/// Decoded message from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Snapshot(Changeset),
    Changeset(Changeset),
    UserCodeReport(UserCodeReport),
}

/// Region bodies a replica extracted from one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCodeReport {
    pub path: String,
    /// Ordinal (as a string) to region lines
    pub regions: BTreeMap<String, Vec<String>>,
}

/// User-code broadcast received by a source session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserCodeBroadcast {
    pub user_id: SessionId,
    pub files: UserCodeMap,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangesetMessage {
    new_directories: Vec<String>,
    new_files: Vec<String>,
    changed_files: BTreeMap<String, FileEntryMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    removed_directories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    removed_files: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FileEntryMessage {
    hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lines: Option<Vec<String>>,
}

/// Region keys are ordinals; older peers send them as strings
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RegionKey {
    Text(String),
    Number(u64),
}

impl RegionKey {
    fn into_string(self) -> String {
        match self {
            RegionKey::Text(text) => text,
            RegionKey::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct UserCodeEntry {
    key: RegionKey,
    value: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserCodeUploadMessage {
    usercode: String,
    lines: Vec<UserCodeEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UserCodeBroadcastMessage {
    userid: SessionId,
    #[serde(flatten)]
    files: BTreeMap<String, Vec<UserCodeEntry>>,
}

/// Read one `\n`-terminated line of at most `max_bytes` bytes
///
/// Returns `Ok(None)` at end of stream. A trailing `\r` is dropped.
pub fn read_line_bounded<R: BufRead>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<Option<String>, SessionError> {
    let mut buf = Vec::new();
    let read = reader
        .by_ref()
        .take(max_bytes as u64 + 1)
        .read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > max_bytes {
        return Err(ProtocolError::LineTooLarge(buf.len(), max_bytes).into());
    }
    let line = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(line))
}

/// Write one message line and flush
pub fn write_line<W: Write>(writer: &mut W, line: &str) -> io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// First line a client sends
pub fn handshake_line(developer_key: Option<&str>, room: &str) -> String {
    format!("{}{}", developer_key.unwrap_or(""), room)
}

/// Split a handshake line into the role and the requested room
pub fn parse_handshake(line: &str, developer_key: &str) -> (Role, String) {
    match line.strip_prefix(developer_key) {
        Some(room) if !developer_key.is_empty() => (Role::Source, room.to_string()),
        _ => (Role::Replica, line.to_string()),
    }
}

/// Decode one inbound line on the hub side
///
/// `initial` is true until the session's first message has been processed.
pub fn decode_inbound(
    line: &str,
    role: Role,
    initial: bool,
    limits: &UserCodeLimits,
) -> Result<Payload, SessionError> {
    match (role, initial) {
        (Role::Source, true) => Ok(Payload::Snapshot(decode_changeset(line)?)),
        (Role::Source, false) => Ok(Payload::Changeset(decode_changeset(line)?)),
        (Role::Replica, true) => Ok(Payload::Snapshot(decode_replica_snapshot(line)?)),
        (Role::Replica, false) => Ok(Payload::UserCodeReport(decode_user_code_report(
            line, limits,
        )?)),
    }
}

/// Decode a changeset in source form (contents and removal fields required)
pub fn decode_changeset(line: &str) -> Result<Changeset, SessionError> {
    let message: ChangesetMessage = serde_json::from_str(line)?;
    let removed_directories = message
        .removed_directories
        .ok_or(ProtocolError::MissingField("removedDirectories"))?;
    let removed_files = message
        .removed_files
        .ok_or(ProtocolError::MissingField("removedFiles"))?;

    let mut changed_files = BTreeMap::new();
    for (path, entry) in message.changed_files {
        let lines = entry
            .lines
            .ok_or_else(|| ProtocolError::MissingLines(path.clone()))?;
        if hasher::compute_lines_checksum(&lines) != entry.hash {
            return Err(ProtocolError::HashMismatch { path }.into());
        }
        changed_files.insert(path, FileEntry::new(entry.hash, lines));
    }

    let changeset = Changeset {
        new_directories: message.new_directories,
        new_files: message.new_files,
        changed_files,
        removed_directories,
        removed_files,
    };
    validate_paths(&changeset)?;
    Ok(changeset)
}

/// Decode a replica snapshot; contents are dropped and removals are forbidden
pub fn decode_replica_snapshot(line: &str) -> Result<Changeset, SessionError> {
    let message: ChangesetMessage = serde_json::from_str(line)?;
    let removed = message
        .removed_files
        .iter()
        .chain(message.removed_directories.iter())
        .flatten()
        .next();
    if let Some(path) = removed {
        return Err(TreeError::ForbiddenRemoval(path.clone()).into());
    }

    let changeset = Changeset {
        new_directories: message.new_directories,
        new_files: message.new_files,
        changed_files: message
            .changed_files
            .into_iter()
            .map(|(path, entry)| (path, FileEntry::hash_only(entry.hash)))
            .collect(),
        removed_directories: Vec::new(),
        removed_files: Vec::new(),
    };
    validate_paths(&changeset)?;
    Ok(changeset)
}

/// Decode a user-code report from a replica
pub fn decode_user_code_report(
    line: &str,
    limits: &UserCodeLimits,
) -> Result<UserCodeReport, SessionError> {
    let message: UserCodeUploadMessage = serde_json::from_str(line)?;
    if !path::is_valid_path(&message.usercode, false) {
        return Err(ProtocolError::InvalidPath {
            field: "usercode",
            path: message.usercode,
        }
        .into());
    }
    if message.lines.len() > limits.max_entries {
        return Err(ProtocolError::UserCodeLimit {
            path: message.usercode,
            reason: format!(
                "{} regions (max: {})",
                message.lines.len(),
                limits.max_entries
            ),
        }
        .into());
    }

    let mut regions = BTreeMap::new();
    for entry in message.lines {
        let length = entry.value.join("\n").chars().count();
        if length > limits.max_length {
            return Err(ProtocolError::UserCodeLimit {
                path: message.usercode,
                reason: format!("{} characters (max: {})", length, limits.max_length),
            }
            .into());
        }
        regions.insert(entry.key.into_string(), entry.value);
    }

    Ok(UserCodeReport {
        path: message.usercode,
        regions,
    })
}

/// Decode a user-code broadcast on the source side
pub fn decode_user_code_broadcast(line: &str) -> Result<UserCodeBroadcast, SessionError> {
    let message: UserCodeBroadcastMessage = serde_json::from_str(line)?;
    let mut files = UserCodeMap::new();
    for (path, entries) in message.files {
        if !path::is_valid_path(&path, false) {
            return Err(ProtocolError::InvalidPath {
                field: "userid",
                path,
            }
            .into());
        }
        let regions = entries
            .into_iter()
            .map(|entry| (entry.key.into_string(), entry.value))
            .collect();
        files.insert(path, regions);
    }
    Ok(UserCodeBroadcast {
        user_id: message.userid,
        files,
    })
}

/// Encode a changeset in source form
///
/// Every changed file must carry its content.
pub fn encode_changeset(changeset: &Changeset) -> Result<String, SessionError> {
    let mut changed_files = BTreeMap::new();
    for (path, entry) in &changeset.changed_files {
        let lines = entry
            .content
            .clone()
            .ok_or_else(|| ProtocolError::MissingLines(path.clone()))?;
        changed_files.insert(
            path.clone(),
            FileEntryMessage {
                hash: entry.hash.clone(),
                lines: Some(lines),
            },
        );
    }
    let message = ChangesetMessage {
        new_directories: changeset.new_directories.clone(),
        new_files: changeset.new_files.clone(),
        changed_files,
        removed_directories: Some(changeset.removed_directories.clone()),
        removed_files: Some(changeset.removed_files.clone()),
    };
    Ok(serde_json::to_string(&message)?)
}

/// Encode a replica snapshot (hashes only, no removal fields)
pub fn encode_replica_snapshot(snapshot: &Changeset) -> Result<String, SessionError> {
    let message = ChangesetMessage {
        new_directories: snapshot.new_directories.clone(),
        new_files: snapshot.new_files.clone(),
        changed_files: snapshot
            .changed_files
            .iter()
            .map(|(path, entry)| {
                (
                    path.clone(),
                    FileEntryMessage {
                        hash: entry.hash.clone(),
                        lines: None,
                    },
                )
            })
            .collect(),
        removed_directories: None,
        removed_files: None,
    };
    Ok(serde_json::to_string(&message)?)
}

/// Encode a user-code report for one file
pub fn encode_user_code_report(report: &UserCodeReport) -> Result<String, SessionError> {
    let message = UserCodeUploadMessage {
        usercode: report.path.clone(),
        lines: to_entries(&report.regions),
    };
    Ok(serde_json::to_string(&message)?)
}

/// Encode the complete user-code map of one replica for the source sessions
pub fn encode_user_code_broadcast(
    user_id: SessionId,
    files: &UserCodeMap,
) -> Result<String, SessionError> {
    let message = UserCodeBroadcastMessage {
        userid: user_id,
        files: files
            .iter()
            .map(|(path, regions)| (path.clone(), to_entries(regions)))
            .collect(),
    };
    Ok(serde_json::to_string(&message)?)
}

fn to_entries(regions: &BTreeMap<String, Vec<String>>) -> Vec<UserCodeEntry> {
    regions
        .iter()
        .map(|(key, value)| UserCodeEntry {
            key: RegionKey::Text(key.clone()),
            value: value.clone(),
        })
        .collect()
}

fn validate_paths(changeset: &Changeset) -> Result<(), ProtocolError> {
    let fields: [(&'static str, &Vec<String>, bool); 4] = [
        ("newDirectories", &changeset.new_directories, true),
        ("newFiles", &changeset.new_files, false),
        ("removedDirectories", &changeset.removed_directories, true),
        ("removedFiles", &changeset.removed_files, false),
    ];
    for (field, paths, is_dir) in fields {
        if let Some(bad) = paths.iter().find(|p| !path::is_valid_path(p, is_dir)) {
            return Err(ProtocolError::InvalidPath {
                field,
                path: bad.clone(),
            });
        }
    }
    if let Some(bad) = changeset
        .changed_files
        .keys()
        .find(|p| !path::is_valid_path(p, false))
    {
        return Err(ProtocolError::InvalidPath {
            field: "changedFiles",
            path: bad.clone(),
        });
    }
    Ok(())
}
