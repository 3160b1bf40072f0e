//! Entry naming: `alias.ext`, slash-normalised, never escaping the archive root.

use thiserror::Error;

use super::MemberRequest;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryNameError {
    #[error("entry name is empty")]
    Empty,

    #[error("entry name {0:?} is absolute")]
    Absolute(String),

    #[error("entry name {0:?} contains a parent directory component")]
    Traversal(String),

    #[error("entry name {0:?} contains a NUL byte")]
    Nul(String),
}

/// Name the member receives inside the archive.
///
/// Backslashes become `/`; empty and `.` segments are dropped. An empty
/// extension yields the bare alias.
pub fn entry_name(member: &MemberRequest) -> Result<String, EntryNameError> {
    let raw = if member.ext.is_empty() {
        member.alias.clone()
    } else {
        format!("{}.{}", member.alias, member.ext)
    };

    if raw.contains('\0') {
        return Err(EntryNameError::Nul(raw));
    }

    let slashed = raw.replace('\\', "/");
    if slashed.starts_with('/') || has_drive_prefix(&slashed) {
        return Err(EntryNameError::Absolute(raw));
    }

    let mut segments = Vec::new();
    for segment in slashed.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(EntryNameError::Traversal(raw)),
            other => segments.push(other),
        }
    }

    if member.alias.is_empty() || segments.is_empty() {
        return Err(EntryNameError::Empty);
    }

    Ok(segments.join("/"))
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
