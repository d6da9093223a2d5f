//! Filesystem probes.
//!
//! Everything the scenarios compare is captured here as an immutable value:
//! - `AttributeSnapshot`: existence, access flags, hidden flag, type, owner
//! - `StoreSnapshot`: space counters and volume identity
//! - `FileIdentity`: "same underlying file" key
//!
//! Platform specifics live in `unix` and `windows`.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{VerifyError, VerifyResult};

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use unix as sys;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use self::windows as sys;

/// Whether a snapshot describes a symlink itself or what it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicy {
    Follow,
    NoFollow,
}

/// Observable properties of a path at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSnapshot {
    pub exists: bool,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    pub hidden: bool,
    pub directory: bool,
    pub regular_file: bool,
    pub symlink: bool,
    pub owner: Option<String>,
}

impl AttributeSnapshot {
    /// Snapshot of a path that does not exist.
    pub fn missing() -> Self {
        Self {
            exists: false,
            readable: false,
            writable: false,
            executable: false,
            hidden: false,
            directory: false,
            regular_file: false,
            symlink: false,
            owner: None,
        }
    }

    pub fn capture(path: &Path, policy: LinkPolicy) -> VerifyResult<Self> {
        let meta = match policy {
            LinkPolicy::Follow => std::fs::metadata(path),
            LinkPolicy::NoFollow => std::fs::symlink_metadata(path),
        };
        let meta = match meta {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::missing()),
            Err(e) => return Err(VerifyError::fs("stat", path)(e)),
        };

        let file_type = meta.file_type();
        Ok(Self {
            exists: true,
            readable: sys::can_access(path, Access::Read),
            writable: sys::can_access(path, Access::Write),
            executable: sys::can_access(path, Access::Execute),
            hidden: sys::is_hidden(path, &meta),
            directory: file_type.is_dir(),
            regular_file: file_type.is_file(),
            symlink: file_type.is_symlink(),
            owner: Some(sys::owner(path, &meta).map_err(VerifyError::fs("read owner", path))?),
        })
    }
}

/// Access checks performed against the current process' credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

/// Storage statistics of the volume holding a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub total_space: u64,
    pub usable_space: u64,
    pub unallocated_space: u64,
    pub block_size: u64,
    pub name: String,
    pub fs_type: String,
}

impl StoreSnapshot {
    pub fn capture(path: &Path) -> VerifyResult<Self> {
        sys::store(path).map_err(VerifyError::fs("query file store", path))
    }

    /// Fields that cannot move between two samples of the same volume.
    pub fn fixed_fields(&self) -> (u64, u64, &str, &str) {
        (self.total_space, self.block_size, &self.name, &self.fs_type)
    }
}

/// Key that is equal for two paths iff they denote the same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileIdentity {
    Inode { dev: u64, ino: u64 },
    FinalPath(PathBuf),
}

impl FileIdentity {
    pub fn of(path: &Path) -> VerifyResult<Self> {
        sys::identity(path).map_err(VerifyError::fs("identify", path))
    }
}

/// Whether the platform has a settable hidden attribute.
pub fn supports_hidden_attribute() -> bool {
    sys::HIDDEN_ATTRIBUTE
}

/// Set or clear the hidden attribute.
pub fn set_hidden(path: &Path, hidden: bool) -> VerifyResult<()> {
    if !sys::HIDDEN_ATTRIBUTE {
        return Err(VerifyError::Unsupported("hidden attribute"));
    }
    sys::set_hidden(path, hidden).map_err(VerifyError::fs("set hidden", path))
}

/// Read the hidden flag of a path (following links).
pub fn is_hidden(path: &Path) -> VerifyResult<bool> {
    let meta = std::fs::metadata(path).map_err(VerifyError::fs("stat", path))?;
    Ok(sys::is_hidden(path, &meta))
}

/// Set or clear the read-only permission (following links).
pub fn set_readonly(path: &Path, readonly: bool) -> VerifyResult<()> {
    let meta = std::fs::metadata(path).map_err(VerifyError::fs("stat", path))?;
    let perms = sys::readonly_permissions(&meta, readonly);
    std::fs::set_permissions(path, perms).map_err(VerifyError::fs("set permissions", path))
}

pub fn is_readonly(path: &Path) -> VerifyResult<bool> {
    let meta = std::fs::metadata(path).map_err(VerifyError::fs("stat", path))?;
    Ok(meta.permissions().readonly())
}

/// Owner of a path (following links): a SID on Windows, `uid:N` elsewhere.
pub fn owner(path: &Path) -> VerifyResult<String> {
    let meta = std::fs::metadata(path).map_err(VerifyError::fs("stat", path))?;
    sys::owner(path, &meta).map_err(VerifyError::fs("read owner", path))
}

/// Write the current owner back to the path. Exercises the owner-change
/// path of the filesystem without handing the file to someone else.
pub fn reassign_owner(path: &Path) -> VerifyResult<()> {
    sys::reassign_owner(path).map_err(VerifyError::fs("set owner", path))
}

/// Root of the volume holding `path`.
pub fn volume_path(path: &Path) -> VerifyResult<PathBuf> {
    sys::volume_path(path).map_err(VerifyError::fs("query volume path", path))
}

/// Filesystem roots visible to this process.
pub fn root_directories() -> VerifyResult<Vec<PathBuf>> {
    sys::root_directories().map_err(VerifyError::fs("enumerate roots", "/"))
}

/// One field that differs between two serialized snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    pub field: String,
    pub left: serde_json::Value,
    pub right: serde_json::Value,
}

/// List the top-level fields that differ between two snapshots.
pub fn diff<T: Serialize>(left: &T, right: &T) -> Vec<FieldDiff> {
    let (left, right) = match (serde_json::to_value(left), serde_json::to_value(right)) {
        (Ok(l), Ok(r)) => (l, r),
        (l, r) => {
            let render = |v: Result<serde_json::Value, serde_json::Error>| match v {
                Ok(v) => v,
                Err(e) => serde_json::Value::String(e.to_string()),
            };
            return vec![FieldDiff {
                field: "snapshot".to_string(),
                left: render(l),
                right: render(r),
            }];
        }
    };

    match (left, right) {
        (serde_json::Value::Object(l), serde_json::Value::Object(r)) => l
            .into_iter()
            .filter_map(|(field, lv)| {
                let rv = r.get(&field).cloned().unwrap_or(serde_json::Value::Null);
                (lv != rv).then_some(FieldDiff {
                    field,
                    left: lv,
                    right: rv,
                })
            })
            .collect(),
        (l, r) if l != r => vec![FieldDiff {
            field: "value".to_string(),
            left: l,
            right: r,
        }],
        _ => Vec::new(),
    }
}
