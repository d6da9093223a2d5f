//! Unix probes: `access(2)`, `statvfs(3)` and the mount table.

use std::ffi::CString;
use std::fs::{Metadata, Permissions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use super::{Access, FileIdentity, StoreSnapshot};

/// Unix has no hidden attribute, only the leading-dot naming convention.
pub const HIDDEN_ATTRIBUTE: bool = false;

fn c_path(path: &Path) -> io::Result<CString> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

pub fn can_access(path: &Path, access: Access) -> bool {
    let mode = match access {
        Access::Read => libc::R_OK,
        Access::Write => libc::W_OK,
        Access::Execute => libc::X_OK,
    };
    match c_path(path) {
        Ok(c) => unsafe { libc::access(c.as_ptr(), mode) == 0 },
        Err(_) => false,
    }
}

pub fn is_hidden(path: &Path, _meta: &Metadata) -> bool {
    path.file_name()
        .map(|name| name.as_bytes().starts_with(b"."))
        .unwrap_or(false)
}

pub fn set_hidden(_path: &Path, _hidden: bool) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "no hidden attribute on this platform",
    ))
}

/// Clear every write bit, or restore the owner's.
pub fn readonly_permissions(meta: &Metadata, readonly: bool) -> Permissions {
    let mode = meta.permissions().mode();
    let mode = if readonly { mode & !0o222 } else { mode | 0o200 };
    Permissions::from_mode(mode)
}

pub fn owner(_path: &Path, meta: &Metadata) -> io::Result<String> {
    Ok(format!("uid:{}", meta.uid()))
}

pub fn identity(path: &Path) -> io::Result<FileIdentity> {
    let meta = std::fs::metadata(path)?;
    Ok(FileIdentity::Inode {
        dev: meta.dev(),
        ino: meta.ino(),
    })
}

pub fn reassign_owner(path: &Path) -> io::Result<()> {
    let meta = std::fs::metadata(path)?;
    std::os::unix::fs::chown(path, Some(meta.uid()), Some(meta.gid()))
}

/// Topmost ancestor of the resolved path that is still on the same device.
pub fn volume_path(path: &Path) -> io::Result<PathBuf> {
    let resolved = std::fs::canonicalize(path)?;
    let dev = std::fs::metadata(&resolved)?.dev();
    let mut volume = resolved.as_path();
    for ancestor in resolved.ancestors().skip(1) {
        if std::fs::metadata(ancestor)?.dev() != dev {
            break;
        }
        volume = ancestor;
    }
    Ok(volume.to_path_buf())
}

pub fn store(path: &Path) -> io::Result<StoreSnapshot> {
    let c = c_path(path)?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    #[allow(clippy::unnecessary_cast)]
    let frsize = if stat.f_frsize > 0 { stat.f_frsize as u64 } else { stat.f_bsize as u64 };
    #[allow(clippy::unnecessary_cast)]
    let (blocks, bfree, bavail) = (stat.f_blocks as u64, stat.f_bfree as u64, stat.f_bavail as u64);

    let (name, fs_type) = mount_entry(path)?;
    Ok(StoreSnapshot {
        total_space: blocks * frsize,
        usable_space: bavail * frsize,
        unallocated_space: bfree * frsize,
        block_size: frsize,
        name,
        fs_type,
    })
}

/// Device and filesystem type of the mount holding `path`.
#[cfg(target_os = "linux")]
fn mount_entry(path: &Path) -> io::Result<(String, String)> {
    let resolved = std::fs::canonicalize(path)?;
    let table = std::fs::read_to_string("/proc/self/mounts")?;
    Ok(find_mount(&table, &resolved).unwrap_or_default())
}

#[cfg(not(target_os = "linux"))]
fn mount_entry(_path: &Path) -> io::Result<(String, String)> {
    Ok((String::new(), String::new()))
}

/// Longest mount point that is a prefix of `path`. Later entries win ties
/// since they are stacked on top of earlier ones.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn find_mount(table: &str, path: &Path) -> Option<(String, String)> {
    let mut best: Option<(usize, String, String)> = None;
    for line in table.lines() {
        let mut fields = line.split_whitespace();
        let (Some(device), Some(mount_point), Some(fs_type)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };

        let mount_point = PathBuf::from(unescape_mount_field(mount_point));
        if !path.starts_with(&mount_point) {
            continue;
        }
        let depth = mount_point.components().count();
        if best.as_ref().map_or(true, |(d, _, _)| depth >= *d) {
            best = Some((depth, unescape_mount_field(device), fs_type.to_string()));
        }
    }
    best.map(|(_, device, fs_type)| (device, fs_type))
}

/// Decode the octal escapes (`\040` for space etc.) used in mount tables.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let octal = bytes.get(i + 1..i + 4).filter(|d| d.iter().all(|b| (b'0'..=b'7').contains(b)));
        if let (b'\\', Some(digits)) = (bytes[i], octal) {
            let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            match u8::try_from(value) {
                Ok(byte) => {
                    out.push(byte);
                    i += 4;
                }
                // \400 and up: not an escape
                Err(_) => {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub fn root_directories() -> io::Result<Vec<PathBuf>> {
    Ok(vec![PathBuf::from("/")])
}
