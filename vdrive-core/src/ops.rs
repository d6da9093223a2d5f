//! File operations used by the scenarios.
//!
//! Thin wrappers over `std::fs` that attach the operation and path to every
//! error, plus the few operations `std` spells differently per platform.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{VerifyError, VerifyResult};

/// Create a new empty file; fails if it exists.
pub fn create_new(path: &Path) -> VerifyResult<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(drop)
        .map_err(VerifyError::fs("create", path))
}

/// Create a uniquely named file in `dir` and keep it.
pub fn create_temp_file(dir: &Path, prefix: &str, suffix: &str) -> VerifyResult<PathBuf> {
    let file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(VerifyError::fs("create temp file", dir))?;
    let (_, path) = file
        .keep()
        .map_err(|e| VerifyError::fs("keep temp file", dir)(e.error))?;
    Ok(path)
}

pub fn write(path: &Path, contents: impl AsRef<[u8]>) -> VerifyResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(VerifyError::fs("open for write", path))?;
    file.write_all(contents.as_ref())
        .and_then(|()| file.sync_all())
        .map_err(VerifyError::fs("write", path))
}

pub fn read(path: &Path) -> VerifyResult<Vec<u8>> {
    fs::read(path).map_err(VerifyError::fs("read", path))
}

pub fn read_string(path: &Path) -> VerifyResult<String> {
    fs::read_to_string(path).map_err(VerifyError::fs("read", path))
}

/// Whether anything exists at `path`, following links.
pub fn exists(path: &Path) -> VerifyResult<bool> {
    path.try_exists().map_err(VerifyError::fs("stat", path))
}

/// Whether nothing, not even a dangling link, exists at `path`.
pub fn absent(path: &Path) -> VerifyResult<bool> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(VerifyError::fs("stat", path)(e)),
    }
}

/// Delete a single entry: a link is unlinked, a directory must be empty.
pub fn delete(path: &Path) -> VerifyResult<()> {
    let meta = fs::symlink_metadata(path).map_err(VerifyError::fs("stat", path))?;
    if meta.file_type().is_symlink() {
        remove_link(path)
    } else if meta.is_dir() {
        fs::remove_dir(path).map_err(VerifyError::fs("remove directory", path))
    } else {
        fs::remove_file(path).map_err(VerifyError::fs("remove file", path))
    }
}

/// Copy one entry. A directory is copied shallowly: the new directory gets
/// the source's permissions but none of its contents.
pub fn copy_entry(from: &Path, to: &Path) -> VerifyResult<()> {
    let meta = fs::metadata(from).map_err(VerifyError::fs("stat", from))?;
    if meta.is_dir() {
        fs::create_dir(to).map_err(VerifyError::fs("create directory", to))?;
        fs::set_permissions(to, meta.permissions()).map_err(VerifyError::fs("set permissions", to))
    } else {
        fs::copy(from, to)
            .map(drop)
            .map_err(VerifyError::fs("copy", from))
    }
}

/// Move a file. Falls back to copy and delete when a rename can't cross
/// between the two paths' volumes.
pub fn move_file(from: &Path, to: &Path) -> VerifyResult<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if exists(to)? => Err(VerifyError::fs("move", from)(e)),
        Err(e) => {
            debug!(
                "Rename {} -> {} failed ({}), copying instead",
                from.display(),
                to.display(),
                e
            );
            fs::copy(from, to).map_err(VerifyError::fs("copy", from))?;
            fs::remove_file(from).map_err(VerifyError::fs("remove file", from))
        }
    }
}

pub fn symlink_file(target: &Path, link: &Path) -> VerifyResult<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let result = std::os::windows::fs::symlink_file(target, link);
    result.map_err(VerifyError::fs("create symlink", link))
}

pub fn symlink_dir(target: &Path, link: &Path) -> VerifyResult<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let result = std::os::windows::fs::symlink_dir(target, link);
    result.map_err(VerifyError::fs("create symlink", link))
}

/// Remove a symlink without touching its target.
pub fn remove_link(link: &Path) -> VerifyResult<()> {
    // Directory links are directories to the Windows API.
    #[cfg(windows)]
    let result = match fs::metadata(link) {
        Ok(meta) if meta.is_dir() => fs::remove_dir(link),
        _ => fs::remove_file(link),
    };
    #[cfg(not(windows))]
    let result = fs::remove_file(link);
    result.map_err(VerifyError::fs("remove symlink", link))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_new_rejects_existing() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("f.txt");
        create_new(&p).unwrap();
        assert!(exists(&p).unwrap());
        assert!(matches!(create_new(&p), Err(VerifyError::Filesystem { op: "create", .. })));
    }

    #[test]
    fn test_write_truncates() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("f.txt");
        write(&p, "long contents").unwrap();
        write(&p, "short").unwrap();
        assert_eq!(read_string(&p).unwrap(), "short");
    }

    #[test]
    fn test_temp_file_kept() {
        let dir = TempDir::new().unwrap();
        let p = create_temp_file(dir.path(), "prefix", "suffix").unwrap();
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("prefix") && name.ends_with("suffix"));
        assert!(p.exists());
    }

    #[test]
    fn test_copy_directory_is_shallow() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("inner.txt"), b"x").unwrap();

        let dst = dir.path().join("dst");
        copy_entry(&src, &dst).unwrap();
        assert!(dst.is_dir());
        assert!(!dst.join("inner.txt").exists());
    }

    #[test]
    fn test_move_file() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let from = a.path().join("from.txt");
        let to = b.path().join("to.txt");
        fs::write(&from, b"moving").unwrap();

        move_file(&from, &to).unwrap();
        assert!(absent(&from).unwrap());
        assert_eq!(read(&to).unwrap(), b"moving");
    }

    #[test]
    fn test_delete_directory_and_file() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"").unwrap();

        delete(&sub).unwrap();
        delete(&file).unwrap();
        assert!(absent(&sub).unwrap());
        assert!(absent(&file).unwrap());
        assert!(delete(&file).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_link_keeps_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        symlink_dir(&target, &link).unwrap();

        delete(&link).unwrap();
        assert!(absent(&link).unwrap());
        assert!(target.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_absent_sees_dangling_link() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("dangling");
        symlink_file(&dir.path().join("gone"), &link).unwrap();

        assert!(!exists(&link).unwrap());
        assert!(!absent(&link).unwrap());
    }
}
