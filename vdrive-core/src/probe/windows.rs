//! Windows probes: file attributes, volume information and owner SIDs.

use std::fs::{Metadata, Permissions};
use std::io;
use std::os::windows::fs::MetadataExt;
use std::path::{Path, PathBuf};

use windows::core::{HSTRING, PWSTR};
use windows::Win32::Foundation::{LocalFree, ERROR_SUCCESS, HLOCAL};
use windows::Win32::Security::Authorization::{
    ConvertSidToStringSidW, GetNamedSecurityInfoW, SE_FILE_OBJECT,
};
use windows::Win32::Security::{
    SetFileSecurityW, OWNER_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR, PSID,
};
use windows::Win32::Storage::FileSystem::{
    GetDiskFreeSpaceExW, GetDiskFreeSpaceW, GetFileAttributesW, GetLogicalDrives,
    GetVolumeInformationW, GetVolumePathNameW, SetFileAttributesW, FILE_ATTRIBUTE_HIDDEN,
    FILE_FLAGS_AND_ATTRIBUTES, INVALID_FILE_ATTRIBUTES,
};

use super::{Access, FileIdentity, StoreSnapshot};

pub const HIDDEN_ATTRIBUTE: bool = true;

const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "com", "bat", "cmd"];

fn wide(path: &Path) -> HSTRING {
    HSTRING::from(path.as_os_str())
}

pub fn can_access(path: &Path, access: Access) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    match access {
        Access::Read if meta.is_dir() => std::fs::read_dir(path).is_ok(),
        Access::Read => std::fs::File::open(path).is_ok(),
        Access::Write => !meta.permissions().readonly(),
        Access::Execute => {
            meta.is_dir()
                || path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| EXECUTABLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
        }
    }
}

pub fn is_hidden(_path: &Path, meta: &Metadata) -> bool {
    meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN.0 != 0
}

pub fn set_hidden(path: &Path, hidden: bool) -> io::Result<()> {
    let name = wide(path);
    let current = unsafe { GetFileAttributesW(&name) };
    if current == INVALID_FILE_ATTRIBUTES {
        return Err(io::Error::last_os_error());
    }
    let updated = if hidden {
        current | FILE_ATTRIBUTE_HIDDEN.0
    } else {
        current & !FILE_ATTRIBUTE_HIDDEN.0
    };
    unsafe { SetFileAttributesW(&name, FILE_FLAGS_AND_ATTRIBUTES(updated)) }?;
    Ok(())
}

pub fn readonly_permissions(meta: &Metadata, readonly: bool) -> Permissions {
    let mut perms = meta.permissions();
    perms.set_readonly(readonly);
    perms
}

/// Owner as a string SID (`S-1-5-...`).
pub fn owner(path: &Path, _meta: &Metadata) -> io::Result<String> {
    let name = wide(path);
    let mut sid = PSID::default();
    let mut descriptor = PSECURITY_DESCRIPTOR::default();
    let status = unsafe {
        GetNamedSecurityInfoW(
            &name,
            SE_FILE_OBJECT,
            OWNER_SECURITY_INFORMATION,
            Some(&mut sid),
            None,
            None,
            None,
            &mut descriptor,
        )
    };
    if status != ERROR_SUCCESS {
        return Err(io::Error::from_raw_os_error(status.0 as i32));
    }

    let mut text = PWSTR::null();
    let converted = unsafe { ConvertSidToStringSidW(sid, &mut text) };
    let result = converted
        .map_err(io::Error::from)
        .and_then(|()| unsafe { text.to_string() }.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)));

    unsafe {
        if !text.is_null() {
            let _ = LocalFree(HLOCAL(text.0.cast()));
        }
        let _ = LocalFree(HLOCAL(descriptor.0));
    }
    result
}

/// Read the owner section of the security descriptor and write it back.
pub fn reassign_owner(path: &Path) -> io::Result<()> {
    let name = wide(path);
    let mut sid = PSID::default();
    let mut descriptor = PSECURITY_DESCRIPTOR::default();
    let status = unsafe {
        GetNamedSecurityInfoW(
            &name,
            SE_FILE_OBJECT,
            OWNER_SECURITY_INFORMATION,
            Some(&mut sid),
            None,
            None,
            None,
            &mut descriptor,
        )
    };
    if status != ERROR_SUCCESS {
        return Err(io::Error::from_raw_os_error(status.0 as i32));
    }

    let result = unsafe { SetFileSecurityW(&name, OWNER_SECURITY_INFORMATION, descriptor) }
        .ok()
        .map_err(io::Error::from);
    unsafe {
        let _ = LocalFree(HLOCAL(descriptor.0));
    }
    result
}

/// `std` has no stable file index on Windows, so identity is the final
/// path after resolving links and substituted drives.
pub fn identity(path: &Path) -> io::Result<FileIdentity> {
    Ok(FileIdentity::FinalPath(std::fs::canonicalize(path)?))
}

fn volume_root(path: &Path) -> io::Result<HSTRING> {
    let mut buf = [0u16; 261];
    unsafe { GetVolumePathNameW(&wide(path), &mut buf) }?;
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    HSTRING::from_wide(&buf[..len]).map_err(io::Error::from)
}

pub fn volume_path(path: &Path) -> io::Result<PathBuf> {
    Ok(PathBuf::from(volume_root(path)?.to_os_string()))
}

fn from_wide_buf(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

pub fn store(path: &Path) -> io::Result<StoreSnapshot> {
    let name = wide(path);
    let (mut usable, mut total, mut unallocated) = (0u64, 0u64, 0u64);
    unsafe {
        GetDiskFreeSpaceExW(
            &name,
            Some(&mut usable),
            Some(&mut total),
            Some(&mut unallocated),
        )
    }?;

    let root = volume_root(path)?;
    let (mut sectors_per_cluster, mut bytes_per_sector) = (0u32, 0u32);
    unsafe {
        GetDiskFreeSpaceW(
            &root,
            Some(&mut sectors_per_cluster),
            Some(&mut bytes_per_sector),
            None,
            None,
        )
    }?;

    let mut label = [0u16; 261];
    let mut fs_name = [0u16; 261];
    unsafe {
        GetVolumeInformationW(
            &root,
            Some(&mut label),
            None,
            None,
            None,
            Some(&mut fs_name),
        )
    }?;

    Ok(StoreSnapshot {
        total_space: total,
        usable_space: usable,
        unallocated_space: unallocated,
        block_size: u64::from(bytes_per_sector),
        name: from_wide_buf(&label),
        fs_type: from_wide_buf(&fs_name),
    })
}

pub fn root_directories() -> io::Result<Vec<PathBuf>> {
    let mask = unsafe { GetLogicalDrives() };
    if mask == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((0..26u8)
        .filter(|i| mask & (1 << i) != 0)
        .map(|i| PathBuf::from(format!("{}:\\", (b'A' + i) as char)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hidden_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("h.txt");
        std::fs::write(&file, b"x").unwrap();
        let hidden = |p: &Path| is_hidden(p, &std::fs::metadata(p).unwrap());

        assert!(!hidden(&file));
        set_hidden(&file, true).unwrap();
        assert!(hidden(&file));
        set_hidden(&file, false).unwrap();
        assert!(!hidden(&file));
    }

    #[test]
    fn test_hidden_directory() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        set_hidden(&sub, true).unwrap();
        assert!(is_hidden(&sub, &std::fs::metadata(&sub).unwrap()));
        set_hidden(&sub, false).unwrap();
    }

    #[test]
    fn test_owner_is_sid() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("o.txt");
        std::fs::write(&file, b"x").unwrap();
        let meta = std::fs::metadata(&file).unwrap();

        let sid = owner(&file, &meta).unwrap();
        assert!(sid.starts_with("S-1-"), "{sid}");
        reassign_owner(&file).unwrap();
        assert_eq!(owner(&file, &meta).unwrap(), sid);
    }

    #[test]
    fn test_store_fields() {
        let dir = TempDir::new().unwrap();
        let snap = store(dir.path()).unwrap();
        assert!(snap.total_space > 0);
        assert!(snap.block_size > 0);
        assert!(snap.usable_space <= snap.total_space);
        assert!(!snap.fs_type.is_empty());
    }

    #[test]
    fn test_volume_and_roots() {
        let dir = TempDir::new().unwrap();
        let volume = volume_path(dir.path()).unwrap();
        assert!(volume.to_string_lossy().ends_with('\\'), "{}", volume.display());

        let roots = root_directories().unwrap();
        assert!(roots.iter().any(|r| r.to_string_lossy().eq_ignore_ascii_case(&volume.to_string_lossy())));
    }

    #[test]
    fn test_identity_through_canonical_path() {
        let dir = TempDir::new().unwrap();
        let a = identity(dir.path()).unwrap();
        let b = identity(&dir.path().join(".")).unwrap();
        assert_eq!(a, b);
    }
}
