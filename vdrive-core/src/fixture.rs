//! Temporary directories for a verification run.
//!
//! A `TempWorkspace` is created once per run and owns every scenario's
//! directory. Each scenario gets a fresh `ScenarioFixture` beneath it,
//! optionally fronted by a symlink, which is removed when it drops.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::{Builder, TempDir};

use crate::error::{VerifyError, VerifyResult};
use crate::ops;

/// Root temp directory of a run.
#[derive(Debug)]
pub struct TempWorkspace {
    dir: TempDir,
}

impl TempWorkspace {
    pub const PREFIX: &'static str = "virtual-drive-test";

    /// Create under the system temp directory.
    pub fn new() -> VerifyResult<Self> {
        let base = std::env::temp_dir();
        Self::new_in(&base)
    }

    /// Create under `parent`.
    pub fn new_in(parent: &Path) -> VerifyResult<Self> {
        let dir = Builder::new()
            .prefix(Self::PREFIX)
            .tempdir_in(parent)
            .map_err(VerifyError::fs("create workspace", parent))?;
        info!("Test folder is at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// New scenario directory.
    pub fn fixture(&self) -> VerifyResult<ScenarioFixture> {
        let dir = Builder::new()
            .prefix("test")
            .tempdir_in(self.path())
            .map_err(VerifyError::fs("create scenario directory", self.path()))?;
        debug!("Scenario directory {}", dir.path().display());
        Ok(ScenarioFixture { dir, link: None })
    }

    /// New scenario directory fronted by a sibling symlink `<dir>_link`.
    pub fn linked_fixture(&self) -> VerifyResult<ScenarioFixture> {
        let mut fixture = self.fixture()?;
        let link = sibling(fixture.path(), "_link");
        ops::symlink_dir(fixture.path(), &link)?;
        fixture.link = Some(link);
        Ok(fixture)
    }

    /// Delete the workspace recursively. Links are removed, not followed.
    pub fn close(self) -> VerifyResult<()> {
        let path = self.path().to_path_buf();
        make_tree_writable(&path);
        self.dir
            .close()
            .map_err(VerifyError::fs("delete workspace", path))
    }
}

/// Per-scenario directory, optionally with a symlink pointing at it.
#[derive(Debug)]
pub struct ScenarioFixture {
    dir: TempDir,
    link: Option<PathBuf>,
}

impl ScenarioFixture {
    /// The real directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// The symlink in front of the directory, if any.
    pub fn link(&self) -> Option<&Path> {
        self.link.as_deref()
    }

    /// Path a drive should be bound to: the link if there is one.
    pub fn front(&self) -> &Path {
        self.link().unwrap_or(self.path())
    }

    /// Path next to the fixture directory, named `<dir><suffix>`.
    pub fn sibling(&self, suffix: &str) -> PathBuf {
        sibling(self.path(), suffix)
    }
}

impl Drop for ScenarioFixture {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            if let Err(e) = ops::remove_link(&link) {
                debug!("Leaving link {} for workspace cleanup: {}", link.display(), e);
            }
        }
        make_tree_writable(self.dir.path());
        // TempDir ignores removal errors, including an already deleted
        // directory.
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Scenarios may leave read-only entries behind, which would block deletion
/// on Windows. Best effort: errors are left for the delete to report.
fn make_tree_writable(path: &Path) {
    fn walk(path: &Path) -> io::Result<()> {
        let meta = std::fs::symlink_metadata(path)?;
        if meta.file_type().is_symlink() {
            return Ok(());
        }
        if meta.permissions().readonly() {
            let _ = crate::probe::set_readonly(path, false);
        }
        if meta.is_dir() {
            for entry in std::fs::read_dir(path)? {
                walk(&entry?.path())?;
            }
        }
        Ok(())
    }
    if let Err(e) = walk(path) {
        if e.kind() != io::ErrorKind::NotFound {
            debug!("Could not reset permissions under {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_lifecycle() {
        let parent = TempDir::new().unwrap();
        let ws = TempWorkspace::new_in(parent.path()).unwrap();
        let root = ws.path().to_path_buf();

        let name = root.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TempWorkspace::PREFIX));

        let fixture = ws.fixture().unwrap();
        assert!(fixture.path().starts_with(&root));
        std::fs::write(fixture.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(fixture.path().join("sub")).unwrap();
        std::fs::write(fixture.path().join("sub/b.txt"), b"b").unwrap();
        std::mem::forget(fixture);

        ws.close().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_fixture_removed_on_drop() {
        let parent = TempDir::new().unwrap();
        let ws = TempWorkspace::new_in(parent.path()).unwrap();

        let path = {
            let fixture = ws.fixture().unwrap();
            std::fs::write(fixture.path().join("x"), b"x").unwrap();
            fixture.path().to_path_buf()
        };
        assert!(!path.exists());
        ws.close().unwrap();
    }

    #[test]
    fn test_fixture_tolerates_deleted_dir() {
        let parent = TempDir::new().unwrap();
        let ws = TempWorkspace::new_in(parent.path()).unwrap();

        let fixture = ws.fixture().unwrap();
        std::fs::remove_dir(fixture.path()).unwrap();
        drop(fixture);

        ws.close().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_linked_fixture() {
        let parent = TempDir::new().unwrap();
        let ws = TempWorkspace::new_in(parent.path()).unwrap();

        let (dir, link) = {
            let fixture = ws.linked_fixture().unwrap();
            let link = fixture.link().unwrap().to_path_buf();
            assert_eq!(std::fs::read_link(&link).unwrap(), fixture.path());
            assert!(link.to_string_lossy().ends_with("_link"));
            assert_eq!(fixture.front(), link.as_path());
            (fixture.path().to_path_buf(), link)
        };

        assert!(std::fs::symlink_metadata(&link).is_err());
        assert!(!dir.exists());
        ws.close().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_close_does_not_follow_links() {
        let parent = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("keep.txt"), b"keep").unwrap();

        let ws = TempWorkspace::new_in(parent.path()).unwrap();
        std::os::unix::fs::symlink(outside.path(), ws.path().join("escape")).unwrap();
        ws.close().unwrap();

        assert!(outside.path().join("keep.txt").exists());
    }
}
