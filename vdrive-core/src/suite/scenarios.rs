//! The scenarios themselves.
//!
//! Naming: `real` is the fixture directory, `root` is the virtual path of
//! the same directory through the drive.

use std::path::{Path, PathBuf};

use log::debug;

use super::ScenarioContext;
use crate::check;
use crate::error::VerifyResult;
use crate::ops;
use crate::probe::{self, AttributeSnapshot, LinkPolicy, StoreSnapshot};

const CONTENTS: &str = "Hello world!";

/// Free-space counters are volume-wide and may move between two samples.
const STORE_ATTEMPTS: usize = 3;

fn attributes(path: &Path, policy: LinkPolicy) -> VerifyResult<AttributeSnapshot> {
    AttributeSnapshot::capture(path, policy)
}

fn label(what: &str, path: &Path) -> String {
    format!("{} {}", what, path.display())
}

/// One entry reached through the real directory and through the drive.
struct Level {
    name: &'static str,
    real: PathBuf,
    virtual_path: PathBuf,
}

/// Folder, file and symlinked file under `real`, each paired with its path
/// through `root`.
fn levels(real: &Path, root: &Path) -> VerifyResult<Vec<Level>> {
    ops::write(&real.join("file1.txt"), CONTENTS)?;
    ops::symlink_file(&real.join("file1.txt"), &real.join("file1Link"))?;

    Ok([("folder", None), ("file", Some("file1.txt")), ("symlinked file", Some("file1Link"))]
        .into_iter()
        .map(|(name, entry)| Level {
            name,
            real: entry.map_or_else(|| real.to_path_buf(), |e| real.join(e)),
            virtual_path: entry.map_or_else(|| root.to_path_buf(), |e| root.join(e)),
        })
        .collect())
}

pub(super) fn create_and_delete_file(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let real = fixture.path();
    let drive = ctx.controller.bind(real)?;
    let root = drive.root();

    // virtual -> real
    let file = drive.join("testFile.txt");
    let real_file = real.join("testFile.txt");
    ops::create_new(&file)?;
    check::holds(&label("exists", &file), ops::exists(&file)?)?;
    check::holds(&label("exists", &real_file), ops::exists(&real_file)?)?;

    ops::write(&file, CONTENTS)?;
    check::equal("content read back", &ops::read_string(&file)?, &CONTENTS.to_string())?;
    check::equal("content through real path", &ops::read(&real_file)?, &ops::read(&file)?)?;
    check::same_file(&real_file, &file)?;

    // real -> virtual
    let from_real = real.join("fromReal.txt");
    ops::write(&from_real, CONTENTS)?;
    check::equal(
        "content through virtual path",
        &ops::read(&from_real)?,
        &ops::read(&drive.join("fromReal.txt"))?,
    )?;

    ops::delete(&file)?;
    check::holds(&label("deleted", &real_file), ops::absent(&real_file)?)?;

    check::holds(&format!("{} released", root.display()), drive.release())?;
    check::holds(&label("unbound", &file), ops::absent(&file)?)?;
    check::holds(&label("unbound", &root), !ops::exists(&root)?)?;
    Ok(())
}

pub(super) fn delete_substituted_drive(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let real = fixture.path();
    let drive = ctx.controller.bind(real)?;
    check::same_file(real, &drive.root())?;

    check::holds(&label("exists", real), ops::exists(real)?)?;
    ops::delete(&drive.root())?;
    check::holds(
        &format!("{} removed by deleting {}", real.display(), drive.drive()),
        !ops::exists(real)?,
    )?;
    Ok(())
}

pub(super) fn metadata_parity(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let real = fixture.path();
    let drive = ctx.controller.bind(real)?;
    let root = drive.root();

    check::same_file(real, &root)?;

    let r = attributes(real, LinkPolicy::NoFollow)?;
    let v = attributes(&root, LinkPolicy::NoFollow)?;
    check::snapshots_equal("attributes", real, &r, &root, &v)?;

    // A change made through the real path shows through the drive, and
    // the other way round.
    probe::set_readonly(real, true)?;
    check::holds(&label("read-only", &root), probe::is_readonly(&root)?)?;
    probe::set_readonly(&root, false)?;
    check::holds(&label("writable", real), !probe::is_readonly(real)?)?;
    Ok(())
}

pub(super) fn attribute_get_set_parity(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let real = fixture.path();
    let drive = ctx.controller.bind(real)?;
    let root = drive.root();
    check::same_file(&root, real)?;

    if probe::supports_hidden_attribute() {
        probe::set_hidden(&root, true)?;
        check::holds(&label("hidden", &root), probe::is_hidden(&root)?)?;
        check::holds(&label("hidden", real), probe::is_hidden(real)?)?;

        probe::set_hidden(real, false)?;
        check::holds(&label("not hidden", &root), !probe::is_hidden(&root)?)?;
        check::holds(&label("not hidden", real), !probe::is_hidden(real)?)?;
    } else {
        debug!("No hidden attribute on this platform, checking read-only only");
    }

    probe::set_readonly(&root, true)?;
    check::holds(&label("read-only", &root), probe::is_readonly(&root)?)?;
    check::holds(&label("read-only", real), probe::is_readonly(real)?)?;

    probe::set_readonly(real, false)?;
    check::holds(&label("writable", &root), !probe::is_readonly(&root)?)?;
    check::holds(&label("writable", real), !probe::is_readonly(real)?)?;

    let v = attributes(&root, LinkPolicy::Follow)?;
    let r = attributes(real, LinkPolicy::Follow)?;
    check::snapshots_equal("attributes", &root, &v, real, &r)?;
    Ok(())
}

pub(super) fn file_store_parity(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let real = fixture.path();
    let drive = ctx.controller.bind(real)?;
    let root = drive.root();
    check::same_file(real, &root)?;

    let mut attempt = 1;
    loop {
        let r = StoreSnapshot::capture(real)?;
        let v = StoreSnapshot::capture(&root)?;
        check::equal("file store size, name and type", &r.fixed_fields(), &v.fixed_fields())?;

        if r == v {
            break;
        }
        if attempt == STORE_ATTEMPTS {
            check::snapshots_equal("file store", real, &r, &root, &v)?;
        }
        debug!("Free space moved between samples (attempt {}), resampling", attempt);
        attempt += 1;
    }

    let roots = probe::root_directories()?;
    for path in [real, root.as_path()] {
        if let Some(fs_root) = path.ancestors().last() {
            check::holds(
                &format!("{} listed among {:?}", fs_root.display(), roots),
                roots.iter().any(|r| r == fs_root),
            )?;
        }
    }
    Ok(())
}

pub(super) fn symlink_file_parity(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let drive = ctx.controller.bind(fixture.path())?;
    check::same_file(fixture.path(), &drive.root())?;

    let file = drive.join("test.txt");
    ops::write(&file, CONTENTS)?;
    check::equal("content read back", &ops::read_string(&file)?, &CONTENTS.to_string())?;

    let link = drive.join("link");
    ops::symlink_file(&file, &link)?;
    check::equal("content through link", &ops::read(&link)?, &ops::read(&file)?)?;

    let l = attributes(&link, LinkPolicy::Follow)?;
    let t = attributes(&file, LinkPolicy::Follow)?;
    check::snapshots_equal("attributes", &link, &l, &file, &t)?;
    Ok(())
}

pub(super) fn subst_over_symlink(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.linked_fixture()?;
    let other = ctx.workspace.fixture()?;
    let real = fixture.path();
    let drive = ctx.controller.bind(fixture.front())?;
    let root = drive.root();

    let v = attributes(&root, LinkPolicy::Follow)?;
    let r = attributes(real, LinkPolicy::Follow)?;
    check::snapshots_equal("attributes", &root, &v, real, &r)?;
    check::holds(&label("writable", &root), v.writable)?;

    let file = ops::create_temp_file(&root, "prefix", "suffix")?;
    ops::write(&file, CONTENTS)?;
    check::equal("content read back", &ops::read_string(&file)?, &CONTENTS.to_string())?;

    let real_file = real.join(file.file_name().unwrap_or_default());
    check::holds(&label("exists", &real_file), ops::exists(&real_file)?)?;
    check::equal("content through real path", &ops::read(&real_file)?, &ops::read(&file)?)?;

    let from_real = real.join("fromReal.txt");
    ops::write(&from_real, CONTENTS)?;
    check::equal(
        "content through virtual path",
        &ops::read(&from_real)?,
        &ops::read(&root.join("fromReal.txt"))?,
    )?;

    let copy = other.path().join("copied");
    ops::copy_entry(&file, &copy)?;
    check::holds(&label("exists", &copy), ops::exists(&copy)?)?;
    check::equal("copied content", &ops::read_string(&copy)?, &CONTENTS.to_string())?;

    let cut = other.path().join("cut");
    ops::move_file(&file, &cut)?;
    check::holds(&label("moved away", &file), ops::absent(&file)?)?;
    check::holds(&label("moved away", &real_file), ops::absent(&real_file)?)?;
    check::holds(&label("exists", &cut), ops::exists(&cut)?)?;
    check::equal("moved content", &ops::read_string(&cut)?, &CONTENTS.to_string())?;
    Ok(())
}

pub(super) fn copy_drive_root(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let copy = fixture.sibling("_copy");
    let drive = ctx.controller.bind(fixture.path())?;
    let root = drive.root();
    check::same_file(fixture.path(), &root)?;

    ops::copy_entry(&root, &copy)?;

    let v = attributes(&root, LinkPolicy::Follow)?;
    let c = attributes(&copy, LinkPolicy::Follow)?;
    check::snapshots_equal("attributes", &root, &v, &copy, &c)?;
    Ok(())
}

pub(super) fn volume_path_parity(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let real = fixture.path();
    let drive = ctx.controller.bind(real)?;
    let root = drive.root();
    check::same_file(real, &root)?;

    for level in levels(real, &root)? {
        check::equal(
            &format!("volume path of {} {} vs {}", level.name, level.real.display(), level.virtual_path.display()),
            &probe::volume_path(&level.real)?,
            &probe::volume_path(&level.virtual_path)?,
        )?;
    }
    Ok(())
}

pub(super) fn owner_parity(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let real = fixture.path();
    let drive = ctx.controller.bind(real)?;
    let root = drive.root();
    check::same_file(real, &root)?;

    for level in levels(real, &root)? {
        let property = format!("owner of {} {} vs {}", level.name, level.real.display(), level.virtual_path.display());
        let before = probe::owner(&level.real)?;
        check::equal(&property, &before, &probe::owner(&level.virtual_path)?)?;

        probe::reassign_owner(&level.virtual_path)?;
        check::equal(&property, &before, &probe::owner(&level.real)?)?;
        check::equal(&property, &before, &probe::owner(&level.virtual_path)?)?;
    }
    Ok(())
}

/// Back `victim` up, delete it and copy it back, watching through
/// `observer` (the same entry reached the other way).
fn delete_and_restore(victim: &Path, observer: &Path, backup: &Path) -> VerifyResult<()> {
    let expected = ops::read(observer)?;

    ops::copy_entry(victim, backup)?;
    ops::delete(victim)?;
    check::holds(&label("deleted", observer), ops::absent(observer)?)?;

    ops::copy_entry(backup, victim)?;
    check::holds(&label("restored", observer), ops::exists(observer)?)?;
    check::equal(&format!("restored content of {}", observer.display()), &expected, &ops::read(observer)?)?;
    ops::delete(backup)
}

pub(super) fn delete_restore_parity(ctx: &mut ScenarioContext<'_>) -> VerifyResult<()> {
    let fixture = ctx.workspace.fixture()?;
    let spare = ctx.workspace.fixture()?;
    let real = fixture.path();
    let drive = ctx.controller.bind(real)?;
    let root = drive.root();
    check::same_file(real, &root)?;

    let backup = spare.path().join("testBackup");
    // The folder level has no delete-and-restore: a directory is not
    // copied with its contents.
    for level in levels(real, &root)?.into_iter().filter(|l| l.real != real) {
        debug!("Deleting and restoring {} through {}", level.name, drive.drive());
        delete_and_restore(&level.virtual_path, &level.real, &backup)?;
        delete_and_restore(&level.real, &level.virtual_path, &backup)?;
    }
    Ok(())
}
