//! End-to-end runs of the scenario suite with the symlink alias standing in
//! for `subst`.
//!
//! A symlink alias is a close but imperfect emulation: deleting it removes
//! the link rather than the target, and a no-follow stat sees the link
//! itself. Those two scenarios are expected to fail here with assertion
//! errors, and the tests pin that down.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use tempfile::TempDir;
use vdrive_core::{
    suite, DriverConfig, MappingCommands, MappingController, RunReport, TempWorkspace,
    VerifyError, VirtualDrive, SCENARIOS,
};

struct Setup {
    // Holds both the mount point and the workspace.
    scratch: TempDir,
    mount: PathBuf,
    config: DriverConfig,
}

fn setup() -> Setup {
    let scratch = TempDir::new().unwrap();
    let mount = scratch.path().join("vdrive-T");
    let config = DriverConfig {
        drive: VirtualDrive::mount_point(&mount),
        commands: MappingCommands::symlink_alias(),
        temp_root: Some(scratch.path().to_path_buf()),
    };
    Setup {
        scratch,
        mount,
        config,
    }
}

fn run_one(name: &str) -> RunReport {
    run_one_with(MappingCommands::symlink_alias(), name)
}

fn run_one_with(commands: MappingCommands, name: &str) -> RunReport {
    let setup = setup();
    let scenario = *suite::find(name).unwrap();
    let config = DriverConfig {
        commands,
        ..setup.config.clone()
    };
    let report = config
        .build()
        .unwrap()
        .run(&[scenario], &AtomicBool::new(false));
    assert!(
        std::fs::symlink_metadata(&setup.mount).is_err(),
        "{name} left the drive bound"
    );
    report
}

fn assert_passes(name: &str) {
    let report = run_one(name);
    if let Some(e) = report.first_error() {
        panic!("{name} failed: {}", e.chain());
    }
    assert_eq!(report.passed, vec![name]);
}

fn assert_diverges(name: &str) {
    assert_diverges_with(MappingCommands::symlink_alias(), name);
}

fn assert_diverges_with(commands: MappingCommands, name: &str) {
    let report = run_one_with(commands, name);
    match report.failure {
        Some(VerifyError::ScenarioFailed { scenario, ref source }) => {
            assert_eq!(scenario, name);
            assert!(source.is_assertion(), "{name}: {}", source.chain());
        }
        ref other => panic!("{name}: expected an assertion failure, got {:?}", other),
    }
    assert!(report.cleanup_errors.is_empty());
}

#[test]
fn test_create_and_delete_file() {
    assert_passes("create_and_delete_file");
}

#[test]
fn test_delete_substituted_drive_only_removes_alias() {
    assert_diverges("delete_substituted_drive");
}

#[test]
fn test_metadata_parity_sees_alias_link() {
    assert_diverges("metadata_parity");
}

#[test]
fn test_file_store_parity() {
    assert_passes("file_store_parity");
}

#[test]
fn test_attribute_get_set_parity() {
    assert_passes("attribute_get_set_parity");
}

#[test]
fn test_symlink_file_parity() {
    assert_passes("symlink_file_parity");
}

#[test]
fn test_subst_over_symlink() {
    assert_passes("subst_over_symlink");
}

#[test]
fn test_copy_drive_root() {
    assert_passes("copy_drive_root");
}

#[test]
fn test_volume_path_parity() {
    assert_passes("volume_path_parity");
}

#[test]
fn test_owner_parity() {
    assert_passes("owner_parity");
}

#[test]
fn test_delete_restore_parity() {
    assert_passes("delete_restore_parity");
}

// A copy of the target looks like the target until identity is checked.
// Every scenario binding straight to a directory must notice.
#[test]
fn test_copy_mapping_is_caught() {
    let copying = MappingCommands::from_templates("cp -r {target} {drive}", "rm -rf {drive}").unwrap();
    for scenario in SCENARIOS.iter().filter(|s| s.name != "subst_over_symlink") {
        assert_diverges_with(copying.clone(), scenario.name);
    }
}

#[test]
fn test_full_run_halts_and_cleans_up() {
    let setup = setup();
    let driver = setup.config.clone().build().unwrap();
    let workspace = driver.workspace().path().to_path_buf();

    let report = driver.run(SCENARIOS, &AtomicBool::new(false));

    // delete_substituted_drive is second and diverges under the alias.
    assert_eq!(report.passed, vec!["create_and_delete_file"]);
    match &report.failure {
        Some(VerifyError::ScenarioFailed { scenario, .. }) => {
            assert_eq!(*scenario, "delete_substituted_drive")
        }
        other => panic!("expected scenario failure, got {:?}", other),
    }
    assert!(report.cleanup_errors.is_empty());
    assert!(!workspace.exists());
    assert!(std::fs::symlink_metadata(&setup.mount).is_err());
}

#[test]
fn test_interrupted_run_still_cleans_up() {
    let setup = setup();
    let driver = setup.config.clone().build().unwrap();
    let workspace = driver.workspace().path().to_path_buf();

    let report = driver.run(SCENARIOS, &AtomicBool::new(true));

    assert!(report.passed.is_empty());
    assert!(matches!(report.failure, Some(VerifyError::Interrupted)));
    assert!(!workspace.exists());
}

#[test]
fn test_binding_is_released_on_error() {
    let setup = setup();
    let workspace = TempWorkspace::new_in(setup.scratch.path()).unwrap();
    let mut controller = MappingController::new(
        setup.config.drive.clone(),
        setup.config.commands.clone(),
    );

    let fixture = workspace.fixture().unwrap();
    let result: Result<(), VerifyError> = (|| {
        let drive = controller.bind(fixture.path())?;
        assert!(drive.root().join(".").exists());
        Err(VerifyError::Unsupported("bail out"))
    })();

    assert!(result.is_err());
    assert!(std::fs::symlink_metadata(&setup.mount).is_err());

    // The drive is free again.
    let drive = controller.bind(fixture.path()).unwrap();
    assert!(drive.release());
    drop(fixture);
    workspace.close().unwrap();
}

#[test]
fn test_double_bind_fails() {
    let setup = setup();
    let workspace = TempWorkspace::new_in(setup.scratch.path()).unwrap();
    let fixture = workspace.fixture().unwrap();
    let other = workspace.fixture().unwrap();

    let mut first = MappingController::new(
        setup.config.drive.clone(),
        setup.config.commands.clone(),
    );
    let mut second = MappingController::new(
        setup.config.drive.clone(),
        setup.config.commands.clone(),
    );

    let _bound = first.bind(fixture.path()).unwrap();
    let err = second.bind(other.path()).unwrap_err();
    assert!(matches!(err, VerifyError::CommandExecution { .. }), "{err}");
}
