//! Equivalence test suite.
//!
//! Each scenario provisions its own fixture, binds the drive, exercises the
//! filesystem through both the real and the virtual path, and releases the
//! drive when its binding drops. Scenarios run in the fixed order of
//! [`SCENARIOS`].

mod scenarios;

use crate::error::VerifyResult;
use crate::fixture::TempWorkspace;
use crate::mapping::MappingController;

/// What a scenario gets to work with.
pub struct ScenarioContext<'a> {
    pub workspace: &'a TempWorkspace,
    pub controller: &'a mut MappingController,
}

pub type ScenarioFn = fn(&mut ScenarioContext<'_>) -> VerifyResult<()>;

/// A named scenario.
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub run: ScenarioFn,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish()
    }
}

/// All scenarios, in run order.
pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "create_and_delete_file",
        run: scenarios::create_and_delete_file,
    },
    Scenario {
        name: "delete_substituted_drive",
        run: scenarios::delete_substituted_drive,
    },
    Scenario {
        name: "metadata_parity",
        run: scenarios::metadata_parity,
    },
    Scenario {
        name: "attribute_get_set_parity",
        run: scenarios::attribute_get_set_parity,
    },
    Scenario {
        name: "file_store_parity",
        run: scenarios::file_store_parity,
    },
    Scenario {
        name: "symlink_file_parity",
        run: scenarios::symlink_file_parity,
    },
    Scenario {
        name: "subst_over_symlink",
        run: scenarios::subst_over_symlink,
    },
    Scenario {
        name: "copy_drive_root",
        run: scenarios::copy_drive_root,
    },
    Scenario {
        name: "volume_path_parity",
        run: scenarios::volume_path_parity,
    },
    Scenario {
        name: "owner_parity",
        run: scenarios::owner_parity,
    },
    Scenario {
        name: "delete_restore_parity",
        run: scenarios::delete_restore_parity,
    },
];

/// Look up a scenario by name.
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

/// Scenarios whose names are in `names`, kept in run order. Unknown names
/// are returned as the error.
pub fn select(names: &[String]) -> Result<Vec<Scenario>, Vec<String>> {
    let unknown: Vec<String> = names.iter().filter(|n| find(n).is_none()).cloned().collect();
    if !unknown.is_empty() {
        return Err(unknown);
    }
    Ok(SCENARIOS
        .iter()
        .filter(|s| names.iter().any(|n| n == s.name))
        .copied()
        .collect())
}
