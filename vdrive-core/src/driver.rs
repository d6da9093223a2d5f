//! Runs the scenario suite against one drive and cleans up after it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};

use crate::drive::{MappingCommands, VirtualDrive};
use crate::error::{VerifyError, VerifyResult};
use crate::fixture::TempWorkspace;
use crate::mapping::MappingController;
use crate::suite::{Scenario, ScenarioContext};

/// Resolved run settings.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub drive: VirtualDrive,
    pub commands: MappingCommands,
    /// Parent of the workspace; the system temp directory if unset.
    pub temp_root: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            drive: VirtualDrive::platform_default(),
            commands: MappingCommands::platform_default(),
            temp_root: None,
        }
    }
}

impl DriverConfig {
    /// Create the workspace and the driver.
    pub fn build(self) -> VerifyResult<Driver> {
        let workspace = match &self.temp_root {
            Some(root) => TempWorkspace::new_in(root)?,
            None => TempWorkspace::new()?,
        };
        let controller = MappingController::new(self.drive, self.commands);
        Ok(Driver::new(controller, workspace))
    }
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub passed: Vec<&'static str>,
    pub failure: Option<VerifyError>,
    pub cleanup_errors: Vec<VerifyError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && self.cleanup_errors.is_empty()
    }

    /// The error to report: the scenario failure, else the first cleanup
    /// error.
    pub fn first_error(&self) -> Option<&VerifyError> {
        self.failure.as_ref().or(self.cleanup_errors.first())
    }
}

pub struct Driver {
    controller: MappingController,
    workspace: TempWorkspace,
}

impl Driver {
    pub fn new(controller: MappingController, workspace: TempWorkspace) -> Self {
        Self {
            controller,
            workspace,
        }
    }

    pub fn workspace(&self) -> &TempWorkspace {
        &self.workspace
    }

    /// Run `scenarios` in order, stopping at the first failure or when
    /// `should_stop` is set. The drive is released and the workspace
    /// deleted on every path out.
    pub fn run(mut self, scenarios: &[Scenario], should_stop: &AtomicBool) -> RunReport {
        let mut passed = Vec::new();
        let failure = self.run_scenarios(scenarios, should_stop, &mut passed).err();
        if let Some(e) = &failure {
            error!("{}", e.chain());
        }
        let mut report = RunReport {
            passed,
            failure,
            cleanup_errors: Vec::new(),
        };

        self.controller.release_any();
        let path = self.workspace.path().to_path_buf();
        match self.workspace.close() {
            Ok(()) => info!("Deleted {}", path.display()),
            Err(e) => {
                warn!("Could not delete {}: {}", path.display(), e);
                report.cleanup_errors.push(e);
            }
        }
        report
    }

    fn run_scenarios(
        &mut self,
        scenarios: &[Scenario],
        should_stop: &AtomicBool,
        passed: &mut Vec<&'static str>,
    ) -> VerifyResult<()> {
        for scenario in scenarios {
            if should_stop.load(Ordering::SeqCst) {
                warn!("Stopping before {}", scenario.name);
                return Err(VerifyError::Interrupted);
            }

            info!("Running {}", scenario.name);
            let mut ctx = ScenarioContext {
                workspace: &self.workspace,
                controller: &mut self.controller,
            };
            (scenario.run)(&mut ctx).map_err(|e| VerifyError::ScenarioFailed {
                scenario: scenario.name,
                source: Box::new(e),
            })?;
            info!("{} passed", scenario.name);
            passed.push(scenario.name);
        }
        Ok(())
    }
}
