//! Mapping controller - binds and releases the virtual drive.
//!
//! The controller is the single handle for the drive. A bind hands out a
//! [`DriveBinding`] that mutably borrows the controller and the target path,
//! so only one binding can be alive at a time and it cannot outlive the
//! directory it points at. Dropping the binding releases the drive.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::command::{self, CommandOutcome};
use crate::drive::{MappingCommands, VirtualDrive};
use crate::error::{VerifyError, VerifyResult};

/// Owns the virtual drive and the commands that map it.
#[derive(Debug)]
pub struct MappingController {
    drive: VirtualDrive,
    commands: MappingCommands,
}

impl MappingController {
    pub fn new(drive: VirtualDrive, commands: MappingCommands) -> Self {
        Self { drive, commands }
    }

    /// Controller for the platform default drive and commands.
    pub fn platform_default() -> Self {
        Self::new(VirtualDrive::platform_default(), MappingCommands::platform_default())
    }

    pub fn drive(&self) -> &VirtualDrive {
        &self.drive
    }

    pub fn commands(&self) -> &MappingCommands {
        &self.commands
    }

    /// Bind the drive to `target`.
    ///
    /// Fails if the target is missing or the bind command exits nonzero
    /// (which includes the drive already being bound).
    pub fn bind<'a>(&'a mut self, target: &'a Path) -> VerifyResult<DriveBinding<'a>> {
        if !target.exists() {
            return Err(VerifyError::TargetMissing(target.to_path_buf()));
        }

        let cmd = self.commands.bind_command(&self.drive, target);
        command::run(&cmd, true)?;
        info!("Bound {} -> {}", self.drive, target.display());

        Ok(DriveBinding {
            controller: self,
            target: target.to_path_buf(),
            released: false,
        })
    }

    /// Release the drive. Never fails on a nonzero exit; the outcome tells
    /// whether the command succeeded.
    pub fn unbind(&mut self) -> VerifyResult<CommandOutcome> {
        let cmd = self.commands.unbind_command(&self.drive);
        command::run(&cmd, false)
    }

    /// Unbind when nothing may be bound. Failure is expected and only
    /// logged at debug level.
    pub fn release_any(&mut self) {
        match self.unbind() {
            Ok(outcome) if outcome.success => debug!("Released {}", self.drive),
            Ok(outcome) => debug!(
                "Nothing to release on {}: {}",
                self.drive,
                outcome.output.trim()
            ),
            Err(e) => debug!("Release of {} failed: {}", self.drive, e),
        }
    }
}

/// An active drive binding.
///
/// Released by [`DriveBinding::release`] or, on any other exit path, by
/// `Drop`. A failed release of an active binding is logged, never raised.
#[derive(Debug)]
pub struct DriveBinding<'a> {
    controller: &'a mut MappingController,
    target: PathBuf,
    released: bool,
}

impl DriveBinding<'_> {
    pub fn drive(&self) -> &VirtualDrive {
        &self.controller.drive
    }

    /// The virtual path of the mapped directory.
    pub fn root(&self) -> PathBuf {
        self.controller.drive.root()
    }

    /// Virtual path of `name` under the drive root.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.controller.drive.join(name)
    }

    /// The real path the drive was bound to.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Release now and report whether the unbind command succeeded.
    pub fn release(mut self) -> bool {
        self.release_inner()
    }

    fn release_inner(&mut self) -> bool {
        if self.released {
            return true;
        }
        self.released = true;

        match self.controller.unbind() {
            Ok(outcome) if outcome.success => {
                info!("Released {}", self.controller.drive);
                true
            }
            Ok(outcome) => {
                warn!(
                    "Failed to release {}: {}",
                    self.controller.drive,
                    outcome.output.trim()
                );
                false
            }
            Err(e) => {
                warn!("Failed to release {}: {}", self.controller.drive, e);
                false
            }
        }
    }
}

impl Drop for DriveBinding<'_> {
    fn drop(&mut self) {
        self.release_inner();
    }
}
