//! Virtual Drive Verifier Core
//!
//! This crate checks that a virtual drive mapping (Windows `subst`, or a
//! stand-in elsewhere) is indistinguishable from the directory it maps:
//! - Command bridge for the bind and unbind OS commands
//! - Mapping controller with scoped drive bindings
//! - Attribute, store and identity probes per platform
//! - An ordered equivalence scenario suite and its driver
//!
//! # Architecture
//!
//! - `MappingController`: owns the drive; `bind` hands out a `DriveBinding`
//!   that releases the drive when dropped
//! - `TempWorkspace`/`ScenarioFixture`: per-run and per-scenario directories
//! - `check`: assertions returning `VerifyError::Assertion`
//! - `Driver`: runs scenarios fail-fast, then unbinds and deletes the
//!   workspace regardless of outcome

pub mod check;
pub mod command;
pub mod drive;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod mapping;
pub mod ops;
pub mod probe;
pub mod suite;

pub use command::{CommandLine, CommandOutcome};
pub use drive::{MappingCommands, VirtualDrive};
pub use driver::{Driver, DriverConfig, RunReport};
pub use error::{VerifyError, VerifyResult};
pub use fixture::{ScenarioFixture, TempWorkspace};
pub use mapping::{DriveBinding, MappingController};
pub use probe::{AttributeSnapshot, FileIdentity, LinkPolicy, StoreSnapshot};
pub use suite::{Scenario, ScenarioContext, SCENARIOS};
