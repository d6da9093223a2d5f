//! Virtual drive identifiers and the commands that map them.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::command::CommandLine;
use crate::error::{VerifyError, VerifyResult};

/// A single reserved mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualDrive {
    /// Windows drive letter (A-Z), stored uppercase.
    Letter(char),
    /// Mount path, used where drive letters don't exist.
    MountPoint(PathBuf),
}

impl VirtualDrive {
    /// Parse `T`, `t:` or `T:\` as a drive letter, anything else containing
    /// a path separator as a mount point.
    pub fn parse(id: &str) -> VerifyResult<Self> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(VerifyError::InvalidDrive(id.to_string()));
        }

        let letter_part = trimmed
            .strip_suffix('\\')
            .or_else(|| trimmed.strip_suffix('/'))
            .unwrap_or(trimmed);
        let letter_part = letter_part.strip_suffix(':').unwrap_or(letter_part);

        let mut chars = letter_part.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Self::letter(c);
        }

        if trimmed.contains('/') || trimmed.contains('\\') {
            Ok(VirtualDrive::MountPoint(PathBuf::from(trimmed)))
        } else {
            Err(VerifyError::InvalidDrive(id.to_string()))
        }
    }

    /// Drive letter, validated to A-Z.
    pub fn letter(c: char) -> VerifyResult<Self> {
        let upper = c.to_ascii_uppercase();
        if upper.is_ascii_uppercase() {
            Ok(VirtualDrive::Letter(upper))
        } else {
            Err(VerifyError::InvalidDrive(c.to_string()))
        }
    }

    pub fn mount_point(path: impl Into<PathBuf>) -> Self {
        VirtualDrive::MountPoint(path.into())
    }

    /// The path that addresses the mapped directory itself.
    pub fn root(&self) -> PathBuf {
        match self {
            VirtualDrive::Letter(c) => PathBuf::from(format!("{}:\\", c)),
            VirtualDrive::MountPoint(p) => p.clone(),
        }
    }

    /// Path of `name` directly under the drive root.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root().join(name)
    }

    /// Identifier as passed to mapping commands (`T:` or the mount path).
    pub fn command_arg(&self) -> String {
        match self {
            VirtualDrive::Letter(c) => format!("{}:", c),
            VirtualDrive::MountPoint(p) => p.display().to_string(),
        }
    }

    /// Platform default: `T:` on Windows, `<tmp>/vdrive-T` elsewhere.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            VirtualDrive::Letter('T')
        } else {
            VirtualDrive::MountPoint(std::env::temp_dir().join("vdrive-T"))
        }
    }
}

impl fmt::Display for VirtualDrive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_arg())
    }
}

/// Bind and unbind command templates.
///
/// Templates are split into argv tokens first and then `{drive}` and
/// `{target}` are substituted per token, so paths with spaces stay whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingCommands {
    pub bind: CommandLine,
    pub unbind: CommandLine,
}

impl MappingCommands {
    pub const DRIVE: &'static str = "{drive}";
    pub const TARGET: &'static str = "{target}";

    pub fn from_templates(bind: &str, unbind: &str) -> VerifyResult<Self> {
        let bind = CommandLine::parse(bind)
            .ok_or_else(|| VerifyError::InvalidCommand(format!("empty bind command: {bind:?}")))?;
        let unbind = CommandLine::parse(unbind)
            .ok_or_else(|| VerifyError::InvalidCommand(format!("empty unbind command: {unbind:?}")))?;
        Ok(Self { bind, unbind })
    }

    /// `subst` on Windows. Elsewhere a symlink stands in for the mapping.
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Self::subst()
        } else {
            Self::symlink_alias()
        }
    }

    pub fn subst() -> Self {
        Self {
            bind: CommandLine::new("cmd", ["/c", "subst", Self::DRIVE, Self::TARGET]),
            unbind: CommandLine::new("cmd", ["/c", "subst", Self::DRIVE, "/d"]),
        }
    }

    /// `ln -sn` alias. `-n` makes binding over an existing link fail
    /// instead of nesting a new link inside the old target.
    pub fn symlink_alias() -> Self {
        Self {
            bind: CommandLine::new("ln", ["-sn", Self::TARGET, Self::DRIVE]),
            unbind: CommandLine::new("rm", ["-f", Self::DRIVE]),
        }
    }

    pub fn bind_command(&self, drive: &VirtualDrive, target: &Path) -> CommandLine {
        render(&self.bind, drive, Some(target))
    }

    pub fn unbind_command(&self, drive: &VirtualDrive) -> CommandLine {
        render(&self.unbind, drive, None)
    }
}

fn render(template: &CommandLine, drive: &VirtualDrive, target: Option<&Path>) -> CommandLine {
    let drive_arg = drive.command_arg();
    let target_arg = target.map(|t| t.display().to_string()).unwrap_or_default();
    let fill = |token: &str| {
        token
            .replace(MappingCommands::DRIVE, &drive_arg)
            .replace(MappingCommands::TARGET, &target_arg)
    };
    CommandLine {
        program: fill(&template.program),
        args: template.args.iter().map(|a| fill(a)).collect(),
    }
}
