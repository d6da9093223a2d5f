//! Error types for the drive verifier.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while verifying a virtual drive.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Command failed to run: {command}, output:\n{output}")]
    CommandExecution { command: String, output: String },

    #[error("{property} diverged at {location}: {left} != {right}")]
    Assertion {
        property: String,
        left: String,
        right: String,
        location: String,
    },

    #[error("{op} failed for {}: {source}", path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid drive: {0}")]
    InvalidDrive(String),

    #[error("Invalid command template: {0}")]
    InvalidCommand(String),

    #[error("Mapping target does not exist: {}", .0.display())]
    TargetMissing(PathBuf),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("Scenario {scenario} failed")]
    ScenarioFailed {
        scenario: &'static str,
        #[source]
        source: Box<VerifyError>,
    },

    #[error("Run interrupted")]
    Interrupted,
}

impl VerifyError {
    /// Build a closure that wraps an I/O error with the operation and path.
    pub fn fs(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| VerifyError::Filesystem { op, path, source }
    }

    /// Innermost error, looking through scenario wrappers.
    pub fn root_cause(&self) -> &VerifyError {
        match self {
            VerifyError::ScenarioFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this is (or wraps) an equivalence assertion failure.
    pub fn is_assertion(&self) -> bool {
        matches!(self.root_cause(), VerifyError::Assertion { .. })
    }

    /// This error followed by its sources, one per line.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(e) = source {
            out.push_str("\n  caused by: ");
            out.push_str(&e.to_string());
            source = e.source();
        }
        out
    }
}

/// Result type for verifier operations.
pub type VerifyResult<T> = Result<T, VerifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_error_context() {
        let err = VerifyError::fs("read", "/nowhere/file.txt")(std::io::Error::from(
            std::io::ErrorKind::NotFound,
        ));
        let msg = err.to_string();
        assert!(msg.starts_with("read failed for /nowhere/file.txt"), "{msg}");
    }

    #[test]
    fn test_root_cause_unwraps_scenario() {
        let inner = VerifyError::Assertion {
            property: "hidden".into(),
            left: "false".into(),
            right: "true".into(),
            location: "here:1".into(),
        };
        let wrapped = VerifyError::ScenarioFailed {
            scenario: "metadata_parity",
            source: Box::new(inner),
        };

        assert!(wrapped.is_assertion());
        assert!(matches!(wrapped.root_cause(), VerifyError::Assertion { property, .. } if property == "hidden"));
        assert!(!VerifyError::Interrupted.is_assertion());
    }

    #[test]
    fn test_chain_lists_sources() {
        let wrapped = VerifyError::ScenarioFailed {
            scenario: "copy_drive_root",
            source: Box::new(VerifyError::fs("copy", "/a")(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk gone",
            ))),
        };

        let chain = wrapped.chain();
        let lines: Vec<&str> = chain.lines().collect();
        assert_eq!(lines[0], "Scenario copy_drive_root failed");
        assert!(lines[1].contains("copy failed for /a"));
        assert_eq!(lines[2], "  caused by: disk gone");
    }
}
