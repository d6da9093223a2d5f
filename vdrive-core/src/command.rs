//! OS command bridge.
//!
//! Runs an external command to completion and reports success purely by
//! exit code. Used for the platform's drive mapping tool.

use std::fmt;
use std::process::Command;

use log::debug;

use crate::error::{VerifyError, VerifyResult};

/// A fully formed command: program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line on whitespace. Returns None for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let program = tokens.next()?;
        Some(Self::new(program, tokens))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// What happened when a command ran.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Captured stdout followed by stderr.
    pub output: String,
}

/// Run a command and wait for it.
///
/// A nonzero exit (or a failure to spawn or wait) is an error only when
/// `fail_on_non_zero_exit` is set; otherwise it is reported in the outcome.
pub fn run(command: &CommandLine, fail_on_non_zero_exit: bool) -> VerifyResult<CommandOutcome> {
    debug!("Running: {}", command);

    let outcome = match Command::new(&command.program).args(&command.args).output() {
        Ok(out) => {
            let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
            output.push_str(&String::from_utf8_lossy(&out.stderr));
            CommandOutcome {
                success: out.status.success(),
                code: out.status.code(),
                output,
            }
        }
        // Spawn failure or interrupted wait counts as an unsuccessful exit
        Err(e) => CommandOutcome {
            success: false,
            code: None,
            output: e.to_string(),
        },
    };

    if !outcome.success {
        if fail_on_non_zero_exit {
            return Err(VerifyError::CommandExecution {
                command: command.to_string(),
                output: outcome.output,
            });
        }
        debug!(
            "Ignoring failure of {} (exit code {:?}): {}",
            command,
            outcome.code,
            outcome.output.trim()
        );
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_line() {
        let cmd = CommandLine::parse("cmd /c  subst T: /d").unwrap();
        assert_eq!(cmd.program, "cmd");
        assert_eq!(cmd.args, vec!["/c", "subst", "T:", "/d"]);
        assert!(CommandLine::parse("   ").is_none());
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = CommandLine::new("subst", ["T:", "C:\\My Files"]);
        assert_eq!(cmd.to_string(), "subst T: \"C:\\My Files\"");
    }

    #[test]
    fn test_missing_program_tolerated() {
        let cmd = CommandLine::new("vdrive-no-such-program", Vec::<String>::new());
        let outcome = run(&cmd, false).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.code, None);
    }

    #[test]
    fn test_missing_program_strict() {
        let cmd = CommandLine::new("vdrive-no-such-program", Vec::<String>::new());
        let err = run(&cmd, true).unwrap_err();
        assert!(matches!(err, VerifyError::CommandExecution { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_success_captures_output() {
        let cmd = CommandLine::new("sh", ["-c", "echo out; echo err >&2"]);
        let outcome = run(&cmd, true).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.code, Some(0));
        assert_eq!(outcome.output, "out\nerr\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_embeds_output() {
        let cmd = CommandLine::new("sh", ["-c", "echo partial; echo broken >&2; exit 3"]);

        let outcome = run(&cmd, false).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.code, Some(3));

        match run(&cmd, true) {
            Err(VerifyError::CommandExecution { command, output }) => {
                assert!(command.starts_with("sh -c"));
                assert_eq!(output, "partial\nbroken\n");
            }
            other => panic!("expected command failure, got {:?}", other),
        }
    }
}
