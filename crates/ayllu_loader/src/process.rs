//! `process{ "shell command" }` expression loader (spec §6).
//!
//! Disabled unless the driver passed `--allow-process`; callers are
//! expected to check that flag (carried in `CompilerOptions`, the root
//! crate) before calling [`run_process`] at all; this module itself just
//! executes the shell and captures stdout, and additionally requires the
//! command to come from a string literal at the call site (SPEC_FULL §2:
//! "this workspace additionally requires the shell command to be a string
//! literal... at the call site").

use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process{{}} is disabled; pass --allow-process to enable shell execution")]
    Disabled,
    #[error("failed to spawn shell command: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("shell command exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },
    #[error("process output is not valid UTF-8")]
    NotUtf8,
}

/// Execute `command` through `/bin/sh -c` and return its captured stdout.
///
/// `allowed` mirrors `CompilerOptions::allow_process`; checked here too so a
/// caller can't forget the gate.
pub fn run_process(command: &str, allowed: bool) -> Result<String, ProcessError> {
    if !allowed {
        return Err(ProcessError::Disabled);
    }

    let output = Command::new("/bin/sh").arg("-c").arg(command).output().map_err(ProcessError::Spawn)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        return Err(ProcessError::NonZeroExit { status: output.status.code().unwrap_or(-1), stderr });
    }

    String::from_utf8(output.stdout).map_err(|_| ProcessError::NotUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_by_default_rejects() {
        assert!(matches!(run_process("echo hi", false), Err(ProcessError::Disabled)));
    }

    #[test]
    fn allowed_executes_and_captures_stdout() {
        let out = run_process("echo hi", true).unwrap();
        assert_eq!(out.trim(), "hi");
    }
}
