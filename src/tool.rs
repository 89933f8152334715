//! External tool invocation - one child process per protocol unit
//!
//! Build the argument list, run it to completion with stdout and stderr
//! captured, and turn a non-zero exit into a failure that carries the whole
//! captured output.

use std::ffi::{OsStr, OsString};
use std::process::{Command, Stdio};

use crate::pipeline::{PipelineError, Stage};

#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: OsString,
    args: Vec<OsString>,
    stage: Stage,
}

impl ToolInvocation {
    pub fn new(program: impl Into<OsString>, stage: Stage) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            stage,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn arg_list(&self) -> &[OsString] {
        &self.args
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Argument list as lossy strings, for logs and tests.
    pub fn display_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Run to completion; returns all of stdout, then all of stderr (not
    /// interleaved).
    pub fn run(&self) -> Result<String, PipelineError> {
        log::info!(
            "Executing step [{}]: {} {:?}",
            self.stage,
            self.program.to_string_lossy(),
            self.display_args()
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| PipelineError::StageFailed {
                stage: self.stage,
                code: None,
                output: format!(
                    "failed to start '{}': {e}",
                    self.program.to_string_lossy()
                ),
            })?;

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            log::error!(
                "--- output for step [{}] ---\n{}\n---",
                self.stage,
                captured.trim_end()
            );
            return Err(PipelineError::StageFailed {
                stage: self.stage,
                code: output.status.code(),
                output: captured,
            });
        }

        log::debug!("step [{}] finished", self.stage);
        Ok(captured)
    }
}

/// `true` when `<program> -version` runs and exits cleanly.
pub fn is_program_available(program: &OsStr) -> bool {
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
