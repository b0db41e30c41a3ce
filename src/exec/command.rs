// src/exec/command.rs

//! Shell commands as node actions.

use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::dag::TaskName;

/// A named shell command taken from a `[task.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub name: TaskName,
    pub cmd: String,
}

impl ShellCommand {
    pub fn new(name: impl Into<TaskName>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
        }
    }

    /// Run the command to completion on the current thread.
    ///
    /// Stdout lines are logged at `info`, stderr lines at `debug`. A non-zero
    /// exit status is an error.
    pub fn run(&self) -> Result<()> {
        info!(task = %self.name, cmd = %self.cmd, "starting task process");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("spawning process for task '{}'", self.name))?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            info!(task = %self.name, "stdout: {}", line);
        }
        for line in String::from_utf8_lossy(&output.stderr).lines() {
            debug!(task = %self.name, "stderr: {}", line);
        }

        let code = output.status.code().unwrap_or(-1);
        info!(
            task = %self.name,
            exit_code = code,
            success = output.status.success(),
            "task process exited"
        );

        if !output.status.success() {
            bail!("command `{}` exited with code {}", self.cmd, code);
        }
        Ok(())
    }

    /// Consume the command into an action for [`TaskManager`](crate::dag::TaskManager).
    pub fn into_action(self) -> impl FnOnce() -> Result<()> + Send + 'static {
        move || self.run()
    }
}
