//! Probe runner
//!
//! Runs `ping -c <count> <target>` as an argument vector. No shell is ever
//! involved, so the target cannot smuggle extra commands in.

use async_trait::async_trait;
use pb_core::{Error, Result};
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A validated probe target (hostname or IP address)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    /// Validate user input as a probe target.
    ///
    /// Accepts hostnames, IPv4 and IPv6 literals (with an optional `%zone`).
    /// Rejects empty input, anything that would be read as a command-line
    /// option, and characters that have no place in an address.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::user_input("Please enter an IP address or hostname to ping."));
        }
        if trimmed.starts_with('-') {
            return Err(Error::user_input(format!(
                "'{}' is not a valid address.",
                trimmed
            )));
        }
        if trimmed.len() > 253 {
            return Err(Error::user_input("Address is too long."));
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-' | '_' | '%')))
        {
            return Err(Error::user_input(format!(
                "'{}' is not a valid address (unexpected character {:?}).",
                trimmed, bad
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Captured output of one probe run
#[derive(Debug, Clone, Default)]
pub struct ProbeOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

/// Something that can probe a target and return its raw text output
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn run(&self, target: &Target) -> Result<ProbeOutput>;
}

/// Runs the system `ping` executable
#[derive(Debug, Clone)]
pub struct PingCommand {
    program: String,
    count: u32,
}

impl PingCommand {
    pub fn new(program: impl Into<String>, count: u32) -> Self {
        Self {
            program: program.into(),
            count: count.max(1),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Arguments passed to the program, target last
    pub fn args(&self, target: &Target) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.count.to_string(),
            target.as_str().to_string(),
        ]
    }
}

impl Default for PingCommand {
    fn default() -> Self {
        Self::new("ping", 4)
    }
}

#[async_trait]
impl ProbeRunner for PingCommand {
    async fn run(&self, target: &Target) -> Result<ProbeOutput> {
        let args = self.args(target);
        info!(program = %self.program, target = %target, count = self.count, "Running probe");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::process_invocation(format!("failed to run '{}': {}", self.program, e))
            })?;

        let result = ProbeOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };

        if output.status.success() {
            debug!(bytes = result.stdout.len(), "Probe completed");
        } else {
            // ping exits non-zero on packet loss; the parser decides what the output means
            warn!(
                exit_code = ?result.exit_code,
                stderr = %result.stderr.trim(),
                "Probe exited unsuccessfully"
            );
        }

        Ok(result)
    }
}
