//! Command driver — actuates by running a local program.
//!
//! The payload is passed as a single argument after the configured ones.
//! The program is spawned directly, never through a shell. A program still
//! running after the wait window is reaped in the background, so long-lived
//! players do not hold the device for their whole run.

use std::collections::HashSet;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use brightnest_app::ports::Driver;
use brightnest_domain::error::DriverError;

/// Failures of a spawned command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("failed to spawn {program:?}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the program failed.
    #[error("failed to wait for {program:?}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran but reported failure.
    #[error("{program:?} exited with {status}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
    },
}

impl From<CommandError> for DriverError {
    fn from(err: CommandError) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// How long `apply` waits for the program before leaving it to run.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Driver that launches `program args... <payload>` on every `apply`.
#[derive(Debug)]
pub struct CommandDriver {
    program: String,
    args: Vec<String>,
    wait: Duration,
    devices: Mutex<HashSet<String>>,
}

impl CommandDriver {
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            wait: DEFAULT_WAIT,
            devices: Mutex::new(HashSet::new()),
        }
    }

    /// Wait at most `wait` for the exit status before detaching.
    #[must_use]
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Strings are passed verbatim, anything else as compact JSON.
    fn argument(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    async fn run(&self, value: &serde_json::Value) -> Result<(), CommandError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(Self::argument(value))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let Ok(status) = tokio::time::timeout(self.wait, child.wait()).await else {
            tracing::debug!(program = %self.program, wait = ?self.wait, "command still running, reaping in background");
            tokio::spawn(reap(self.program.clone(), child));
            return Ok(());
        };
        let status = status.map_err(|source| CommandError::Wait {
            program: self.program.clone(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Exit {
                program: self.program.clone(),
                status,
            })
        }
    }
}

async fn reap(program: String, mut child: Child) {
    match child.wait().await {
        Ok(status) if status.success() => {
            tracing::debug!(%program, "detached command finished");
        }
        Ok(status) => tracing::warn!(%program, %status, "detached command failed"),
        Err(error) => tracing::warn!(%program, %error, "failed to reap detached command"),
    }
}

#[async_trait]
impl Driver for CommandDriver {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn add(&self, custom_id: &str) -> Result<(), DriverError> {
        if !self.devices.lock().await.insert(custom_id.to_string()) {
            return Err(DriverError::AlreadyRegistered(custom_id.to_string()));
        }
        Ok(())
    }

    async fn update(&self, prev_custom_id: &str, new_custom_id: &str) -> Result<(), DriverError> {
        let mut devices = self.devices.lock().await;
        if !devices.remove(prev_custom_id) {
            return Err(DriverError::UnknownDevice(prev_custom_id.to_string()));
        }
        devices.insert(new_custom_id.to_string());
        Ok(())
    }

    async fn remove(&self, custom_id: &str) -> Result<(), DriverError> {
        self.devices.lock().await.remove(custom_id);
        Ok(())
    }

    async fn apply(&self, custom_id: &str, value: &serde_json::Value) -> Result<(), DriverError> {
        if !self.devices.lock().await.contains(custom_id) {
            return Err(DriverError::UnknownDevice(custom_id.to_string()));
        }
        tracing::debug!(custom_id, program = %self.program, "running actuation command");
        self.run(value).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn should_pass_strings_verbatim() {
        assert_eq!(CommandDriver::argument(&json!("song.mp3")), "song.mp3");
        assert_eq!(
            CommandDriver::argument(&json!(". || rm -rf *")),
            ". || rm -rf *"
        );
    }

    #[test]
    fn should_pass_other_values_as_json() {
        assert_eq!(CommandDriver::argument(&json!(25)), "25");
        assert_eq!(CommandDriver::argument(&json!({"v": 1})), r#"{"v":1}"#);
    }

    #[tokio::test]
    async fn should_fail_apply_when_device_not_added() {
        let driver = CommandDriver::new("true", vec![]);

        let err = driver.apply("BB22", &json!(1)).await.unwrap_err();

        assert!(matches!(err, DriverError::UnknownDevice(_)));
    }

    #[tokio::test]
    async fn should_reject_second_add_of_same_id() {
        let driver = CommandDriver::new("true", vec![]);
        driver.add("BB22").await.unwrap();

        let err = driver.add("BB22").await.unwrap_err();

        assert!(matches!(err, DriverError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn should_report_backend_error_when_program_missing() {
        let driver = CommandDriver::new("brightnest-definitely-not-a-program", vec![]);
        driver.add("BB22").await.unwrap();

        let err = driver.apply("BB22", &json!("x")).await.unwrap_err();

        assert!(matches!(err, DriverError::Backend(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn should_succeed_when_program_exits_zero() {
        let driver = CommandDriver::new("true", vec![]);
        driver.add("BB22").await.unwrap();

        driver.apply("BB22", &json!("x")).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn should_report_backend_error_when_program_exits_non_zero() {
        let driver = CommandDriver::new("false", vec![]);
        driver.add("BB22").await.unwrap();

        let err = driver.apply("BB22", &json!("x")).await.unwrap_err();

        assert!(matches!(err, DriverError::Backend(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn should_return_without_waiting_for_long_running_program() {
        let driver = CommandDriver::new("sleep", vec![]).with_wait(Duration::from_millis(50));
        driver.add("BB22").await.unwrap();

        let applied = tokio::time::timeout(Duration::from_secs(2), driver.apply("BB22", &json!("5"))).await;

        assert!(matches!(applied, Ok(Ok(()))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn should_still_report_fast_failure_within_wait_window() {
        let driver = CommandDriver::new("false", vec![]).with_wait(Duration::from_secs(2));
        driver.add("BB22").await.unwrap();

        let err = driver.apply("BB22", &json!("x")).await.unwrap_err();

        assert!(matches!(err, DriverError::Backend(_)));
    }

    #[tokio::test]
    async fn should_follow_renamed_id() {
        let driver = CommandDriver::new("true", vec![]);
        driver.add("BB22").await.unwrap();

        driver.update("BB22", "CC33").await.unwrap();

        assert!(matches!(
            driver.apply("BB22", &json!(1)).await,
            Err(DriverError::UnknownDevice(_))
        ));
    }
}
