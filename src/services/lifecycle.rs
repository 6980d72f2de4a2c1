//! Host-specific process control.
//!
//! Creating the log directory and killing the bot's whole process tree are done
//! with the host's own shell tools. Each host OS family gets one
//! [`ProcessLifecycle`] implementation; [`default_lifecycle`] picks the one for
//! the platform we were built for.

use camino::Utf8Path;
use std::process::Output;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Platform capability for managing the bot process.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessLifecycle: Send + Sync {
    /// Make sure `log_dir` exists.
    fn ensure_log_dir(&self, log_dir: &Utf8Path) -> Result<(), LifecycleError>;

    /// Prepare the spawn command so the whole process tree can be killed later.
    fn configure(&self, command: &mut Command);

    /// Forcefully terminate `pid` and every process it started.
    ///
    /// # Returns
    /// The kill command's standard output
    fn kill_tree(&self, pid: u32) -> Result<String, LifecycleError>;
}

fn run(program: &str, args: &[&str]) -> Result<String, LifecycleError> {
    let command = format!("{} {}", program, args.join(" "));
    tracing::debug!("Running {}", command);

    let output: Output = std::process::Command::new(program)
        .args(args)
        .output()
        .map_err(|source| LifecycleError::Io {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(LifecycleError::Failed {
            command,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// PowerShell `md` and `taskkill /T`
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsLifecycle;

#[cfg(windows)]
impl ProcessLifecycle for WindowsLifecycle {
    fn ensure_log_dir(&self, log_dir: &Utf8Path) -> Result<(), LifecycleError> {
        let script = format!("md -Force '{}' | Out-Null", log_dir.as_str().replace('\'', "''"));
        run("powershell", &["-NoProfile", "-Command", &script]).map(|_| ())
    }

    fn configure(&self, command: &mut Command) {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    fn kill_tree(&self, pid: u32) -> Result<String, LifecycleError> {
        let pid = pid.to_string();
        run("taskkill", &["/F", "/T", "/PID", &pid])
    }
}

/// `mkdir -p` and a process-group `kill -KILL`.
///
/// The bot is spawned as the leader of a new process group, so signalling the
/// negated pid reaches every process it started.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixLifecycle;

#[cfg(unix)]
impl ProcessLifecycle for UnixLifecycle {
    fn ensure_log_dir(&self, log_dir: &Utf8Path) -> Result<(), LifecycleError> {
        run("mkdir", &["-p", log_dir.as_str()]).map(|_| ())
    }

    fn configure(&self, command: &mut Command) {
        command.process_group(0);
    }

    fn kill_tree(&self, pid: u32) -> Result<String, LifecycleError> {
        let group = format!("-{}", pid);
        run("kill", &["-KILL", "--", &group])
    }
}

/// The lifecycle implementation for the host OS
#[cfg(windows)]
pub fn default_lifecycle() -> Arc<dyn ProcessLifecycle> {
    Arc::new(WindowsLifecycle)
}

/// The lifecycle implementation for the host OS
#[cfg(unix)]
pub fn default_lifecycle() -> Arc<dyn ProcessLifecycle> {
    Arc::new(UnixLifecycle)
}
