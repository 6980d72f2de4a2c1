use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://granblue-automation-statistics.com";

/// Launcher configuration from `launcher.yaml`
///
/// Describes where the launcher finds its files and how it starts the bot.
/// Every field has a default, so a missing file is the same as an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Settings document shared with the bot process
    pub settings_path: Utf8PathBuf,

    /// Directory that receives session logs and diagnostic logs
    pub log_dir: Utf8PathBuf,

    pub interpreter: String,
    pub script: Utf8PathBuf,

    /// Working directory for the bot process; inherits ours when unset
    pub working_dir: Option<Utf8PathBuf>,

    pub api_base_url: String,
    pub api_timeout_secs: u64,

    pub debug_mode: bool,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            settings_path: Utf8PathBuf::from("backend/settings.json"),
            log_dir: Utf8PathBuf::from("logs"),
            interpreter: "python".to_string(),
            script: Utf8PathBuf::from("backend/main.py"),
            working_dir: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_timeout_secs: 30,
            debug_mode: false,
        }
    }
}

/// Program, arguments and working directory of the bot process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<Utf8PathBuf>,
}

impl LauncherConfig {
    pub fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec {
            program: self.interpreter.clone(),
            args: vec![self.script.to_string()],
            working_dir: self.working_dir.clone(),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launcher_defaults() {
        let config = LauncherConfig::default();
        assert_eq!(config.settings_path, "backend/settings.json");
        assert_eq!(config.log_dir, "logs");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.api_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_launch_spec_runs_script_with_interpreter() {
        let config = LauncherConfig {
            interpreter: "python3".to_string(),
            script: Utf8PathBuf::from("bot/main.py"),
            working_dir: Some(Utf8PathBuf::from("/opt/bot")),
            ..LauncherConfig::default()
        };

        let spec = config.launch_spec();
        assert_eq!(spec.program, "python3");
        assert_eq!(spec.args, vec!["bot/main.py".to_string()]);
        assert_eq!(spec.working_dir.as_deref(), Some(camino::Utf8Path::new("/opt/bot")));
    }
}
