use crate::models::settings::{backfill_missing_keys, reset_unreadable_fields};
use crate::models::{LauncherConfig, Settings, SummonCatalog};
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use serde_json::Value;
use std::fs;

/// Prefix of environment variables overriding `launcher.yaml`, e.g. `GA_LAUNCHER_LOG_DIR`
pub const ENV_PREFIX: &str = "GA_LAUNCHER";

pub const LAUNCHER_CONFIG_FILE: &str = "launcher.yaml";

/// Configuration manager for the launcher's two files.
///
/// - Launcher config (`launcher.yaml`): where the settings, logs and bot script live
/// - User settings (`settings.json`): the document shared with the bot process
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    launcher_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager rooted at `config_dir`.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            launcher_config_path: config_dir.join(LAUNCHER_CONFIG_FILE),
            config_dir,
        })
    }

    /// Load the launcher configuration.
    ///
    /// Sources, lowest priority first: built-in defaults, `launcher.yaml` (optional),
    /// `GA_LAUNCHER_*` environment variables.
    pub fn load_launcher_config(&self) -> Result<LauncherConfig> {
        if !self.launcher_config_path.exists() {
            tracing::debug!(
                "Launcher config not found at {}, using defaults",
                self.launcher_config_path
            );
        }

        let config = ::config::Config::builder()
            .add_source(
                ::config::File::from(self.launcher_config_path.as_std_path())
                    .format(::config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .with_context(|| {
                format!("Failed to read launcher config: {}", self.launcher_config_path)
            })?;

        let launcher: LauncherConfig = config.try_deserialize().with_context(|| {
            format!("Failed to parse launcher config: {}", self.launcher_config_path)
        })?;

        tracing::info!(
            "Launcher config: settings={}, logs={}, bot=`{} {}`, api={}",
            launcher.settings_path,
            launcher.log_dir,
            launcher.interpreter,
            launcher.script,
            launcher.api_base_url
        );
        Ok(launcher)
    }

    /// Save the launcher configuration as YAML.
    pub fn save_launcher_config(&self, config: &LauncherConfig) -> Result<()> {
        let yaml_string = serde_yaml_ng::to_string(config)
            .context("Failed to serialize launcher config to YAML")?;

        fs::write(&self.launcher_config_path, yaml_string).with_context(|| {
            format!("Failed to write launcher config: {}", self.launcher_config_path)
        })?;

        tracing::info!("Saved launcher config to {}", self.launcher_config_path);
        Ok(())
    }

    /// Write a `launcher.yaml` with every default spelled out.
    ///
    /// # Returns
    /// `false` when the file already existed and was left alone
    pub fn write_default_launcher_config(&self) -> Result<bool> {
        if self.launcher_config_path.exists() {
            tracing::warn!(
                "Launcher config already exists at {}, not overwriting",
                self.launcher_config_path
            );
            return Ok(false);
        }

        self.save_launcher_config(&LauncherConfig::default())?;
        Ok(true)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn launcher_config_path(&self) -> &Utf8Path {
        &self.launcher_config_path
    }
}

/// Load the user settings from `path`.
///
/// Top-level keys missing from the file are filled in from
/// [`Settings::default()`]; keys present in the file keep their values and keys
/// unknown to the launcher are preserved. A known field holding `null` or a
/// value of the wrong type falls back to its default instead of failing the load.
pub fn load_settings(path: &Utf8Path) -> Result<Settings> {
    let file_contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read settings: {}", path))?;

    let mut document: Value = serde_json::from_str(&file_contents)
        .with_context(|| format!("Failed to parse settings: {}", path))?;

    if !document.is_object() {
        bail!("Settings file {} does not contain a JSON object", path);
    }

    let defaults = Settings::default_document();
    let filled = backfill_missing_keys(&mut document, &defaults);
    if !filled.is_empty() {
        tracing::info!("Filled missing settings keys from defaults: {}", filled.join(", "));
    }

    let reset = reset_unreadable_fields(&mut document, &defaults);
    if !reset.is_empty() {
        tracing::warn!("Reset unreadable settings to defaults: {}", reset.join(", "));
    }

    let settings: Settings = serde_json::from_value(document)
        .with_context(|| format!("Failed to parse settings: {}", path))?;

    tracing::info!("Loaded settings from {}", path);
    Ok(settings)
}

/// Save the user settings to `path`.
///
/// The summon element lists are recomputed from the selected summons before
/// writing. The document is pretty-printed with a 4-space indent.
///
/// # Returns
/// The settings exactly as written
pub fn save_settings(path: &Utf8Path, settings: &Settings, catalog: &SummonCatalog) -> Result<Settings> {
    let mut settings = settings.clone();
    settings.refresh_summon_elements(catalog);

    let json_string = to_pretty_json(&settings).context("Failed to serialize settings to JSON")?;

    fs::write(path, json_string).with_context(|| format!("Failed to write settings: {}", path))?;

    tracing::info!("Saved settings to {}", path);
    Ok(settings)
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buffer)?)
}
