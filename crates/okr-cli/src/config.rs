use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use okr_core::TrackingWindow;

/// On-disk configuration (`config.toml` in the XDG config dir).
#[derive(Debug, Serialize, Deserialize)]
pub struct OkrConfig {
    pub tracking: TrackingSection,
    #[serde(default)]
    pub storage: StorageSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackingSection {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StorageSection {
    /// Directory the snapshot lives in; defaults to the XDG data dir.
    pub data_dir: Option<String>,
}

impl Default for OkrConfig {
    fn default() -> Self {
        let window = TrackingWindow::default();
        Self {
            tracking: TrackingSection {
                start: window.start,
                end: window.end,
            },
            storage: StorageSection::default(),
        }
    }
}

/// The tracking window, with env overrides taking precedence over the
/// config file: `OKR_START_MONTH` / `OKR_END_MONTH`.
pub fn resolve_window(config: &OkrConfig) -> anyhow::Result<TrackingWindow> {
    let start = env_nonempty("OKR_START_MONTH").unwrap_or_else(|| config.tracking.start.clone());
    let end = env_nonempty("OKR_END_MONTH").unwrap_or_else(|| config.tracking.end.clone());
    TrackingWindow::new(start, end).map_err(|e| anyhow::anyhow!("{}", e))
}

/// The snapshot directory: the `--data-dir` flag (which also carries the
/// `OKR_DATA_DIR` env), then the config file, then the XDG data dir.
pub fn resolve_data_dir(config: &OkrConfig, cli_override: Option<&str>) -> anyhow::Result<PathBuf> {
    if let Some(value) = cli_override {
        return Ok(PathBuf::from(value));
    }
    if let Some(ref value) = config.storage.data_dir {
        return Ok(PathBuf::from(value));
    }
    xdg_data_dir()
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn read_config(path: &Path) -> anyhow::Result<OkrConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &OkrConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

/// Read the config file if present, falling back to defaults.
pub fn load_or_default() -> anyhow::Result<OkrConfig> {
    let path = default_config_path()?;
    if path.exists() {
        read_config(&path)
    } else {
        Ok(OkrConfig::default())
    }
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Some(value) = env_nonempty("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(value).join("okr"));
    }
    Ok(home_dir()?.join(".config").join("okr"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Some(value) = env_nonempty("XDG_DATA_HOME") {
        return Ok(PathBuf::from(value).join("okr"));
    }
    Ok(home_dir()?.join(".local").join("share").join("okr"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

fn env_nonempty(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
