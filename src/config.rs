use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use infra_console_core::announcer::AnnouncerConfig;
use infra_console_core::grid::GridConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub announcer: AnnouncerSection,
    #[serde(default)]
    pub grid: GridSection,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

/// Live-region timing, in milliseconds.
#[derive(Debug, Deserialize, Clone)]
pub struct AnnouncerSection {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_min_gap_ms")]
    pub min_gap_ms: u64,
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
}

impl Default for AnnouncerSection {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            min_gap_ms: default_min_gap_ms(),
            dedup_window_ms: default_dedup_window_ms(),
        }
    }
}

fn default_delay_ms() -> u64 {
    100
}
fn default_min_gap_ms() -> u64 {
    150
}
fn default_dedup_window_ms() -> u64 {
    1000
}

impl AnnouncerSection {
    pub fn to_announcer_config(&self) -> AnnouncerConfig {
        AnnouncerConfig {
            delay: Duration::from_millis(self.delay_ms),
            min_gap: Duration::from_millis(self.min_gap_ms),
            dedup_window: Duration::from_millis(self.dedup_window_ms),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GridSection {
    #[serde(default = "default_multi_select")]
    pub multi_select: bool,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            multi_select: default_multi_select(),
        }
    }
}

fn default_multi_select() -> bool {
    true
}

impl GridSection {
    pub fn to_grid_config(&self) -> GridConfig {
        GridConfig {
            multi_select: self.multi_select,
        }
    }
}

const MAX_ANNOUNCER_DELAY_MS: u64 = 10_000;

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    if config.announcer.delay_ms > MAX_ANNOUNCER_DELAY_MS {
        anyhow::bail!(
            "announcer.delay_ms must be <= {}",
            MAX_ANNOUNCER_DELAY_MS
        );
    }
    if config.announcer.min_gap_ms > MAX_ANNOUNCER_DELAY_MS {
        anyhow::bail!(
            "announcer.min_gap_ms must be <= {}",
            MAX_ANNOUNCER_DELAY_MS
        );
    }
    if config.announcer.dedup_window_ms == 0 {
        anyhow::bail!("announcer.dedup_window_ms must be > 0");
    }

    tracing::debug!(path = %path.display(), db = %config.db.path.display(), "config loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(body.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_defaults_for_optional_sections() {
        let f = write_config("[db]\npath = \"inv.sqlite\"\n\n[server]\n");
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7340");
        assert_eq!(config.announcer.delay_ms, 100);
        assert!(config.grid.multi_select);
        assert_eq!(
            config.announcer.to_announcer_config(),
            AnnouncerConfig::default()
        );
    }

    #[test]
    fn test_rejects_zero_dedup_window() {
        let f = write_config(
            "[db]\npath = \"x\"\n[server]\nbind = \"127.0.0.1:1\"\n[announcer]\ndedup_window_ms = 0\n",
        );
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("dedup_window_ms"));
    }

    #[test]
    fn test_rejects_blank_bind_and_long_delay() {
        let f = write_config("[db]\npath = \"x\"\n[server]\nbind = \"  \"\n");
        assert!(load_config(f.path()).is_err());
        let f = write_config("[db]\npath = \"x\"\n[server]\n[announcer]\ndelay_ms = 20000\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("delay_ms"));
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = load_config(Path::new("/nonexistent/invctl.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
