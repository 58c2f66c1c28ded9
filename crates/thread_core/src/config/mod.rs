//! CLI configuration: a small JSON file plus `--config-override` values.
//!
//! A missing file means defaults. A broken file also means defaults, with the
//! error kept in [`ConfigLoad`] so the caller can warn about it.

use crate::error::AppError;
use crate::paths::app_file;
use crate::scheduler::{DEFAULT_TICK_INTERVAL, DedupPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "STRONGTHREAD_CONFIG_PATH";
const MIN_POLL_INTERVAL_SECS: u64 = 5;
const RESET: &str = "\x1b[0m";

/// ANSI colours for CLI output. `None` leaves text unstyled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Palette {
    pub accent: Option<&'static str>,
    pub muted: Option<&'static str>,
    pub alert: Option<&'static str>,
}

impl Palette {
    pub const PLAIN: Palette = Palette {
        accent: None,
        muted: None,
        alert: None,
    };

    pub fn accentize(&self, text: &str) -> String {
        paint(self.accent, text)
    }

    pub fn mutedize(&self, text: &str) -> String {
        paint(self.muted, text)
    }

    pub fn alertize(&self, text: &str) -> String {
        paint(self.alert, text)
    }
}

fn paint(colour: Option<&str>, text: &str) -> String {
    match colour {
        Some(code) => format!("{code}{text}{RESET}"),
        None => text.to_string(),
    }
}

/// Unknown theme names render plain.
pub fn palette_for_theme(theme: Option<&str>) -> Palette {
    let Some(theme) = theme else {
        return Palette::PLAIN;
    };
    match canonical_theme_name(theme).as_str() {
        "dark" => Palette {
            accent: Some("\x1b[38;5;214m"),
            muted: Some("\x1b[38;5;245m"),
            alert: Some("\x1b[38;5;203m"),
        },
        "light" => Palette {
            accent: Some("\x1b[38;5;25m"),
            muted: Some("\x1b[38;5;242m"),
            alert: Some("\x1b[38;5;160m"),
        },
        _ => Palette::PLAIN,
    }
}

/// Lower-cases `raw`, joins its alphanumeric runs with `_` and folds known
/// aliases onto `plain`, `dark` and `light`. Other names pass through.
pub fn canonical_theme_name(raw: &str) -> String {
    let cleaned = raw
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("_");

    let alias = match cleaned.as_str() {
        "" | "default" | "none" | "plain" => "plain",
        "dark" | "dark_mode" | "darkmode" | "night" => "dark",
        "light" | "light_mode" | "lightmode" | "day" => "light",
        _ => return cleaned,
    };
    alias.to_string()
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub dedup_policy: Option<DedupPolicy>,
}

impl Config {
    /// Poller period, never shorter than five seconds.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_secs
            .map(|secs| Duration::from_secs(secs.max(MIN_POLL_INTERVAL_SECS)))
            .unwrap_or(DEFAULT_TICK_INTERVAL)
    }

    pub fn dedup_policy(&self) -> DedupPolicy {
        self.dedup_policy.unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

impl ConfigLoad {
    fn defaults(error: Option<AppError>) -> Self {
        Self {
            config: Config::default(),
            error,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub theme: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub dedup_policy: Option<DedupPolicy>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    app_file(CONFIG_ENV_VAR, CONFIG_FILE_NAME)
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad::defaults(Some(err)),
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad::defaults(None);
    }
    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad::defaults(Some(err)),
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let mut config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    config.theme = config.theme.as_deref().map(canonical_theme_name);
    Ok(config)
}

/// Applies every set override on top of `base`.
pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    Config {
        theme: overrides
            .theme
            .as_deref()
            .map(canonical_theme_name)
            .or_else(|| base.theme.clone()),
        poll_interval_secs: overrides.poll_interval_secs.or(base.poll_interval_secs),
        dedup_policy: overrides.dedup_policy.or(base.dedup_policy),
    }
}
