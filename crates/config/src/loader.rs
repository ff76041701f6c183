use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::CourierConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "courier.toml",
    "courier.yaml",
    "courier.yml",
    "courier.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<CourierConfig> {
    let raw = read_substituted(path)?;
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./courier.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/courier/courier.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `CourierConfig::default()` if no config file is found or it
/// fails to load.
pub fn discover_and_load() -> CourierConfig {
    let mut config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                CourierConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        CourierConfig::default()
    };
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/courier/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}

/// Apply `TELEGRAM_BOT_TOKEN`, `GEMINI_API_KEY`, `GEMINI_MODEL` and
/// `GEMINI_VISION_MODEL` from the process environment.
pub fn apply_env_overrides(config: &mut CourierConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

pub(crate) fn apply_env_overrides_with(
    config: &mut CourierConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = non_blank("TELEGRAM_BOT_TOKEN") {
        config.telegram.token = Some(Secret::new(token));
    }
    if let Some(key) = non_blank("GEMINI_API_KEY") {
        config.gemini.api_key = Some(Secret::new(key));
    }
    if let Some(model) = non_blank("GEMINI_MODEL") {
        config.gemini.model = model;
    }
    if let Some(model) = non_blank("GEMINI_VISION_MODEL") {
        config.gemini.vision_model = model;
    }
}

fn read_substituted(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(substitute_env(&raw))
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

fn parse_config(raw: &str, path: &Path) -> Result<CourierConfig> {
    match extension(path) {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        ext => Err(Error::UnsupportedFormat { ext: ext.into() }),
    }
}

/// Parse any supported format into a generic JSON value.
pub(crate) fn parse_config_value(raw: &str, path: &Path) -> Result<serde_json::Value> {
    match extension(path) {
        "toml" => {
            let v: toml::Value = toml::from_str(raw).map_err(|e| Error::parse(path, e))?;
            serde_json::to_value(v).map_err(|e| Error::parse(path, e))
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value =
                serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e))?;
            serde_json::to_value(v).map_err(|e| Error::parse(path, e))
        },
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        ext => Err(Error::UnsupportedFormat { ext: ext.into() }),
    }
}
