//! Configuration loading, env substitution and validation.
//!
//! Config files: `courier.toml`, `courier.yaml`, `courier.yml` or `courier.json`,
//! searched in `./` then the user config directory (`~/.config/courier/` on Linux).
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config,
    },
    schema::{ChatConfig, CourierConfig, GeminiConfig, TelegramConfig},
    validate::{Diagnostic, Severity, ValidationResult, check_config, validate},
};
