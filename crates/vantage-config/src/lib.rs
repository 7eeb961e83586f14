//! Configuration system for Vantage.
//!
//! Provides TOML-based configuration with:
//! - Named profiles (`development`, `production`) supplying defaults
//! - `[cache]` settings for the upstream response cache
//! - `[session]` settings for the session lifetime monitor
//! - Config file layering (user config dir + project-local overrides)
//! - `VANTAGE_PROFILE` environment override

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
