//! Configuration management.
//!
//! TOML settings split into sections (paths, logging, audio, mix, encode,
//! fetch, volume). Missing keys fall back to defaults, values are validated
//! on load, and writes are atomic.
//!
//! # Example
//!
//! ```no_run
//! use reelmix_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(".config/reelmix.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Output folder: {}", config.settings().paths.output_folder);
//!
//! config.settings_mut().encode.crf = 18;
//! config.update_section(ConfigSection::Encode).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    AudioSettings, ConfigSection, EncodeSettings, FetchSettings, LoggingSettings, MixSettings,
    PathSettings, Settings,
};
