//! # weft-settings
//!
//! Layered configuration for weft clients.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ClientSettings::default()`]
//! 2. **User file**: `~/.weft/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `WEFT_*` overrides (highest priority)
//!
//! ```no_run
//! let settings = weft_settings::load_settings().unwrap_or_default();
//! println!("endpoint: {}", settings.connection.endpoint);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path,
    load_settings_with_env, settings_path,
};
pub use types::*;
