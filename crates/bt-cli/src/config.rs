//! Configuration loading and management.

use std::path::{Path, PathBuf};

use bt_core::{EventWeight, RoundDecimals};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
///
/// Values are range-checked while deserializing, so a loaded `Config` is
/// always usable for agreement analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Decimal places timestamps are rounded to before comparison.
    pub round_decimals: RoundDecimals,
    /// Weight of each point-event instant in duration-weighted kappa.
    pub event_weight: EventWeight,
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // BT_ROUND_DECIMALS, BT_EVENT_WEIGHT
        figment = figment.merge(Env::prefixed("BT_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for bt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("bt"))
}
