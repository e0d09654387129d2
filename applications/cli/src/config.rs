//! CLI configuration

use anyhow::Context;
use cadence_playback::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// Player, queue and cache settings
    pub player: PlayerConfig,

    /// Keep cached content on disk here instead of in memory
    pub cache_dir: Option<PathBuf>,

    /// Progress report interval of the virtual output, in milliseconds
    pub tick_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            player: PlayerConfig::default(),
            cache_dir: None,
            tick_ms: 1000,
        }
    }
}

impl CliConfig {
    /// Load from `path` (or `cadence.toml` if present), then `CADENCE_*` variables
    ///
    /// Nested keys use `__`, e.g. `CADENCE_PLAYER__VOLUME=0.5`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from("cadence.toml");
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CADENCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.player
            .validate()
            .map_err(|msg| anyhow::anyhow!("player: {msg}"))?;
        if self.tick_ms == 0 {
            anyhow::bail!("tick_ms must be greater than 0");
        }
        Ok(())
    }
}
