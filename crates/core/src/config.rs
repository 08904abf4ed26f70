//! `engram.toml` — on-disk configuration for a data directory.
//!
//! Replaces a scatter of hardcoded constants with a single config file,
//! written with defaults on first use and read (never re-read mid-run)
//! by every component. Same model as the reference database's
//! `strata.toml`: edit the file, restart.

use crate::error::{EngramError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "engram.toml";

fn default_half_life_hours() -> f64 {
    168.0
}

fn default_keep_ratio() -> f64 {
    0.15
}

fn default_promotion_strength() -> f64 {
    1.5
}

fn default_mirror_window_days() -> u32 {
    14
}

fn default_embedding_dim() -> usize {
    384
}

fn default_boot_context() -> Vec<String> {
    [
        "MEMORY.md",
        "SOUL.md",
        "USER.md",
        "IDENTITY.md",
        "TOOLS.md",
        "AGENTS.md",
        "HEARTBEAT.md",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Configuration loaded from `engram.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngramConfig {
    /// Energy decay half-life, in hours (default: one week).
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
    /// Fraction of DCT coefficients retained along the chunk axis.
    #[serde(default = "default_keep_ratio")]
    pub keep_ratio: f64,
    /// Gain applied per unit of energy when weighting rows before DCT.
    #[serde(default = "default_promotion_strength")]
    pub promotion_strength: f64,
    /// Mirror Analyzer lookback window, in days.
    #[serde(default = "default_mirror_window_days")]
    pub mirror_window_days: u32,
    /// Embedding dimension used by the reference vector store.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    /// Files excluded from Mirror promotion candidates because they are
    /// already loaded at session start.
    #[serde(default = "default_boot_context")]
    pub boot_context: Vec<String>,
}

impl Default for EngramConfig {
    fn default() -> Self {
        EngramConfig {
            half_life_hours: default_half_life_hours(),
            keep_ratio: default_keep_ratio(),
            promotion_strength: default_promotion_strength(),
            mirror_window_days: default_mirror_window_days(),
            embedding_dim: default_embedding_dim(),
            boot_context: default_boot_context(),
        }
    }
}

impl EngramConfig {
    /// Returns the default config file content with explanatory comments.
    pub fn default_toml() -> &'static str {
        r#"# Engram configuration
#
# Energy decay half-life, in hours. An access from one half-life ago
# carries half the weight of an access right now. Default: 168 (1 week).
half_life_hours = 168.0

# Fraction of DCT coefficients retained along the chunk axis during
# reconsolidation. Lower = more aggressive compression.
keep_ratio = 0.15

# Gain applied per unit of normalized access energy when weighting rows
# before the forward DCT. 0 disables promotion entirely.
promotion_strength = 1.5

# Mirror Analyzer lookback window, in days.
mirror_window_days = 14

# Embedding dimension used by the reference vector store.
embedding_dim = 384

# Files excluded from Mirror promotion candidates because they are
# already loaded at session start.
boot_context = ["MEMORY.md", "SOUL.md", "USER.md", "IDENTITY.md", "TOOLS.md", "AGENTS.md", "HEARTBEAT.md"]
"#
    }

    /// Read and parse config from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngramConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from `path` if it exists, else return defaults
    /// without touching the filesystem.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to `path`.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(EngramError::from)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_spec_literals() {
        let cfg = EngramConfig::default();
        assert_eq!(cfg.half_life_hours, 168.0);
        assert_eq!(cfg.keep_ratio, 0.15);
        assert_eq!(cfg.promotion_strength, 1.5);
        assert_eq!(cfg.mirror_window_days, 14);
        assert_eq!(cfg.embedding_dim, 384);
        assert_eq!(cfg.boot_context.len(), 7);
    }

    #[test]
    fn default_toml_round_trips() {
        let parsed: EngramConfig = toml::from_str(EngramConfig::default_toml()).unwrap();
        assert_eq!(parsed, EngramConfig::default());
    }

    #[test]
    fn write_default_if_missing_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        EngramConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        let loaded = EngramConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded, EngramConfig::default());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "keep_ratio = 0.34\n").unwrap();
        let cfg = EngramConfig::from_file(&path).unwrap();
        assert_eq!(cfg.keep_ratio, 0.34);
        assert_eq!(cfg.half_life_hours, 168.0);
    }
}
