//! User preferences shared by every pipeline invocation in the process.

use std::{fs, path::Path};

use anyhow::Result;
use parking_lot::{const_rwlock, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

static PREFERENCES: RwLock<Preferences> = const_rwlock(Preferences::DEFAULT);

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Preferences {
    /// Search depth new pipeline options start from.
    pub default_search_depth: f32,
    /// Keep cutting planes around (hidden) instead of deleting them after use.
    pub keep_intermediates: bool,
}

/// Snapshot of the current process-wide preferences.
pub fn preferences() -> Preferences {
    PREFERENCES.read().clone()
}

pub fn set_preferences(preferences: Preferences) {
    *PREFERENCES.write() = preferences;
}

pub fn set_keep_intermediates(keep: bool) {
    PREFERENCES.write().keep_intermediates = keep;
}

impl Preferences {
    const DEFAULT: Self = Self {
        default_search_depth: 30.0,
        keep_intermediates: false,
    };

    pub fn load_or_default(config_dir: &Path) -> Self {
        match Self::load(config_dir) {
            Ok(preferences) => preferences,
            Err(err) => {
                warn!("Failed to load preferences, using defaults: {}", err);
                Self::default()
            }
        }
    }

    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_file = config_dir.join("config.toml");
        Ok(if config_file.exists() {
            let file = fs::read(&config_file)?;
            let string = String::from_utf8_lossy(&file);
            let preferences = toml::from_str(&string)?;
            info!("Successfully loaded preferences");
            preferences
        } else {
            info!("No preferences file found, using defaults");
            Self::default()
        })
    }

    pub fn save(&self, config_dir: &Path) -> Result<()> {
        fs::create_dir_all(config_dir)?;

        let config_file = config_dir.join("config.toml");
        let string = toml::to_string(self)?;
        fs::write(config_file, string)?;
        Ok(())
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use std::{env, process};

    use super::*;

    #[test]
    fn save_then_load() {
        let dir = env::temp_dir().join(format!("mold-preferences-{}", process::id()));
        let preferences = Preferences {
            default_search_depth: 7.5,
            keep_intermediates: true,
        };

        preferences.save(&dir).unwrap();
        let loaded = Preferences::load(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(loaded, preferences);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = env::temp_dir().join("mold-preferences-does-not-exist");
        assert_eq!(Preferences::load_or_default(&dir), Preferences::default());
    }

    #[test]
    fn malformed_file_falls_back() {
        let dir = env::temp_dir().join(format!("mold-preferences-bad-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "keep_intermediates = \"maybe\"").unwrap();

        let loaded = Preferences::load_or_default(&dir);
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(loaded, Preferences::default());
    }
}
