//! Core configuration resource.
//!
//! Settings for the run loop, the input gate and per-kind pool tuning, loaded
//! from an INI file. Defaults allow a safe startup without any file.
//!
//! # Configuration File Format
//!
//! ```ini
//! [input]
//! listening = true
//!
//! [loop]
//! frame_rate = 60
//! max_frames = 600
//!
//! [pool.grunt]
//! initial_capacity = 4
//! expandable = true
//! ```
//!
//! Section and key names are case-insensitive. Every `[pool.<name>]` section
//! tunes the pool kind registered under `<name>`; see
//! [`PoolRegistryBuilder::tuned_by`](crate::resources::pool::PoolRegistryBuilder::tuned_by).

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// Default safe values for startup
const DEFAULT_LISTENING: bool = true;
const DEFAULT_FRAME_RATE: u32 = 60;
const DEFAULT_MAX_FRAMES: u64 = 600;
const DEFAULT_CONFIG_PATH: &str = "./skirmish.ini";
const POOL_SECTION_PREFIX: &str = "pool.";

/// Overrides for one pool kind. `None` keeps the value the kind was
/// registered with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolTuning {
    pub initial_capacity: Option<usize>,
    pub expandable: Option<bool>,
}

/// Core configuration resource.
#[derive(Resource, Debug, Clone)]
pub struct CoreConfig {
    /// Initial state of the input listening gate.
    pub listening: bool,
    /// Simulated frames per second; the fixed delta is `1 / frame_rate`.
    pub frame_rate: u32,
    /// Hard stop for headless runs.
    pub max_frames: u64,
    /// Pool overrides keyed by kind name (lowercase).
    pub pools: FxHashMap<String, PoolTuning>,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            listening: DEFAULT_LISTENING,
            frame_rate: DEFAULT_FRAME_RATE,
            max_frames: DEFAULT_MAX_FRAMES,
            pools: FxHashMap::default(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a configuration with a custom file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing keys keep their current values.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;
        self.apply(&config);
        info!(
            "Loaded config from {:?}: listening={}, frame_rate={}, max_frames={}, {} pool overrides",
            self.config_path,
            self.listening,
            self.frame_rate,
            self.max_frames,
            self.pools.len()
        );
        Ok(())
    }

    /// Load configuration from INI text.
    pub fn load_from_str(&mut self, text: &str) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .read(text.to_string())
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        self.apply(&config);
        Ok(())
    }

    fn apply(&mut self, config: &Ini) {
        // [input] section
        if let Some(listening) = config.getbool("input", "listening").ok().flatten() {
            self.listening = listening;
        }

        // [loop] section
        if let Some(rate) = config.getuint("loop", "frame_rate").ok().flatten() {
            self.frame_rate = u32::try_from(rate).unwrap_or(u32::MAX).max(1);
        }
        if let Some(frames) = config.getuint("loop", "max_frames").ok().flatten() {
            self.max_frames = frames;
        }

        // [pool.<name>] sections
        for section in config.sections() {
            let Some(kind) = section.strip_prefix(POOL_SECTION_PREFIX) else {
                continue;
            };
            let tuning = PoolTuning {
                initial_capacity: config
                    .getuint(&section, "initial_capacity")
                    .ok()
                    .flatten()
                    .map(|n| usize::try_from(n).unwrap_or(usize::MAX)),
                expandable: config.getbool(&section, "expandable").ok().flatten(),
            };
            self.pools.insert(kind.to_string(), tuning);
        }
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        // [input] section
        config.set("input", "listening", Some(self.listening.to_string()));

        // [loop] section
        config.set("loop", "frame_rate", Some(self.frame_rate.to_string()));
        config.set("loop", "max_frames", Some(self.max_frames.to_string()));

        let mut kinds: Vec<_> = self.pools.iter().collect();
        kinds.sort_by(|a, b| a.0.cmp(b.0));
        for (kind, tuning) in kinds {
            let section = format!("{POOL_SECTION_PREFIX}{kind}");
            if let Some(capacity) = tuning.initial_capacity {
                config.set(&section, "initial_capacity", Some(capacity.to_string()));
            }
            if let Some(expandable) = tuning.expandable {
                config.set(&section, "expandable", Some(expandable.to_string()));
            }
        }

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }

    /// Overrides for the pool kind `name`, if the file had a section for it.
    pub fn pool_tuning(&self, name: &str) -> Option<&PoolTuning> {
        self.pools.get(&name.to_ascii_lowercase())
    }

    pub fn set_pool_tuning(&mut self, name: &str, tuning: PoolTuning) {
        self.pools.insert(name.to_ascii_lowercase(), tuning);
    }

    /// Fixed simulation step in seconds.
    pub fn frame_delta(&self) -> f32 {
        1.0 / self.frame_rate.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = CoreConfig::new();
        assert!(config.listening);
        assert_eq!(config.frame_rate, DEFAULT_FRAME_RATE);
        assert_eq!(config.max_frames, DEFAULT_MAX_FRAMES);
        assert!(config.pools.is_empty());
        assert!((config.frame_delta() - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn parses_sections_and_pool_overrides() {
        let mut config = CoreConfig::new();
        config
            .load_from_str(
                "[input]\nlistening = false\n\n[loop]\nframe_rate = 30\nmax_frames = 90\n\n\
                 [pool.Grunt]\ninitial_capacity = 4\nexpandable = false\n\n[pool.brute]\nexpandable = true\n",
            )
            .unwrap();
        assert!(!config.listening);
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.max_frames, 90);
        assert_eq!(
            config.pool_tuning("grunt"),
            Some(&PoolTuning {
                initial_capacity: Some(4),
                expandable: Some(false),
            })
        );
        assert_eq!(
            config.pool_tuning("Brute"),
            Some(&PoolTuning {
                initial_capacity: None,
                expandable: Some(true),
            })
        );
        assert_eq!(config.pool_tuning("ghost"), None);
    }

    #[test]
    fn missing_keys_keep_defaults() {
        let mut config = CoreConfig::new();
        config.load_from_str("[loop]\nmax_frames = 5\n").unwrap();
        assert_eq!(config.max_frames, 5);
        assert_eq!(config.frame_rate, DEFAULT_FRAME_RATE);
        assert!(config.listening);
    }

    #[test]
    fn zero_frame_rate_is_clamped() {
        let mut config = CoreConfig::new();
        config.load_from_str("[loop]\nframe_rate = 0\n").unwrap();
        assert_eq!(config.frame_rate, 1);
    }

    #[test]
    fn oversized_frame_rate_saturates() {
        let mut config = CoreConfig::new();
        config
            .load_from_str("[loop]\nframe_rate = 4294967301\n")
            .unwrap();
        assert_eq!(config.frame_rate, u32::MAX);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut config = CoreConfig::with_path("./definitely/not/here.ini");
        assert!(config.load_from_file().is_err());
        assert!(config.listening);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skirmish.ini");

        let mut config = CoreConfig::with_path(&path);
        config.listening = false;
        config.max_frames = 42;
        config.set_pool_tuning(
            "grunt",
            PoolTuning {
                initial_capacity: Some(3),
                expandable: Some(false),
            },
        );
        config.save_to_file().unwrap();

        let mut loaded = CoreConfig::with_path(&path);
        loaded.load_from_file().unwrap();
        assert!(!loaded.listening);
        assert_eq!(loaded.max_frames, 42);
        assert_eq!(loaded.pool_tuning("grunt"), config.pool_tuning("grunt"));
    }
}
