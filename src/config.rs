use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};

use crate::inventory::ItemCategory;

/// Overrides the save file location.
pub const SAVE_FILE_ENV: &str = "MYTHIPET_SAVE_FILE";

/// How long each action keeps the session busy, in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusyDurations {
    pub direct_action_ms: u64,
    pub food_item_ms: u64,
    pub other_item_ms: u64,
}

impl Default for BusyDurations {
    fn default() -> Self {
        Self {
            direct_action_ms: 4000,
            food_item_ms: 4000,
            other_item_ms: 5000,
        }
    }
}

impl BusyDurations {
    pub fn direct_action(&self) -> Duration {
        Duration::from_millis(self.direct_action_ms)
    }

    pub fn item(&self, category: ItemCategory) -> Duration {
        match category {
            ItemCategory::Food => Duration::from_millis(self.food_item_ms),
            _ => Duration::from_millis(self.other_item_ms),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_filter: String,
    pub busy: BusyDurations,
    pub game_over_grace_ms: u64,
    pub decay_time_scale: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "mythipet=info".to_string(),
            busy: BusyDurations::default(),
            game_over_grace_ms: 300,
            decay_time_scale: 1.0,
        }
    }
}

impl Settings {
    pub fn game_over_grace(&self) -> Duration {
        Duration::from_millis(self.game_over_grace_ms)
    }
}

pub struct Paths {
    pub save_path: PathBuf,
    pub settings_path: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "mythipet", "Mythipet")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    if let Err(e) = fs::create_dir_all(&dir) {
        warn!(dir = %dir.display(), error = %e, "could not create data directory");
    }
    let save_path = match std::env::var_os(SAVE_FILE_ENV) {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => dir.join("savefile.json"),
    };
    Ok(Paths {
        save_path,
        settings_path: dir.join("settings.json"),
    })
}

pub fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        match serde_json::from_str::<Settings>(&s) {
            Ok(v) => return v,
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable settings"),
        }
    }
    debug!(path = %path.display(), "using default settings");
    Settings::default()
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let data = serde_json::to_vec_pretty(s)?;
    write_atomic(path, &data)
        .with_context(|| format!("writing settings to {}", path.display()))?;
    Ok(())
}

/// Writes `data` beside `path` and renames it into place, so a crash mid-write leaves
/// the previous file intact.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    // rename-over-existing is atomic on the same filesystem on Unix; Windows needs the
    // target gone first.
    if cfg!(windows) && path.exists() {
        let _ = fs::remove_file(path);
    }
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mythipet_config_{}_{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_or_broken_settings_fall_back_to_defaults() {
        let dir = test_dir("fallback");
        let path = dir.join("settings.json");
        assert_eq!(load_settings(&path), Settings::default());

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings(&path), Settings::default());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let dir = test_dir("partial");
        let path = dir.join("settings.json");
        fs::write(&path, r#"{"game_over_grace_ms": 50, "busy": {"food_item_ms": 10}}"#).unwrap();

        let s = load_settings(&path);
        assert_eq!(s.game_over_grace(), Duration::from_millis(50));
        assert_eq!(s.busy.item(ItemCategory::Food), Duration::from_millis(10));
        assert_eq!(s.busy.item(ItemCategory::Gift), Duration::from_millis(5000));
        assert_eq!(s.busy.direct_action(), Duration::from_millis(4000));
        assert_eq!(s.log_filter, "mythipet=info");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn settings_round_trip_atomically() {
        let dir = test_dir("round_trip");
        let path = dir.join("nested").join("settings.json");
        let mut s = Settings::default();
        s.decay_time_scale = 0.25;

        save_settings_atomic(&path, &s).unwrap();
        assert_eq!(load_settings(&path), s);
        assert!(!path.with_extension("json.tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }
}
