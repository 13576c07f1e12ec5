use emcee_core::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Relative resource keys are looked up under this directory.
    pub samples_root: PathBuf,
    /// Seconds; grown to fit imported clips.
    pub default_project_duration: f64,
    /// 0-100
    pub master_volume: f32,
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            samples_root: PathBuf::from("audio"),
            default_project_duration: 60.0,
            master_volume: 100.0,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("emcee").join("config.toml"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("ignoring malformed {}: {err}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            return;
        };
        self.save_to(&path);
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        if let Ok(contents) = toml::to_string_pretty(self) {
            if let Err(err) = fs::write(path, contents) {
                log::warn!("could not write {}: {err}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emcee_core::{EndOfTimeline, IntervalBounds};
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().expect("tempdir");
        assert_eq!(Config::load_from(&dir.path().join("nope.toml")), Config::default());
    }

    #[test]
    fn test_nested_scheduler_section() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
master_volume = 80.0

[scheduler]
end_of_timeline = "hold"
boundary = "inclusive"
"#,
        )
        .expect("write");

        let config = Config::load_from(&path);
        assert_eq!(config.master_volume, 80.0);
        assert_eq!(config.scheduler.end_of_timeline, EndOfTimeline::Hold);
        assert_eq!(config.scheduler.boundary, IntervalBounds::Inclusive);
        assert_eq!(config.scheduler.tick_interval_ms, 50);
        assert_eq!(config.samples_root, PathBuf::from("audio"));
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "master_volume = \"loud\"").expect("write");

        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_save_round_trips() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            default_project_duration: 90.0,
            ..Default::default()
        };

        config.save_to(&path);
        assert_eq!(Config::load_from(&path), config);
    }
}
