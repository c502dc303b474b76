// Settings loading for shiftindicator
//
// The settings file is looked up, in order, at:
// - an explicit path given on the command line
// - $XDG_CONFIG_HOME/shiftindicator.json, or the platform config directory
// - the current working directory
// - the directory holding the executable

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{ShiftIndicatorError, shiftpoints::ShiftpointTable};

pub const CONFIG_FILE_NAME: &str = "shiftindicator.json";

const DEFAULT_VOLUME: f32 = 1.;
const DEFAULT_SOUND: &str = "beep.wav";
const DEFAULT_MIN_TIME_BETWEEN_BEEPS_MS: u64 = 500;
const DEFAULT_CLUTCH_ENGAGEMENT_FLOOR: f32 = 0.5;
const DEFAULT_POLL_INTERVAL_MS: u64 = 16;
const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Playback volume, 0.0 to 1.0
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Alert sound file
    #[serde(default = "default_sound")]
    pub sound: String,
    /// Minimum time between two alerts
    #[serde(default = "default_min_time_between_beeps_ms")]
    pub min_time_between_beeps_ms: u64,
    /// Alerts are suppressed while clutch engagement is below this value
    #[serde(default = "default_clutch_engagement_floor")]
    pub clutch_engagement_floor: f32,
    /// Minimum duration of one poll cycle
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Wait between reconnection attempts
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Required, there is nothing to advise without it
    pub shiftpoints: ShiftpointTable,
}

fn default_volume() -> f32 {
    DEFAULT_VOLUME
}

fn default_sound() -> String {
    DEFAULT_SOUND.to_string()
}

fn default_min_time_between_beeps_ms() -> u64 {
    DEFAULT_MIN_TIME_BETWEEN_BEEPS_MS
}

fn default_clutch_engagement_floor() -> f32 {
    DEFAULT_CLUTCH_ENGAGEMENT_FLOOR
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

/// Settings together with the file they were read from.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub path: PathBuf,
}

impl Settings {
    pub fn min_time_between_beeps(&self) -> Duration {
        Duration::from_millis(self.min_time_between_beeps_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Locate and load the settings file. An explicit path wins over the search path.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedSettings, ShiftIndicatorError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => find_config_file(&search_path())?,
        };
        let settings = Self::from_file(&path)?;
        Ok(LoadedSettings { settings, path })
    }

    pub fn from_file(path: &Path) -> Result<Self, ShiftIndicatorError> {
        debug!("Reading settings from {}", path.display());
        let contents =
            fs::read_to_string(path).map_err(|e| ShiftIndicatorError::ConfigIOError {
                path: path.to_path_buf(),
                source: e,
            })?;
        let settings: Settings =
            serde_json::from_str(&contents).map_err(|e| ShiftIndicatorError::ConfigParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ShiftIndicatorError> {
        if !(0. ..=1.).contains(&self.volume) {
            return Err(ShiftIndicatorError::InvalidConfig {
                field: "volume".to_string(),
                reason: format!("{} is outside 0.0 - 1.0", self.volume),
            });
        }
        if !(0. ..=1.).contains(&self.clutch_engagement_floor) {
            return Err(ShiftIndicatorError::InvalidConfig {
                field: "clutch_engagement_floor".to_string(),
                reason: format!("{} is outside 0.0 - 1.0", self.clutch_engagement_floor),
            });
        }
        if self.sound.trim().is_empty() {
            return Err(ShiftIndicatorError::InvalidConfig {
                field: "sound".to_string(),
                reason: "sound file cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve the alert sound: absolute paths as-is, otherwise next to the settings
    /// file, otherwise next to the executable.
    pub fn sound_path(&self, settings_path: &Path) -> Result<PathBuf, ShiftIndicatorError> {
        let sound = Path::new(&self.sound);
        let mut candidates = Vec::new();
        if sound.is_absolute() {
            candidates.push(sound.to_path_buf());
        } else {
            if let Some(dir) = settings_path.parent() {
                candidates.push(dir.join(sound));
            }
            if let Some(dir) = binary_dir() {
                candidates.push(dir.join(sound));
            }
        }

        candidates
            .into_iter()
            .find(|path| path.is_file())
            .ok_or(ShiftIndicatorError::SoundNotFound {
                sound: self.sound.clone(),
            })
    }
}

fn binary_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Candidate settings file locations, most specific first.
pub fn search_path() -> Vec<PathBuf> {
    let config_dir = env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir);

    let mut paths = Vec::new();
    if let Some(dir) = config_dir {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Ok(cwd) = env::current_dir() {
        paths.push(cwd.join(CONFIG_FILE_NAME));
    }
    if let Some(dir) = binary_dir() {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    paths
}

pub fn find_config_file(candidates: &[PathBuf]) -> Result<PathBuf, ShiftIndicatorError> {
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| ShiftIndicatorError::NoConfigFile {
            searched: candidates
                .iter()
                .map(|path| path.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shiftpoints::Resolution;
    use tempfile::TempDir;

    fn write_settings(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_full_settings() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(
            &dir,
            r#"{
                "volume": 0.4,
                "sound": "beep.wav",
                "min_time_between_beeps_ms": 250,
                "clutch_engagement_floor": 0.8,
                "shiftpoints": {"gt3rs": [6500, 7000, 7200, 7200], "kart1": [9000]}
            }"#,
        );

        let loaded = Settings::load(Some(&path)).unwrap();
        assert_eq!(loaded.path, path);
        let settings = loaded.settings;
        assert_eq!(settings.volume, 0.4);
        assert_eq!(settings.min_time_between_beeps(), Duration::from_millis(250));
        assert_eq!(settings.clutch_engagement_floor, 0.8);
        assert_eq!(
            settings.poll_interval(),
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );
        assert_eq!(settings.shiftpoints.resolve("gt3rs", 3).rpm, 7200.);
    }

    #[test]
    fn test_empty_shiftpoint_list_is_not_a_load_error() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, r#"{"shiftpoints": {"broken": []}}"#);

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(
            settings.shiftpoints.resolve("broken", 2).resolution,
            Resolution::NoShiftpoints
        );
    }

    #[test]
    fn test_malformed_settings() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, r#"{"shiftpoints": {"gt3rs": "fast"}}"#);

        assert!(matches!(
            Settings::from_file(&path),
            Err(ShiftIndicatorError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn test_missing_shiftpoints_is_fatal() {
        let dir = TempDir::new().unwrap();
        for contents in ["{}", r#"{"volume": 0.5, "shiftpoint": {"gt3rs": [7000]}}"#] {
            let path = write_settings(&dir, contents);
            match Settings::from_file(&path) {
                Err(ShiftIndicatorError::ConfigParseError { source, .. }) => {
                    assert!(source.to_string().contains("missing field `shiftpoints`"))
                }
                other => panic!("unexpected result for {}: {:?}", contents, other),
            }
        }
    }

    #[test]
    fn test_defaults_fill_everything_but_shiftpoints() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, r#"{"shiftpoints": {}}"#);

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.volume, DEFAULT_VOLUME);
        assert_eq!(settings.sound, DEFAULT_SOUND);
        assert_eq!(settings.reconnect_delay(), Duration::from_millis(1000));
        assert!(settings.shiftpoints.is_empty());
    }

    #[test]
    fn test_volume_out_of_range() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, r#"{"volume": 1.5, "shiftpoints": {}}"#);

        match Settings::from_file(&path) {
            Err(ShiftIndicatorError::InvalidConfig { field, .. }) => assert_eq!(field, "volume"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Settings::from_file(&dir.path().join("nope.json")),
            Err(ShiftIndicatorError::ConfigIOError { .. })
        ));
    }

    #[test]
    fn test_find_config_file_in_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let found = write_settings(&second, "{}");

        let candidates = vec![
            first.path().join(CONFIG_FILE_NAME),
            found.clone(),
            first.path().join("other.json"),
        ];
        assert_eq!(find_config_file(&candidates).unwrap(), found);

        match find_config_file(&candidates[..1]) {
            Err(ShiftIndicatorError::NoConfigFile { searched }) => {
                assert!(searched.contains(CONFIG_FILE_NAME))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_sound_next_to_settings_file() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, r#"{"sound": "ding.wav", "shiftpoints": {"kart1": [9000]}}"#);
        fs::write(dir.path().join("ding.wav"), b"RIFF").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.sound_path(&path).unwrap(), dir.path().join("ding.wav"));
    }

    #[test]
    fn test_sound_missing() {
        let dir = TempDir::new().unwrap();
        let path = write_settings(&dir, r#"{"sound": "missing-alert.wav", "shiftpoints": {}}"#);

        let settings = Settings::from_file(&path).unwrap();
        assert!(matches!(
            settings.sound_path(&path),
            Err(ShiftIndicatorError::SoundNotFound { .. })
        ));
    }
}
