pub mod producer;
pub mod replay;

pub use producer::TelemetrySource;
#[cfg(windows)]
pub use producer::IRacingTelemetrySource;
pub use replay::ReplayTelemetrySource;

use serde::{Deserialize, Serialize};

/// One polled snapshot of the driver's car.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySample {
    /// Current gear. Negative is reverse, 0 is neutral
    pub gear: i32,
    /// Current engine RPM
    pub rpm: f32,
    /// Clutch engagement. 0=fully disengaged (pedal pressed) to 1=fully engaged
    pub clutch: f32,
}

impl Default for TelemetrySample {
    fn default() -> Self {
        Self {
            gear: 0,
            rpm: 0.,
            clutch: 1.,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DriverEntry {
    /// Simulator-internal index of the car in the session
    pub car_idx: i32,
    /// Car identifier used as key in the shiftpoint table
    pub car_path: String,
    #[serde(default)]
    pub car_screen_name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionMetadata {
    /// Car index of the local player
    pub player_car_idx: i32,
    pub drivers: Vec<DriverEntry>,
    /// Shift RPM the simulator suggests for the player's car
    #[serde(default)]
    pub default_shift_rpm: Option<f32>,
}

impl SessionMetadata {
    /// Roster entry driven by the local player, if present.
    pub fn player_entry(&self) -> Option<&DriverEntry> {
        self.drivers
            .iter()
            .find(|driver| driver.car_idx == self.player_car_idx)
    }
}

/// A single entry of a telemetry recording, in JSON Lines format.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryRecord {
    Session(SessionMetadata),
    Sample(TelemetrySample),
    Gap,
    Disconnect,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> SessionMetadata {
        SessionMetadata {
            player_car_idx: 7,
            drivers: vec![
                DriverEntry {
                    car_idx: 3,
                    car_path: "kart1".to_string(),
                    car_screen_name: "Kart".to_string(),
                },
                DriverEntry {
                    car_idx: 7,
                    car_path: "gt3rs".to_string(),
                    car_screen_name: "Porsche 911 GT3 RS".to_string(),
                },
            ],
            default_shift_rpm: Some(7100.),
        }
    }

    #[test]
    fn test_player_entry_matches_car_idx() {
        let metadata = roster();
        assert_eq!(metadata.player_entry().unwrap().car_path, "gt3rs");
    }

    #[test]
    fn test_player_entry_missing() {
        let metadata = SessionMetadata {
            player_car_idx: 42,
            ..roster()
        };
        assert!(metadata.player_entry().is_none());
    }

    #[test]
    fn test_record_json_format() {
        let record = TelemetryRecord::Sample(TelemetrySample {
            gear: 3,
            rpm: 7200.,
            clutch: 1.,
        });
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(line, r#"{"type":"sample","gear":3,"rpm":7200.0,"clutch":1.0}"#);

        let gap: TelemetryRecord = serde_json::from_str(r#"{"type":"gap"}"#).unwrap();
        assert_eq!(gap, TelemetryRecord::Gap);
    }
}
