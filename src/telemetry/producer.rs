use crate::ShiftIndicatorError;

use super::{SessionMetadata, TelemetrySample};

#[cfg(windows)]
const CONN_RETRY_WAIT_MS: u64 = 200;
#[cfg(windows)]
const CONN_TIMEOUT_MS: u64 = 2000;

/// A pull-based source of live telemetry.
///
/// # Lifecycle
///
/// 1. Call `connect()` until it succeeds; the source decides how a connection is made
/// 2. Call `session_metadata()` once per connection to identify the player's car
/// 3. Call `sample()` repeatedly; `Ok(None)` means no fresh data for this tick
/// 4. When `is_connected()` turns false, start again from 1
pub trait TelemetrySource {
    /// Attempt to connect to the simulator. Errors are recoverable and the caller is
    /// expected to retry after a delay.
    fn connect(&mut self) -> Result<(), ShiftIndicatorError>;

    fn is_connected(&self) -> bool;

    /// Session information for the current connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not connected or the metadata cannot be read.
    fn session_metadata(&mut self) -> Result<SessionMetadata, ShiftIndicatorError>;

    /// Next telemetry sample. May block until the simulator publishes new data.
    ///
    /// Returns `Ok(None)` for a transient gap. A lost connection is reported through
    /// `is_connected()` rather than as an error.
    fn sample(&mut self) -> Result<Option<TelemetrySample>, ShiftIndicatorError>;
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for Box<T> {
    fn connect(&mut self) -> Result<(), ShiftIndicatorError> {
        (**self).connect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn session_metadata(&mut self) -> Result<SessionMetadata, ShiftIndicatorError> {
        (**self).session_metadata()
    }

    fn sample(&mut self) -> Result<Option<TelemetrySample>, ShiftIndicatorError> {
        (**self).sample()
    }
}

/// Clutch pedal position (0=released, 1=pressed) to engagement.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn engagement_from_pedal(clutch_pedal: f32) -> f32 {
    (1. - clutch_pedal).clamp(0., 1.)
}

/// Reads telemetry from iRacing shared memory through `simetry`.
#[cfg(windows)]
pub struct IRacingTelemetrySource {
    runtime: tokio::runtime::Runtime,
    client: Option<simetry::iracing::Client>,
    retry_wait_ms: u64,
    timeout_ms: u64,
    point_no: usize,
}

#[cfg(windows)]
impl IRacingTelemetrySource {
    pub fn new() -> Result<Self, ShiftIndicatorError> {
        Self::with_timing(CONN_RETRY_WAIT_MS, CONN_TIMEOUT_MS)
    }

    pub fn with_timing(retry_wait_ms: u64, timeout_ms: u64) -> Result<Self, ShiftIndicatorError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| ShiftIndicatorError::TelemetryConnectionError {
                description: format!("Could not start async runtime: {}", e),
            })?;
        Ok(Self {
            runtime,
            client: None,
            retry_wait_ms,
            timeout_ms,
            point_no: 0,
        })
    }

    fn next_state(&mut self) -> Option<simetry::iracing::SimState> {
        let client = self.client.as_mut()?;
        let state = self.runtime.block_on(client.next_sim_state());
        if state.is_none() {
            log::info!("iRacing: simulator stopped publishing telemetry");
            self.client = None;
        }
        state
    }
}

#[cfg(windows)]
impl TelemetrySource for IRacingTelemetrySource {
    fn connect(&mut self) -> Result<(), ShiftIndicatorError> {
        use std::time::Duration;

        let retry_delay = Duration::from_millis(self.retry_wait_ms);
        let timeout = Duration::from_millis(self.timeout_ms);

        let client = self
            .runtime
            .block_on(async {
                tokio::time::timeout(timeout, simetry::iracing::Client::connect(retry_delay))
                    .await
            })
            .map_err(|_| ShiftIndicatorError::TelemetryConnectionError {
                description: "Timeout waiting for iRacing session".to_string(),
            })?;

        log::info!("iRacing: connected");
        self.client = Some(client);
        self.point_no = 0;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn session_metadata(&mut self) -> Result<SessionMetadata, ShiftIndicatorError> {
        use super::DriverEntry;

        if self.client.is_none() {
            return Err(ShiftIndicatorError::SessionMetadataError {
                description: "The iRacing connection is not initialized, call connect() first."
                    .to_string(),
            });
        }

        let state = self
            .next_state()
            .ok_or(ShiftIndicatorError::SessionMetadataError {
                description: "Could not retrieve iRacing state".to_string(),
            })?;

        let session_info = state.session_info();
        let driver_info = &session_info["DriverInfo"];
        let player_car_idx = driver_info["DriverCarIdx"].as_i64().ok_or(
            ShiftIndicatorError::SessionMetadataError {
                description: "DriverInfo.DriverCarIdx missing from session info".to_string(),
            },
        )? as i32;
        let default_shift_rpm = driver_info["DriverCarSLShiftRPM"]
            .as_f64()
            .map(|rpm| rpm as f32)
            .filter(|rpm| *rpm > 0.);

        // the roster is a YAML sequence, walk it until the first missing entry
        let drivers_yaml = &driver_info["Drivers"];
        let mut drivers = Vec::new();
        for i in 0.. {
            let entry = &drivers_yaml[i];
            let Some(car_idx) = entry["CarIdx"].as_i64() else {
                break;
            };
            drivers.push(DriverEntry {
                car_idx: car_idx as i32,
                car_path: entry["CarPath"].as_str().unwrap_or_default().to_string(),
                car_screen_name: entry["CarScreenName"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        Ok(SessionMetadata {
            player_car_idx,
            drivers,
            default_shift_rpm,
        })
    }

    fn sample(&mut self) -> Result<Option<TelemetrySample>, ShiftIndicatorError> {
        use simetry::Moment;
        use uom::si::angular_velocity::revolution_per_minute;

        if self.client.is_none() {
            return Err(ShiftIndicatorError::TelemetryProducerError {
                description: "The iRacing connection is not initialized, call connect() first."
                    .to_string(),
            });
        }

        let Some(state) = self.next_state() else {
            return Ok(None);
        };

        if self.point_no == usize::MAX {
            self.point_no = 0;
        }
        self.point_no += 1;

        let (Some(gear), Some(rpm)) = (
            state.vehicle_gear(),
            state.vehicle_engine_rotation_speed(),
        ) else {
            if self.point_no % 600 == 0 {
                log::debug!("iRacing: point #{} carried no gear/rpm", self.point_no);
            }
            return Ok(None);
        };
        let clutch_pedal = state.pedals().map(|p| p.clutch as f32).unwrap_or(0.);

        Ok(Some(TelemetrySample {
            gear: gear as i32,
            rpm: rpm.get::<revolution_per_minute>() as f32,
            clutch: engagement_from_pedal(clutch_pedal),
        }))
    }
}
