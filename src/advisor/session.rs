use std::collections::HashSet;

use log::{info, warn};

use crate::{
    ShiftIndicatorError,
    shiftpoints::ShiftpointTable,
    telemetry::{SessionMetadata, TelemetrySource},
};

use super::gate::AlertGate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// Connected, waiting for the first sample to identify the car
    Connected,
    InSession,
}

/// Tracks the connection and session lifecycle and owns the identity of the car
/// driven in the current session.
#[derive(Debug, Default)]
pub struct SessionTracker {
    connected: bool,
    in_session: bool,
    vehicle_id: String,
    default_shift_rpm: Option<f32>,
    reported_gears: HashSet<i32>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        match (self.connected, self.in_session) {
            (false, _) => SessionState::Disconnected,
            (true, false) => SessionState::Connected,
            (true, true) => SessionState::InSession,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn in_session(&self) -> bool {
        self.in_session
    }

    /// Identifier of the car in this session; empty until resolved or when the player
    /// could not be found in the roster.
    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn default_shift_rpm(&self) -> Option<f32> {
        self.default_shift_rpm
    }

    /// Tear the session down after the source reported a disconnect. Returns whether
    /// a transition happened; repeated calls while disconnected do nothing.
    pub fn on_connection_lost(&mut self, gate: &mut AlertGate) -> bool {
        if !self.connected {
            return false;
        }

        info!(
            "Connection lost, ending session for vehicle '{}'",
            self.vehicle_id
        );
        self.connected = false;
        self.in_session = false;
        self.vehicle_id.clear();
        self.default_shift_rpm = None;
        self.reported_gears.clear();
        gate.reset();
        true
    }

    /// Try to (re)connect the source. On error the tracker stays disconnected and the
    /// caller decides whether to retry after its back-off delay.
    pub fn on_connection_established(
        &mut self,
        source: &mut dyn TelemetrySource,
    ) -> Result<(), ShiftIndicatorError> {
        source.connect()?;
        info!("Connected to telemetry source");
        self.connected = true;
        self.in_session = false;
        Ok(())
    }

    /// Resolve the player's car from the session roster and cache it for the rest of
    /// the session.
    pub fn on_first_sample_after_connect(
        &mut self,
        metadata: &SessionMetadata,
        table: &ShiftpointTable,
    ) {
        self.in_session = true;
        self.default_shift_rpm = metadata.default_shift_rpm.filter(|rpm| *rpm > 0.);
        self.vehicle_id = metadata
            .player_entry()
            .map(|driver| driver.car_path.clone())
            .unwrap_or_default();

        if self.vehicle_id.is_empty() {
            warn!(
                "Car index {} not found in the driver roster, using the default shift RPM {:?}",
                metadata.player_car_idx, self.default_shift_rpm
            );
            return;
        }

        match table.shiftpoints(&self.vehicle_id) {
            None => warn!(
                "Unknown vehicle '{}', using the default shift RPM {:?}",
                self.vehicle_id, self.default_shift_rpm
            ),
            Some([]) => warn!(
                "No shiftpoints configured for vehicle '{}', alerts are disabled for this session",
                self.vehicle_id
            ),
            Some(shiftpoints) => info!(
                "Session started for vehicle '{}' with shiftpoints {:?}",
                self.vehicle_id, shiftpoints
            ),
        }
    }

    /// Whether a gear-out-of-range notice for `gear` still has to be logged in this
    /// session. Returns `true` only the first time for each gear.
    pub fn should_report_gear(&mut self, gear: i32) -> bool {
        self.reported_gears.insert(gear)
    }
}
