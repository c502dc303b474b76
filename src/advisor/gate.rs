use std::time::{Duration, Instant};

use crate::{
    shiftpoints::{Resolution, ThresholdLookup},
    telemetry::TelemetrySample,
};

/// Hysteresis and rate limiting for shift alerts.
///
/// The gate fires once per excursion above the shiftpoint. It re-arms when RPM drops
/// back below the threshold or when the gear changes, and never fires twice within
/// `min_interval`.
#[derive(Debug, Clone)]
pub struct AlertGate {
    armed: bool,
    last_fired_gear: Option<i32>,
    last_fired_at: Option<Instant>,
    min_interval: Duration,
    clutch_floor: f32,
}

impl AlertGate {
    pub fn new(min_interval: Duration, clutch_floor: f32) -> Self {
        Self {
            armed: true,
            last_fired_gear: None,
            last_fired_at: None,
            min_interval,
            clutch_floor,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn last_fired_gear(&self) -> Option<i32> {
        self.last_fired_gear
    }

    pub fn last_fired_at(&self) -> Option<Instant> {
        self.last_fired_at
    }

    /// Forget everything about previous alerts. Called when a session ends.
    pub fn reset(&mut self) {
        self.armed = true;
        self.last_fired_gear = None;
        self.last_fired_at = None;
    }

    /// Threshold to compare against, or `None` when no alert is possible.
    fn effective_threshold(
        lookup: &ThresholdLookup,
        session_default_rpm: Option<f32>,
    ) -> Option<f32> {
        let rpm = match lookup.resolution {
            Resolution::Found | Resolution::GearOutOfRange => Some(lookup.rpm),
            Resolution::UnknownVehicle => session_default_rpm,
            Resolution::NotApplicable | Resolution::NoShiftpoints => None,
        };
        rpm.filter(|rpm| *rpm > 0.)
    }

    /// Decide whether to alert for this sample. Returns `true` when the alert should
    /// be played now.
    pub fn decide(
        &mut self,
        sample: &TelemetrySample,
        lookup: &ThresholdLookup,
        session_default_rpm: Option<f32>,
        now: Instant,
    ) -> bool {
        // mid-shift or stationary, leave arm state untouched
        if sample.clutch < self.clutch_floor || sample.gear < 1 {
            return false;
        }

        let Some(threshold) = Self::effective_threshold(lookup, session_default_rpm) else {
            return false;
        };

        if !self.armed
            && (sample.rpm < threshold || self.last_fired_gear != Some(sample.gear))
        {
            self.armed = true;
        }

        if !self.armed || sample.rpm < threshold {
            return false;
        }

        if let Some(last) = self.last_fired_at {
            if now.saturating_duration_since(last) <= self.min_interval {
                return false;
            }
        }

        self.armed = false;
        self.last_fired_gear = Some(sample.gear);
        self.last_fired_at = Some(match self.last_fired_at {
            Some(last) => last.max(now),
            None => now,
        });
        true
    }
}
