use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Outcome of resolving the shiftpoint for a vehicle and gear.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The table holds a threshold for this gear.
    Found,
    /// Neutral and reverse never need a threshold.
    NotApplicable,
    /// The vehicle has no entry; the session default shift RPM should be used instead.
    UnknownVehicle,
    /// The vehicle has an entry but it lists no thresholds.
    NoShiftpoints,
    /// The gear is past the end of the list; the returned threshold is the last one.
    GearOutOfRange,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThresholdLookup {
    pub rpm: f32,
    pub resolution: Resolution,
}

impl ThresholdLookup {
    fn new(rpm: f32, resolution: Resolution) -> Self {
        Self { rpm, resolution }
    }
}

/// Per-vehicle upshift thresholds. Index 0 holds the RPM at which to shift out of
/// first gear.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ShiftpointTable {
    vehicles: HashMap<String, Vec<f32>>,
}

impl ShiftpointTable {
    pub fn new(vehicles: HashMap<String, Vec<f32>>) -> Self {
        Self { vehicles }
    }

    pub fn resolve(&self, vehicle_id: &str, gear: i32) -> ThresholdLookup {
        if gear < 1 {
            return ThresholdLookup::new(0., Resolution::NotApplicable);
        }

        let Some(shiftpoints) = self.vehicles.get(vehicle_id) else {
            return ThresholdLookup::new(0., Resolution::UnknownVehicle);
        };

        match shiftpoints.as_slice() {
            [] => ThresholdLookup::new(0., Resolution::NoShiftpoints),
            // a single known ratio gap is assumed to hold for every gear
            [only] => ThresholdLookup::new(*only, Resolution::Found),
            [.., last] => match shiftpoints.get((gear - 1) as usize) {
                Some(rpm) => ThresholdLookup::new(*rpm, Resolution::Found),
                None => ThresholdLookup::new(*last, Resolution::GearOutOfRange),
            },
        }
    }

    pub fn shiftpoints(&self, vehicle_id: &str) -> Option<&[f32]> {
        self.vehicles.get(vehicle_id).map(Vec::as_slice)
    }

    /// Configured vehicle identifiers in alphabetical order.
    pub fn vehicles(&self) -> Vec<&str> {
        let mut vehicles: Vec<&str> = self.vehicles.keys().map(String::as_str).collect();
        vehicles.sort_unstable();
        vehicles
    }

    /// One listing line per vehicle, alphabetical. Empty entries are flagged instead
    /// of printed as an empty list.
    pub fn describe(&self) -> Vec<String> {
        self.vehicles()
            .into_iter()
            .map(|vehicle| match self.shiftpoints(vehicle).unwrap_or_default() {
                [] => format!("{:<24} No shiftpoints found", vehicle),
                thresholds => format!("{:<24} {:?}", vehicle, thresholds),
            })
            .collect()
    }

    pub fn contains(&self, vehicle_id: &str) -> bool {
        self.vehicles.contains_key(vehicle_id)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

impl FromIterator<(String, Vec<f32>)> for ShiftpointTable {
    fn from_iter<T: IntoIterator<Item = (String, Vec<f32>)>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
