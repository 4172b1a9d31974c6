use std::collections::HashSet;
use std::fmt;

use crate::detection::VehicleClass;

/// Running totals of vehicles that crossed the threshold line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountState {
    pub total: u32,
    per_class: [u32; 4],
}

impl CountState {
    #[inline]
    pub fn get(&self, class: VehicleClass) -> u32 {
        self.per_class[class.index()]
    }

    fn bump(&mut self, class: VehicleClass) {
        self.total += 1;
        self.per_class[class.index()] += 1;
    }
}

impl fmt::Display for CountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "car: {} motorcycle: {} bus: {} truck: {}",
            self.get(VehicleClass::Car),
            self.get(VehicleClass::Motorcycle),
            self.get(VehicleClass::Bus),
            self.get(VehicleClass::Truck),
        )
    }
}

/// Counts each track id once, on the first sighting whose centroid lies below
/// the horizontal threshold line.
///
/// The line is passed per call since it depends on the frame size, which is
/// only known once frames arrive.
#[derive(Debug, Default)]
pub struct CrossingCounter {
    counts: CountState,
    counted: HashSet<u32>,
}

impl CrossingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this sighting moved the track into the counted state.
    pub fn evaluate(&mut self, line_y: f32, track_id: u32, class: VehicleClass, cy: f32) -> bool {
        if cy <= line_y || !self.counted.insert(track_id) {
            return false;
        }

        self.counts.bump(class);
        log::debug!(
            "track {} ({}) crossed y={}, total {}",
            track_id,
            class,
            line_y,
            self.counts.total
        );

        true
    }

    #[inline]
    pub fn is_counted(&self, track_id: u32) -> bool {
        self.counted.contains(&track_id)
    }

    #[inline]
    pub fn counts(&self) -> &CountState {
        &self.counts
    }
}
