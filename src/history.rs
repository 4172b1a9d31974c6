use nalgebra as na;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPosition {
    pub pos: na::Point2<f32>,
    pub ts: f64,
}

/// Last known centroid and timestamp per track id.
///
/// Entries live as long as the store; track ids coming from the tracker are
/// bounded for a single video.
#[derive(Debug, Default)]
pub struct PositionHistory {
    positions: HashMap<u32, TrackPosition>,
}

impl PositionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the new position and returns the one it replaced, if any.
    #[inline]
    pub fn observe(
        &mut self,
        track_id: u32,
        pos: na::Point2<f32>,
        ts: f64,
    ) -> Option<TrackPosition> {
        self.positions.insert(track_id, TrackPosition { pos, ts })
    }

    #[inline]
    pub fn get(&self, track_id: u32) -> Option<&TrackPosition> {
        self.positions.get(&track_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
