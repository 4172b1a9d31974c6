use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::history::TrackPosition;
use crate::rolling_avg::RunningAvg;

pub const MPS_TO_KMH: f32 = 3.6;

/// Which denominator the running average uses when a new sample arrives.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AveragingMode {
    /// The track's own sample count.
    #[default]
    PerTrack,
    /// Number of tracks that have any recorded average, including this one.
    TracksWithAverage,
}

/// Running average speed of one track.
pub type SpeedRecord = RunningAvg<f32>;

/// Per-track averages, ordered by track id.
pub type SpeedTable = BTreeMap<u32, SpeedRecord>;

#[derive(Debug)]
pub struct SpeedEstimator {
    pixel_to_meter: f32,
    mode: AveragingMode,
    records: SpeedTable,
}

impl SpeedEstimator {
    pub fn new(pixel_to_meter: f32, mode: AveragingMode) -> Self {
        Self {
            pixel_to_meter,
            mode,
            records: BTreeMap::new(),
        }
    }

    /// Instantaneous speed in km/h between two sightings, `None` when the
    /// elapsed time is not strictly positive.
    pub fn instant_kmh(&self, prior: &TrackPosition, pos: na::Point2<f32>, ts: f64) -> Option<f32> {
        let dt = ts - prior.ts;
        if dt.is_nan() || dt <= 0.0 {
            return None;
        }

        let dist_px = na::distance(&prior.pos, &pos);
        let dist_m = dist_px * self.pixel_to_meter;
        let mps = f64::from(dist_m) / dt;

        Some(mps as f32 * MPS_TO_KMH)
    }

    /// Feeds one sighting with a known prior position. Returns the
    /// instantaneous speed when a sample was produced; the track's running
    /// average is updated in that case only.
    pub fn update(
        &mut self,
        track_id: u32,
        prior: &TrackPosition,
        pos: na::Point2<f32>,
        ts: f64,
    ) -> Option<f32> {
        let Some(kmh) = self.instant_kmh(prior, pos, ts) else {
            log::debug!(
                "track {}: non-positive time delta ({} -> {}), speed sample skipped",
                track_id,
                prior.ts,
                ts
            );
            return None;
        };

        let tracks = self.records.len();
        match self.records.get_mut(&track_id) {
            Some(record) => {
                match self.mode {
                    AveragingMode::PerTrack => record.push(kmh),
                    AveragingMode::TracksWithAverage => record.push_over(kmh, tracks),
                };
            }
            None => {
                self.records.insert(track_id, RunningAvg::new(kmh));
            }
        }

        Some(kmh)
    }

    #[inline]
    pub fn average_kmh(&self, track_id: u32) -> Option<f32> {
        self.records.get(&track_id).map(|r| r.value())
    }

    #[inline]
    pub fn records(&self) -> &SpeedTable {
        &self.records
    }
}
