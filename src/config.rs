use serde_derive::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::region::Region;
use crate::speed::AveragingMode;

pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_COUNT_LINE: f64 = 0.60;
pub const DEFAULT_PIXEL_TO_METER: f32 = 0.5;
pub const DEFAULT_CSV_PATH: &str = "vehicle_speeds.csv";

/// Road trapezoid as (x, y) fractions of the frame:
/// bottom-left, top-left, top-right, bottom-right.
pub const DEFAULT_REGION: [[f64; 2]; 4] = [[0.05, 0.95], [0.35, 0.20], [0.85, 0.20], [0.95, 0.95]];

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeterConfig {
    pub region: Vec<[f64; 2]>,
    /// Threshold line position as a fraction of frame height.
    pub count_line: f64,
    pub pixel_to_meter: f32,
    pub averaging: AveragingMode,
    pub csv_path: PathBuf,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_vec(),
            count_line: DEFAULT_COUNT_LINE,
            pixel_to_meter: DEFAULT_PIXEL_TO_METER,
            averaging: AveragingMode::default(),
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
        }
    }
}

impl MeterConfig {
    pub fn from_toml(src: &str) -> Result<Self, Error> {
        let cfg: MeterConfig = toml::from_str(src)?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let src = std::fs::read_to_string(path)?;

        Self::from_toml(&src)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        Region::from_fractions(&self.region, self.frame_dims())?;

        if !(self.pixel_to_meter.is_finite() && self.pixel_to_meter > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "pixel_to_meter must be positive, got {}",
                self.pixel_to_meter
            )));
        }

        if !(0.0..=1.0).contains(&self.count_line) {
            return Err(Error::InvalidConfig(format!(
                "count_line must be a fraction of frame height, got {}",
                self.count_line
            )));
        }

        Ok(())
    }

    #[inline]
    pub fn frame_dims(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// Threshold line y for a frame of the given height, in whole pixels.
    pub fn line_for(&self, dims: (u32, u32)) -> f32 {
        (f64::from(dims.1) * self.count_line).trunc() as f32
    }
}
