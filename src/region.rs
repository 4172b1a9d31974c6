use nalgebra as na;
use ndarray::{ArrayViewMut3, Axis};

use crate::error::Error;

/// Area of interest: a closed polygon in frame pixel space.
///
/// Only detections whose centroid falls inside the polygon are handed to the
/// speed and counting logic.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    poly: Vec<na::Point2<f32>>,
}

impl Region {
    pub fn new(poly: Vec<na::Point2<f32>>) -> Result<Self, Error> {
        if poly.len() < 3 {
            return Err(Error::InvalidRegion(format!(
                "polygon needs at least 3 vertices, got {}",
                poly.len()
            )));
        }

        if poly.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(Error::InvalidRegion("non-finite vertex".into()));
        }

        Ok(Self { poly })
    }

    /// Builds the polygon from vertices given as fractions of the frame size.
    /// Vertex coordinates are truncated to whole pixels.
    pub fn from_fractions(fractions: &[[f64; 2]], dims: (u32, u32)) -> Result<Self, Error> {
        Self::new(scale(fractions, dims))
    }

    /// Same as [`Region::from_fractions`] for fractions that already passed it once:
    /// scaling finite fractions keeps the vertex count and keeps them finite.
    pub(crate) fn from_checked_fractions(fractions: &[[f64; 2]], dims: (u32, u32)) -> Self {
        Self {
            poly: scale(fractions, dims),
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[na::Point2<f32>] {
        &self.poly
    }

    /// Ray casting point-in-polygon test.
    pub fn contains(&self, p: na::Point2<f32>) -> bool {
        let poly = &self.poly;
        let n = poly.len();
        let mut inside = false;
        let mut p1 = poly[0];
        let mut xints = 0.0;

        for i in 1..=n {
            let p2 = poly[i % n];

            if p.y > f32::min(p1.y, p2.y)
                && p.y <= f32::max(p1.y, p2.y)
                && p.x <= f32::max(p1.x, p2.x)
            {
                if (p1.y - p2.y).abs() > f32::EPSILON {
                    xints = (p.y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y) + p1.x;
                }

                if (p1.x - p2.x).abs() < f32::EPSILON || p.x <= xints {
                    inside = !inside;
                }
            }

            p1 = p2;
        }

        inside
    }

    /// Zeroes every pixel of an `H x W x C` frame outside the polygon.
    pub fn mask(&self, mut pixels: ArrayViewMut3<'_, u8>) {
        for (y, mut row) in pixels.axis_iter_mut(Axis(0)).enumerate() {
            for (x, mut px) in row.axis_iter_mut(Axis(0)).enumerate() {
                if !self.contains(na::Point2::new(x as f32, y as f32)) {
                    px.map_inplace(|v| *v = 0);
                }
            }
        }
    }
}

fn scale(fractions: &[[f64; 2]], dims: (u32, u32)) -> Vec<na::Point2<f32>> {
    let (fw, fh) = (f64::from(dims.0), f64::from(dims.1));

    fractions
        .iter()
        .map(|[fx, fy]| na::Point2::new((fw * fx).trunc() as f32, (fh * fy).trunc() as f32))
        .collect()
}
