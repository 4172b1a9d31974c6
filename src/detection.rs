use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

use crate::bbox::{BBox, Ltrb};

/// Vehicle categories the meter counts. Any other detector label is ignored.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Car,
        VehicleClass::Motorcycle,
        VehicleClass::Bus,
        VehicleClass::Truck,
    ];

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "car" => Some(VehicleClass::Car),
            "motorcycle" => Some(VehicleClass::Motorcycle),
            "bus" => Some(VehicleClass::Bus),
            "truck" => Some(VehicleClass::Truck),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "truck",
        }
    }

    #[inline(always)]
    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked object in one frame, as handed over by the external detector/tracker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    #[serde(rename = "id")]
    pub track_id: u32,
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "c")]
    pub label: String,
    #[serde(rename = "p", default)]
    pub confidence: f32,
}

impl Detection {
    pub fn new<S: Into<String>>(track_id: u32, label: S, bbox: BBox<Ltrb>) -> Self {
        Self {
            track_id,
            bbox,
            label: label.into(),
            confidence: 1.0,
        }
    }

    #[inline(always)]
    pub fn centroid(&self) -> na::Point2<f32> {
        self.bbox.centroid()
    }

    #[inline]
    pub fn vehicle_class(&self) -> Option<VehicleClass> {
        VehicleClass::from_label(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_four_labels_are_vehicles() {
        for class in VehicleClass::ALL {
            assert_eq!(VehicleClass::from_label(class.as_str()), Some(class));
        }

        assert_eq!(VehicleClass::from_label("person"), None);
        assert_eq!(VehicleClass::from_label("Car"), None);
        assert_eq!(VehicleClass::from_label("motorbike"), None);
    }

    #[test]
    fn parses_short_field_names() {
        let det: Detection =
            serde_json::from_str(r#"{"id": 7, "bbox": [90, 90, 110, 110], "c": "car"}"#).unwrap();

        assert_eq!(det.track_id, 7);
        assert_eq!(det.vehicle_class(), Some(VehicleClass::Car));
        assert_eq!(det.centroid(), na::Point2::new(100.0, 100.0));
        assert_eq!(det.confidence, 0.0);
    }
}
