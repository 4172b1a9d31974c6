use nalgebra as na;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bbox::{BBox, Ltrb};
use crate::config::MeterConfig;
use crate::counter::{CountState, CrossingCounter};
use crate::detection::VehicleClass;
use crate::error::Error;
use crate::history::PositionHistory;
use crate::region::Region;
use crate::sink::SpeedSink;
use crate::speed::{SpeedEstimator, SpeedTable};
use crate::{Control, Frame, Renderer, TrackSource};

/// Overlay data for one accepted detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub track_id: u32,
    pub class: VehicleClass,
    pub bbox: BBox<Ltrb>,
    pub centroid: na::Point2<f32>,
    // 0 when this sighting produced no speed sample
    pub instant_kmh: f32,
    pub average_kmh: Option<f32>,
    pub counted_now: bool,
}

impl Annotation {
    pub fn label_text(&self) -> String {
        format!("ID {} {}", self.track_id, self.class)
    }

    pub fn speed_text(&self) -> String {
        format!("{} km/h", self.instant_kmh as i32)
    }
}

/// Everything a renderer needs to draw one processed frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    pub timestamp: f64,
    pub region: Region,
    pub line_y: f32,
    pub annotations: Vec<Annotation>,
    pub counts: CountState,
    /// Vehicle detections dropped by the area of interest.
    pub outside: usize,
}

impl FrameReport {
    pub fn total_text(&self) -> String {
        format!("Vehicle Count: {}", self.counts.total)
    }

    pub fn classes_text(&self) -> String {
        self.counts.to_string()
    }
}

/// Pixel geometry derived from the configured fractions and the size of the
/// first processed frame.
#[derive(Debug, Clone)]
struct Scene {
    dims: (u32, u32),
    region: Region,
    line_y: f32,
}

/// Owns all per-run state: position history, speed averages and crossing counts.
#[derive(Debug)]
pub struct TrafficMeter {
    config: MeterConfig,
    scene: Option<Scene>,
    history: PositionHistory,
    speed: SpeedEstimator,
    counter: CrossingCounter,
    frame_index: u64,
}

impl TrafficMeter {
    pub fn new(config: &MeterConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            config: config.clone(),
            scene: None,
            history: PositionHistory::new(),
            speed: SpeedEstimator::new(config.pixel_to_meter, config.averaging),
            counter: CrossingCounter::new(),
            frame_index: 0,
        })
    }

    fn scene_for(&mut self, dims: (u32, u32)) -> Scene {
        let config = &self.config;
        let scene = self.scene.get_or_insert_with(|| {
            log::info!("building area of interest for {}x{} frames", dims.0, dims.1);

            Scene {
                dims,
                region: Region::from_checked_fractions(&config.region, dims),
                line_y: config.line_for(dims),
            }
        });

        if scene.dims != dims {
            log::warn!(
                "frame {} is {:?}, geometry was built for {:?}",
                self.frame_index,
                dims,
                scene.dims
            );
        }

        scene.clone()
    }

    pub fn process(&mut self, frame: &Frame) -> FrameReport {
        self.frame_index += 1;

        let Scene { region, line_y, .. } = self.scene_for(frame.dims);

        let ts = frame.timestamp;
        let mut annotations = Vec::with_capacity(frame.len());
        let mut outside = 0;

        for det in frame.iter() {
            let Some(class) = det.vehicle_class() else {
                continue;
            };

            let centroid = det.centroid();
            if !region.contains(centroid) {
                outside += 1;
                continue;
            }

            let instant = match self.history.observe(det.track_id, centroid, ts) {
                Some(prior) => self.speed.update(det.track_id, &prior, centroid, ts),
                None => None,
            };

            let counted_now = self.counter.evaluate(line_y, det.track_id, class, centroid.y);

            annotations.push(Annotation {
                track_id: det.track_id,
                class,
                bbox: det.bbox,
                centroid,
                instant_kmh: instant.unwrap_or(0.0),
                average_kmh: self.speed.average_kmh(det.track_id),
                counted_now,
            });
        }

        FrameReport {
            frame_index: self.frame_index,
            timestamp: ts,
            region,
            line_y,
            annotations,
            counts: *self.counter.counts(),
            outside,
        }
    }

    #[inline]
    pub fn speeds(&self) -> &SpeedTable {
        self.speed.records()
    }

    #[inline]
    pub fn counts(&self) -> &CountState {
        self.counter.counts()
    }

    /// Area of interest in pixels, once the first frame fixed the frame size.
    #[inline]
    pub fn region(&self) -> Option<&Region> {
        self.scene.as_ref().map(|s| &s.region)
    }

    #[inline]
    pub fn line_y(&self) -> Option<f32> {
        self.scene.as_ref().map(|s| s.line_y)
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    pub fn tracks_seen(&self) -> usize {
        self.history.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    SourceFailed,
    Interrupted,
    Quit,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames: u64,
    pub counts: CountState,
    pub tracks_with_speed: usize,
    pub sink_failures: usize,
    pub stop: StopReason,
}

/// Frame loop: pulls frames until the source runs dry, the renderer asks to
/// quit or `stop` is raised. The flag is checked once per frame.
pub fn run<S, R, K>(
    meter: &mut TrafficMeter,
    source: &mut S,
    renderer: &mut R,
    sink: &mut K,
    stop: &AtomicBool,
) -> RunSummary
where
    S: TrackSource + ?Sized,
    R: Renderer + ?Sized,
    K: SpeedSink + ?Sized,
{
    let mut sink_failures = 0;

    let reason = loop {
        if stop.load(Ordering::Relaxed) {
            break StopReason::Interrupted;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break StopReason::EndOfStream,
            Err(err) => {
                log::warn!("frame source failed: {}", err);
                break StopReason::SourceFailed;
            }
        };

        let report = meter.process(&frame);

        if let Err(err) = sink.rewrite(meter.speeds()) {
            sink_failures += 1;
            log::error!("frame {}: speed table not saved: {}", report.frame_index, err);
        }

        if renderer.render(&report) == Control::Quit {
            break StopReason::Quit;
        }
    };

    source.release();
    renderer.release();

    log::info!(
        "stopped after {} frames ({:?}): {} vehicles, {}",
        meter.frames(),
        reason,
        meter.counts().total,
        meter.counts()
    );

    RunSummary {
        frames: meter.frames(),
        counts: *meter.counts(),
        tracks_with_speed: meter.speeds().len(),
        sink_failures,
        stop: reason,
    }
}
