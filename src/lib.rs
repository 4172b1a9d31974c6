pub mod bbox;
pub mod config;
pub mod counter;
pub mod detection;
pub mod error;
pub mod frame;
pub mod history;
pub mod meter;
pub mod region;
pub mod replay;
pub mod rolling_avg;
pub mod sink;
pub mod speed;

pub use config::MeterConfig;
pub use detection::{Detection, VehicleClass};
pub use frame::Frame;
pub use meter::{run, FrameReport, RunSummary, TrafficMeter};

use error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Upstream detector/tracker boundary: one frame of tracked detections per call.
pub trait TrackSource {
    /// `Ok(None)` marks the end of the stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, Error>;

    fn release(&mut self) {}
}

/// Display side channel. Never feeds back into meter state.
pub trait Renderer {
    fn render(&mut self, report: &FrameReport) -> Control;

    fn release(&mut self) {}
}

impl<F: FnMut(&FrameReport) -> Control> Renderer for F {
    #[inline]
    fn render(&mut self, report: &FrameReport) -> Control {
        self(report)
    }
}

/// Adapts any iterator of frames into a [`TrackSource`].
pub struct Frames<I>(pub I);

impl<I: Iterator<Item = Frame>> TrackSource for Frames<I> {
    #[inline]
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        Ok(self.0.next())
    }
}
