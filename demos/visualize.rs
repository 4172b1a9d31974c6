use clap::Parser;
use opencv::{
    core::{self, Mat},
    highgui, imgproc,
    prelude::*,
    videoio,
};
use ndarray::aview_mut1;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vehicle_meter::error::Error;
use vehicle_meter::meter::Annotation;
use vehicle_meter::region::Region;
use vehicle_meter::replay::DumpSource;
use vehicle_meter::sink::CsvFileSink;
use vehicle_meter::{
    run, Control, Frame, FrameReport, MeterConfig, Renderer, TrackSource, TrafficMeter,
};

const WINDOW: &str = "Traffic CCTV - Speed Detection";
const ROI_WINDOW: &str = "ROI Detection Area";

/// The resized frame twice: one copy for overlays, one masked to the area of interest.
#[derive(Default)]
struct Canvas {
    display: Mat,
    roi: Mat,
}

#[derive(Parser, Debug)]
#[command(name = "visualize", about = "Draw vehicle meter overlays over a video")]
struct Args {
    video: PathBuf,
    /// Detections dump recorded for the same video at the configured frame size
    dets: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Pairs decoded video frames with the recorded detections of the same frame.
struct VideoSource {
    cam: videoio::VideoCapture,
    dets: DumpSource<std::io::BufReader<std::fs::File>>,
    size: core::Size,
    current: Rc<RefCell<Canvas>>,
}

impl TrackSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        let mut raw = Mat::default();
        if !self.cam.read(&mut raw)? || raw.cols() == 0 || raw.rows() == 0 {
            return Ok(None);
        }

        {
            let mut canvas = self.current.borrow_mut();
            let Canvas { display, roi } = &mut *canvas;
            imgproc::resize(&raw, display, self.size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
            imgproc::resize(&raw, roi, self.size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
        }

        self.dets.next_frame()
    }

    fn release(&mut self) {
        if let Err(err) = self.cam.release() {
            log::warn!("video release failed: {}", err);
        }
    }
}

struct WindowRenderer {
    current: Rc<RefCell<Canvas>>,
}

/// Blacks out every pixel of a packed 8-bit image outside the region.
fn mask_outside(img: &mut Mat, region: &Region) -> opencv::Result<()> {
    let shape = (
        img.rows() as usize,
        img.cols() as usize,
        img.channels() as usize,
    );

    match aview_mut1(img.data_bytes_mut()?).into_shape(shape) {
        Ok(pixels) => region.mask(pixels),
        Err(err) => log::warn!("roi mask skipped: {}", err),
    }

    Ok(())
}

fn pt(p: &nalgebra::Point2<f32>) -> core::Point {
    core::Point::new(p.x as i32, p.y as i32)
}

fn text(
    img: &mut Mat,
    s: &str,
    x: i32,
    y: i32,
    scale: f64,
    color: core::Scalar,
) -> opencv::Result<()> {
    imgproc::put_text(
        img,
        s,
        core::Point::new(x, y),
        imgproc::FONT_HERSHEY_SIMPLEX,
        scale,
        color,
        2,
        imgproc::LINE_8,
        false,
    )
}

fn draw_annotation(img: &mut Mat, ann: &Annotation) -> opencv::Result<()> {
    let green = core::Scalar::new(0.0, 255.0, 0.0, 0.0);
    let red = core::Scalar::new(0.0, 0.0, 255.0, 0.0);
    let b = ann.bbox.as_ltwh();

    imgproc::rectangle(
        img,
        core::Rect::new(b.left() as i32, b.top() as i32, b.width() as i32, b.height() as i32),
        green,
        2,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::circle(img, pt(&ann.centroid), 4, green, -1, imgproc::LINE_8, 0)?;

    let (x, y) = (b.left() as i32, b.top() as i32);
    text(img, &ann.label_text(), x, y - 20, 0.5, green)?;
    text(img, &ann.speed_text(), x, y - 5, 0.5, red)
}

impl WindowRenderer {
    fn draw(&mut self, report: &FrameReport) -> opencv::Result<Control> {
        let mut canvas = self.current.borrow_mut();
        let Canvas { display: img, roi } = &mut *canvas;
        let width = img.cols();

        mask_outside(roi, &report.region)?;
        highgui::imshow(ROI_WINDOW, &*roi)?;

        let poly: core::Vector<core::Point> = report.region.vertices().iter().map(pt).collect();
        imgproc::polylines(
            img,
            &poly,
            true,
            core::Scalar::new(0.0, 255.0, 255.0, 0.0),
            2,
            imgproc::LINE_8,
            0,
        )?;

        let line_y = report.line_y as i32;
        imgproc::line(
            img,
            core::Point::new(0, line_y),
            core::Point::new(width, line_y),
            core::Scalar::new(0.0, 0.0, 255.0, 0.0),
            2,
            imgproc::LINE_8,
            0,
        )?;

        for ann in &report.annotations {
            draw_annotation(img, ann)?;
        }

        let blue = core::Scalar::new(255.0, 0.0, 0.0, 0.0);
        text(img, &report.total_text(), 20, 40, 1.0, blue)?;
        text(img, &report.classes_text(), 20, 70, 0.7, blue)?;

        highgui::imshow(WINDOW, &*img)?;

        if highgui::wait_key(2)? & 0xFF == 'q' as i32 {
            return Ok(Control::Quit);
        }

        Ok(Control::Continue)
    }
}

impl Renderer for WindowRenderer {
    fn render(&mut self, report: &FrameReport) -> Control {
        match self.draw(report) {
            Ok(control) => control,
            Err(err) => {
                log::error!("frame {}: render failed: {}", report.frame_index, err);
                Control::Quit
            }
        }
    }

    fn release(&mut self) {
        if let Err(err) = highgui::destroy_all_windows() {
            log::warn!("window cleanup failed: {}", err);
        }
    }
}

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MeterConfig::from_file(path)?,
        None => MeterConfig::default(),
    };

    let video = args.video.to_string_lossy();
    let cam = videoio::VideoCapture::from_file(&video, videoio::CAP_ANY)?;
    if !cam.is_opened()? {
        log::error!("unable to open video source {}", video);
        return Ok(());
    }

    let (fw, fh) = config.frame_dims();
    let current = Rc::new(RefCell::new(Canvas::default()));
    let mut source = VideoSource {
        cam,
        dets: DumpSource::open(&args.dets, config.frame_dims())?,
        size: core::Size::new(fw as i32, fh as i32),
        current: current.clone(),
    };
    let mut renderer = WindowRenderer { current };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(err) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            log::warn!("Ctrl-C handler not installed: {}", err);
        }
    }

    let mut meter = TrafficMeter::new(&config)?;
    let mut sink = CsvFileSink::new(&config.csv_path);

    let summary = run(&mut meter, &mut source, &mut renderer, &mut sink, &stop);
    println!("End of video. {} frames", summary.frames);
    println!("Vehicle Count: {}", summary.counts.total);
    println!("{}", summary.counts);

    Ok(())
}
