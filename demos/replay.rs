use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use vehicle_meter::replay::DumpSource;
use vehicle_meter::sink::CsvFileSink;
use vehicle_meter::{run, Control, FrameReport, MeterConfig, Renderer, TrafficMeter};

#[derive(Parser, Debug)]
#[command(name = "replay", about = "Replay tracked detections through the vehicle meter")]
struct Args {
    /// Detections dump, one `<ts>:<json>` line per frame
    dets: PathBuf,
    /// TOML config, defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides `csv_path` from the config
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Log overlay text every N frames
    #[arg(long, default_value_t = 25)]
    every: u64,
}

struct LogRenderer {
    every: u64,
}

impl Renderer for LogRenderer {
    fn render(&mut self, report: &FrameReport) -> Control {
        for ann in report.annotations.iter().filter(|a| a.counted_now) {
            log::info!(
                "frame {}: {} crossed, {}",
                report.frame_index,
                ann.label_text(),
                ann.speed_text()
            );
        }

        if self.every > 0 && report.frame_index % self.every == 0 {
            log::info!(
                "frame {} @ {:.2}s: {} | {}",
                report.frame_index,
                report.timestamp,
                report.total_text(),
                report.classes_text()
            );
        }

        Control::Continue
    }
}

fn main() -> Result<(), vehicle_meter::error::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => MeterConfig::from_file(path)?,
        None => MeterConfig::default(),
    };
    if let Some(csv) = args.csv {
        config.csv_path = csv;
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(err) = ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed)) {
            log::warn!("Ctrl-C handler not installed: {}", err);
        }
    }

    let mut meter = TrafficMeter::new(&config)?;
    let mut source = DumpSource::open(&args.dets, config.frame_dims())?;
    let mut sink = CsvFileSink::new(&config.csv_path);
    let mut renderer = LogRenderer { every: args.every };

    log::info!(
        "replaying {} into {}",
        args.dets.display(),
        config.csv_path.display()
    );

    let summary = run(&mut meter, &mut source, &mut renderer, &mut sink, &stop);

    println!("frames: {}", summary.frames);
    println!("Vehicle Count: {}", summary.counts.total);
    println!("{}", summary.counts);
    println!("tracks with speed: {}", summary.tracks_with_speed);
    if source.skipped() > 0 {
        println!("skipped lines: {}", source.skipped());
    }

    Ok(())
}
