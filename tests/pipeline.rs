use std::sync::atomic::{AtomicBool, Ordering};

use vehicle_meter::bbox::BBox;
use vehicle_meter::error::Error;
use vehicle_meter::meter::StopReason;
use vehicle_meter::replay::DumpSource;
use vehicle_meter::sink::{CsvFileSink, SpeedSink};
use vehicle_meter::speed::SpeedTable;
use vehicle_meter::{
    run, Control, Detection, Frame, FrameReport, Frames, MeterConfig, TrackSource, TrafficMeter,
    VehicleClass,
};

fn full_frame() -> MeterConfig {
    MeterConfig {
        region: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
        count_line: 0.25,
        ..MeterConfig::default()
    }
}

fn det(id: u32, label: &str, cx: f32, cy: f32) -> Detection {
    Detection::new(id, label, BBox::ltrb(cx - 8.0, cy - 8.0, cx + 8.0, cy + 8.0))
}

fn frame(ts: f64, dets: Vec<Detection>) -> Frame {
    Frame::new((640, 480), ts, dets)
}

#[derive(Default)]
struct MemorySink {
    writes: usize,
    last: Vec<(u32, String)>,
}

impl SpeedSink for MemorySink {
    fn rewrite(&mut self, records: &SpeedTable) -> Result<(), Error> {
        self.writes += 1;
        self.last = records
            .iter()
            .map(|(id, r)| (*id, format!("{:.2}", r.value())))
            .collect();
        Ok(())
    }
}

struct FailingSink;

impl SpeedSink for FailingSink {
    fn rewrite(&mut self, _records: &SpeedTable) -> Result<(), Error> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only",
        )))
    }
}

fn keep_going(_: &FrameReport) -> Control {
    Control::Continue
}

#[test]
fn end_to_end_car_is_counted_once_and_persisted() {
    let cfg = full_frame();
    let mut meter = TrafficMeter::new(&cfg).unwrap();

    // crosses y=120 at frame 2, stays past it for five more frames
    let mut frames = vec![
        frame(0.0, vec![det(7, "car", 100.0, 100.0)]),
        frame(1.0, vec![det(7, "car", 100.0, 150.0)]),
    ];
    for i in 0..5 {
        let ts = 2.0 + i as f64;
        frames.push(frame(ts, vec![det(7, "car", 100.0, 150.0 + 10.0 * (i + 1) as f32)]));
    }

    let mut counted_at = Vec::new();
    let mut renderer = |report: &FrameReport| {
        if report.annotations.iter().any(|a| a.counted_now) {
            counted_at.push(report.frame_index);
        }
        Control::Continue
    };

    let mut sink = MemorySink::default();
    let stop = AtomicBool::new(false);
    let summary = run(
        &mut meter,
        &mut Frames(frames.into_iter()),
        &mut renderer,
        &mut sink,
        &stop,
    );

    assert_eq!(counted_at, vec![2]);
    assert_eq!(summary.frames, 7);
    assert_eq!(summary.stop, StopReason::EndOfStream);
    assert_eq!(summary.counts.total, 1);
    assert_eq!(summary.counts.get(VehicleClass::Car), 1);
    assert_eq!(summary.sink_failures, 0);
    assert_eq!(sink.writes, 7);

    // samples: 90, then five 18 km/h steps
    let expected = (90.0 + 5.0 * 18.0) / 6.0;
    assert_eq!(sink.last, vec![(7, format!("{:.2}", expected))]);
}

#[test]
fn sink_holds_exactly_tracks_with_samples() {
    let mut meter = TrafficMeter::new(&full_frame()).unwrap();
    let frames = vec![
        frame(0.0, vec![det(1, "car", 50.0, 50.0), det(2, "truck", 300.0, 50.0)]),
        frame(0.5, vec![det(1, "car", 50.0, 60.0), det(3, "bus", 400.0, 60.0)]),
        frame(1.0, vec![det(2, "truck", 300.0, 70.0), det(4, "person", 10.0, 10.0)]),
        frame(1.5, vec![det(5, "motorcycle", 200.0, 200.0)]),
    ];

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vehicle_speeds.csv");
    let mut sink = CsvFileSink::new(&path);
    let stop = AtomicBool::new(false);

    let summary = run(
        &mut meter,
        &mut Frames(frames.into_iter()),
        &mut keep_going,
        &mut sink,
        &stop,
    );

    assert_eq!(summary.tracks_with_speed, 2);
    assert_eq!(summary.counts.get(VehicleClass::Motorcycle), 1);

    // track 1: 10 px in 0.5 s -> 36 km/h, track 2: 20 px in 1 s -> 36 km/h
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Vehicle ID,Speed (km/h)\n1,36.00\n2,36.00\n"
    );
}

#[test]
fn sink_failure_does_not_stop_the_loop() {
    let mut meter = TrafficMeter::new(&full_frame()).unwrap();
    let frames = (0..4).map(|i| frame(i as f64, vec![det(1, "car", 10.0, 10.0 * i as f32 + 10.0)]));
    let stop = AtomicBool::new(false);

    let summary = run(
        &mut meter,
        &mut Frames(frames),
        &mut keep_going,
        &mut FailingSink,
        &stop,
    );

    assert_eq!(summary.frames, 4);
    assert_eq!(summary.sink_failures, 4);
    assert_eq!(summary.stop, StopReason::EndOfStream);
}

#[test]
fn quit_and_interrupt_are_checked_between_frames() {
    let frames = || (0..10).map(|i| frame(i as f64, vec![det(1, "car", 10.0, 10.0)]));
    let stop = AtomicBool::new(false);

    let mut meter = TrafficMeter::new(&full_frame()).unwrap();
    let mut quit_on_third = |report: &FrameReport| {
        if report.frame_index == 3 {
            Control::Quit
        } else {
            Control::Continue
        }
    };
    let summary = run(
        &mut meter,
        &mut Frames(frames()),
        &mut quit_on_third,
        &mut MemorySink::default(),
        &stop,
    );
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.stop, StopReason::Quit);

    let mut meter = TrafficMeter::new(&full_frame()).unwrap();
    let stop_flag = &stop;
    let mut interrupt_on_second = |report: &FrameReport| {
        if report.frame_index == 2 {
            stop_flag.store(true, Ordering::Relaxed);
        }
        Control::Continue
    };
    let summary = run(
        &mut meter,
        &mut Frames(frames()),
        &mut interrupt_on_second,
        &mut MemorySink::default(),
        &stop,
    );
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.stop, StopReason::Interrupted);
}

struct BrokenSource {
    served: usize,
    released: bool,
}

impl TrackSource for BrokenSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        if self.served == 2 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stream stalled",
            )));
        }

        self.served += 1;
        Ok(Some(frame(self.served as f64, Vec::new())))
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[test]
fn source_failure_ends_run_and_releases_source() {
    let mut meter = TrafficMeter::new(&full_frame()).unwrap();
    let mut source = BrokenSource {
        served: 0,
        released: false,
    };
    let stop = AtomicBool::new(false);

    let summary = run(
        &mut meter,
        &mut source,
        &mut keep_going,
        &mut MemorySink::default(),
        &stop,
    );

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.stop, StopReason::SourceFailed);
    assert!(source.released);
}

#[test]
fn replayed_dump_feeds_the_meter() {
    let dump = "\
0.0:[{\"id\": 7, \"bbox\": [92, 92, 108, 108], \"c\": \"car\"}, {\"id\": 8, \"bbox\": [0, 0, 4, 4], \"c\": \"bicycle\"}]
1.0:[{\"id\": 7, \"bbox\": [92, 142, 108, 158], \"c\": \"car\"}]
";
    let mut meter = TrafficMeter::new(&full_frame()).unwrap();
    let mut source = DumpSource::new(std::io::Cursor::new(dump), (640, 480));
    let mut sink = MemorySink::default();
    let stop = AtomicBool::new(false);

    let summary = run(&mut meter, &mut source, &mut keep_going, &mut sink, &stop);

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.counts.total, 1);
    assert_eq!(sink.last, vec![(7, "90.00".to_string())]);
}

#[test]
fn undecodable_dump_line_keeps_the_run_going() {
    let mut dump = b"0.0:[]\n0.5:[\"".to_vec();
    dump.push(0xff);
    dump.extend_from_slice(b"\"]\n1.0:[]\n2.0:[]\n");

    let mut meter = TrafficMeter::new(&full_frame()).unwrap();
    let mut source = DumpSource::new(std::io::Cursor::new(dump), (640, 480));
    let stop = AtomicBool::new(false);

    let summary = run(
        &mut meter,
        &mut source,
        &mut keep_going,
        &mut MemorySink::default(),
        &stop,
    );

    assert_eq!(summary.frames, 4);
    assert_eq!(summary.stop, StopReason::EndOfStream);
    assert_eq!(source.skipped(), 1);
}
