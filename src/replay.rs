use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::detection::Detection;
use crate::error::Error;
use crate::{Frame, TrackSource};

/// Parses one dump line of the form `<timestamp seconds>:<json array of detections>`.
pub fn parse_line(line: &str, line_no: usize) -> Result<(f64, Vec<Detection>), Error> {
    let Some(idx) = line.find(':') else {
        return Err(Error::Format {
            line: line_no,
            reason: "expected `:`".into(),
        });
    };

    let (ts, vector) = line.split_at(idx);
    let ts: f64 = ts.trim().parse().map_err(|_| Error::Format {
        line: line_no,
        reason: format!("bad timestamp `{}`", ts.trim()),
    })?;

    let detections = serde_json::from_str(&vector[1..]).map_err(|err| Error::Format {
        line: line_no,
        reason: err.to_string(),
    })?;

    Ok((ts, detections))
}

/// Replays tracked detections recorded by an external detector/tracker run.
///
/// Every dump line is one video frame. A line that cannot be decoded or
/// parsed is logged and replayed as a frame without detections at the last
/// good timestamp, so a paired video stays aligned with the dump.
pub struct DumpSource<R> {
    reader: R,
    buf: Vec<u8>,
    dims: (u32, u32),
    line_no: usize,
    last_ts: f64,
    skipped: usize,
}

impl DumpSource<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, dims: (u32, u32)) -> Result<Self, Error> {
        let file = File::open(path)?;

        Ok(Self::new(BufReader::new(file), dims))
    }
}

impl<R: BufRead> DumpSource<R> {
    pub fn new(reader: R, dims: (u32, u32)) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            dims,
            line_no: 0,
            last_ts: 0.0,
            skipped: 0,
        }
    }

    /// Lines replayed as empty frames so far.
    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn parse_current(&self) -> Result<(f64, Vec<Detection>), Error> {
        let line = std::str::from_utf8(&self.buf).map_err(|err| Error::Format {
            line: self.line_no,
            reason: err.to_string(),
        })?;

        if line.trim().is_empty() {
            return Err(Error::Format {
                line: self.line_no,
                reason: "empty line".into(),
            });
        }

        parse_line(line.trim_end(), self.line_no)
    }
}

impl<R: BufRead> TrackSource for DumpSource<R> {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;

        let detections = match self.parse_current() {
            Ok((ts, detections)) => {
                self.last_ts = ts;
                detections
            }
            Err(err) => {
                self.skipped += 1;
                log::warn!("wrong file format: {}", err);
                Vec::new()
            }
        };

        Ok(Some(Frame::new(self.dims, self.last_ts, detections)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn every_line_is_a_frame() {
        let dump = "\
0.0:[{\"id\": 7, \"bbox\": [90, 90, 110, 110], \"c\": \"car\", \"p\": 0.8}]
not a frame

0.04:[]
0.08:{oops}
0.12:[{\"id\": 7, \"bbox\": [90, 140, 110, 160], \"c\": \"car\"}]
";
        let mut source = DumpSource::new(Cursor::new(dump), (640, 480));

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.timestamp, 0.0);
        assert_eq!(first.dims, (640, 480));
        assert_eq!(first.detections[0].track_id, 7);
        assert_eq!(first.detections[0].confidence, 0.8);

        let mut rest = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            rest.push((frame.timestamp, frame.len()));
        }

        assert_eq!(
            rest,
            vec![(0.0, 0), (0.0, 0), (0.04, 0), (0.04, 0), (0.12, 1)]
        );
        assert_eq!(source.skipped(), 3);
    }

    #[test]
    fn invalid_utf8_line_does_not_end_replay() {
        let mut dump = b"0.0:[]\n0.5:[\"".to_vec();
        dump.push(0xff);
        dump.extend_from_slice(b"\"]\n1.0:[]\n2.0:[]");

        let mut source = DumpSource::new(Cursor::new(dump), (640, 480));
        let mut stamps = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            stamps.push(frame.timestamp);
        }

        assert_eq!(stamps, vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(source.skipped(), 1);
    }

    #[test]
    fn parse_errors_carry_line_number() {
        match parse_line("abc:[]", 4) {
            Err(Error::Format { line, .. }) => assert_eq!(line, 4),
            other => panic!("unexpected {:?}", other),
        }
    }
}
