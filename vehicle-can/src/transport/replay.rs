//! candump log replay
//!
//! Replays frames recorded by `candump -l` (or `candump -L`), one per line:
//!
//! ```text
//! (1436509052.249713) can0 03B#006400C8
//! (1436509052.251002) can0 12345678#R2
//! ```
//!
//! The timestamp and interface columns are optional. Blank lines and lines
//! starting with `#` are skipped; lines that cannot be parsed are skipped with
//! a warning. CAN FD frames (`##`) are not supported.

use super::FrameTransport;
use crate::types::{CanFrame, Result, Timestamp, TransportError, MAX_DATA_LENGTH, MAX_STANDARD_ID};
use chrono::DateTime;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

/// One line of a candump log
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub timestamp: Option<Timestamp>,
    pub interface: Option<String>,
    pub frame: CanFrame,
}

/// Parse one candump log line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_candump_line(line: &str) -> Result<Option<RecordedFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut timestamp = None;
    let mut interface = None;
    let mut frame = None;
    for token in line.split_whitespace() {
        if let Some(inner) = token.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            timestamp = Some(parse_timestamp(inner)?);
        } else if token.contains('#') {
            frame = Some(parse_frame(token)?);
        } else if frame.is_none() {
            interface = Some(token.to_string());
        }
    }

    match frame {
        Some(frame) => Ok(Some(RecordedFrame {
            timestamp,
            interface,
            frame,
        })),
        None => Err(invalid(format!("no frame in line: {}", line))),
    }
}

fn invalid(message: String) -> TransportError {
    TransportError::InvalidFrame(message)
}

fn parse_timestamp(text: &str) -> Result<Timestamp> {
    let (secs, fraction) = text.split_once('.').unwrap_or((text, ""));
    let secs: i64 = secs
        .parse()
        .map_err(|_| invalid(format!("bad timestamp: {}", text)))?;

    if fraction.len() > 9 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid(format!("bad timestamp: {}", text)));
    }
    let nanos = if fraction.is_empty() {
        0
    } else {
        // "249713" -> 249_713_000 ns
        let digits: u32 = fraction
            .parse()
            .map_err(|_| invalid(format!("bad timestamp: {}", text)))?;
        digits * 10u32.pow(9 - fraction.len() as u32)
    };

    DateTime::from_timestamp(secs, nanos).ok_or_else(|| invalid(format!("bad timestamp: {}", text)))
}

fn parse_frame(token: &str) -> Result<CanFrame> {
    let (id_text, payload) = token
        .split_once('#')
        .ok_or_else(|| invalid(format!("bad frame: {}", token)))?;

    if payload.starts_with('#') {
        return Err(invalid(format!("CAN FD frames are not supported: {}", token)));
    }

    let id = u32::from_str_radix(id_text, 16)
        .map_err(|_| invalid(format!("bad identifier: {}", token)))?;
    // candump writes 3 hex digits for standard ids and 8 for extended ones
    let is_extended = id_text.len() > 3 || id > MAX_STANDARD_ID;

    if let Some(dlc) = payload.strip_prefix('R').or_else(|| payload.strip_prefix('r')) {
        let dlc = if dlc.is_empty() {
            0
        } else {
            dlc.parse::<u8>()
                .map_err(|_| invalid(format!("bad remote length: {}", token)))?
        };
        let mut frame = CanFrame::new_remote(id, dlc)
            .ok_or_else(|| invalid(format!("bad remote frame: {}", token)))?;
        frame.is_extended = is_extended;
        return Ok(frame);
    }

    let hex: String = payload.chars().filter(|c| *c != '.').collect();
    if hex.len() % 2 != 0 || hex.len() / 2 > MAX_DATA_LENGTH {
        return Err(invalid(format!("bad payload: {}", token)));
    }
    let mut data = [0u8; MAX_DATA_LENGTH];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let pair = std::str::from_utf8(chunk).map_err(|_| invalid(format!("bad payload: {}", token)))?;
        data[i] = u8::from_str_radix(pair, 16)
            .map_err(|_| invalid(format!("bad payload: {}", token)))?;
    }

    let mut frame = CanFrame::new(id, &data[..hex.len() / 2])
        .ok_or_else(|| invalid(format!("bad frame: {}", token)))?;
    frame.is_extended = is_extended;
    Ok(frame)
}

/// Replays a candump log as a frame source
pub struct ReplayTransport<R> {
    name: String,
    reader: R,
    /// Raw bytes of the current line
    buffer: Vec<u8>,
    line_number: usize,
    realtime: bool,
    /// First recorded timestamp and the instant it was replayed
    anchor: Option<(Timestamp, Instant)>,
}

impl ReplayTransport<BufReader<File>> {
    /// Open a candump log file
    pub fn open(path: &Path) -> Result<Self> {
        log::info!("Opening candump log: {:?}", path);
        let file = File::open(path)?;
        Ok(Self::from_reader(
            path.display().to_string(),
            BufReader::new(file),
        ))
    }
}

impl<R: BufRead> ReplayTransport<R> {
    pub fn from_reader(name: impl Into<String>, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            buffer: Vec::new(),
            line_number: 0,
            realtime: false,
            anchor: None,
        }
    }

    /// Builder method: wait between frames as long as the recording did
    pub fn with_realtime(mut self, enabled: bool) -> Self {
        self.realtime = enabled;
        self
    }

    fn pace(&mut self, timestamp: Timestamp) {
        let Some((first, started)) = self.anchor else {
            self.anchor = Some((timestamp, Instant::now()));
            return;
        };

        let offset = (timestamp - first).to_std().unwrap_or(Duration::ZERO);
        let due = started + offset;
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl<R: BufRead + Send> FrameTransport for ReplayTransport<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&mut self) -> Result<Option<CanFrame>> {
        loop {
            self.buffer.clear();
            if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
                log::debug!("End of {} after {} lines", self.name, self.line_number);
                return Err(TransportError::Closed);
            }
            self.line_number += 1;

            // non-UTF-8 bytes become U+FFFD and the line fails to parse
            let line = String::from_utf8_lossy(&self.buffer).into_owned();

            match parse_candump_line(&line) {
                Ok(Some(record)) => {
                    if self.realtime {
                        if let Some(timestamp) = record.timestamp {
                            self.pace(timestamp);
                        }
                    }
                    return Ok(Some(record.frame));
                }
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("{}:{}: {}", self.name, self.line_number, e);
                    continue;
                }
            }
        }
    }

    fn send(&mut self, frame: &CanFrame) -> bool {
        log::trace!("Replay {} discards outgoing frame {}", self.name, frame);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_full_line() {
        let record = parse_candump_line("(1436509052.249713) vcan0 03B#006400C8")
            .unwrap()
            .unwrap();
        assert_eq!(record.interface.as_deref(), Some("vcan0"));
        assert_eq!(record.frame.id, 0x3B);
        assert_eq!(record.frame.data(), &[0x00, 0x64, 0x00, 0xC8]);
        assert!(!record.frame.is_extended);

        let ts = record.timestamp.unwrap();
        assert_eq!(ts.timestamp(), 1436509052);
        assert_eq!(ts.timestamp_subsec_nanos(), 249_713_000);
    }

    #[test]
    fn test_parse_bare_frame() {
        let record = parse_candump_line("0B4#0000000000138800").unwrap().unwrap();
        assert!(record.timestamp.is_none());
        assert!(record.interface.is_none());
        assert_eq!(record.frame.be_u16(5), 0x1388);
    }

    #[test]
    fn test_parse_extended_and_remote() {
        let record = parse_candump_line("can0 0000003B#R2").unwrap().unwrap();
        assert!(record.frame.is_extended);
        assert!(record.frame.is_remote);
        assert_eq!(record.frame.id, 0x3B);
        assert_eq!(record.frame.len, 2);

        let record = parse_candump_line("can0 12345678#DE.AD").unwrap().unwrap();
        assert!(record.frame.is_extended);
        assert_eq!(record.frame.data(), &[0xDE, 0xAD]);
    }

    #[test]
    fn test_parse_skips_and_rejects() {
        assert!(parse_candump_line("").unwrap().is_none());
        assert!(parse_candump_line("# comment").unwrap().is_none());
        assert!(parse_candump_line("can0 03B#0").is_err());
        assert!(parse_candump_line("can0 03B#001122334455667788").is_err());
        assert!(parse_candump_line("can0 03B##1001122").is_err());
        assert!(parse_candump_line("can0 XYZ#00").is_err());
        assert!(parse_candump_line("(abc) can0 03B#00").is_err());
        assert!(parse_candump_line("can0").is_err());
    }

    #[test]
    fn test_replay_until_closed() {
        let log = "\
(0.000000) can0 030#0000000040000000
garbage line
# comment

(0.010000) can0 03B#006400C8
";
        let mut replay = ReplayTransport::from_reader("test", Cursor::new(log));
        assert_eq!(replay.name(), "test");

        let first = replay.receive().unwrap().unwrap();
        assert_eq!(first.id, 0x30);
        let second = replay.receive().unwrap().unwrap();
        assert_eq!(second.id, 0x3B);
        assert!(matches!(replay.receive(), Err(TransportError::Closed)));
        assert!(replay.send(&first));
    }

    #[test]
    fn test_replay_skips_binary_garbage() {
        let mut log = b"030#0000000040000000\n".to_vec();
        log.extend_from_slice(&[0xFF, 0xFE, b'\n']);
        log.extend_from_slice(b"03B#006400C8\n");

        let mut replay = ReplayTransport::from_reader("damaged", Cursor::new(log));
        assert_eq!(replay.receive().unwrap().unwrap().id, 0x30);
        assert_eq!(replay.receive().unwrap().unwrap().id, 0x3B);
        assert!(matches!(replay.receive(), Err(TransportError::Closed)));
        assert_eq!(replay.line_number, 3);
    }

    #[test]
    fn test_realtime_pacing_waits() {
        let log = "(10.000000) can0 030#00\n(10.050000) can0 030#01\n";
        let mut replay =
            ReplayTransport::from_reader("paced", Cursor::new(log)).with_realtime(true);

        let started = Instant::now();
        replay.receive().unwrap();
        replay.receive().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_open_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(1.0) can0 52C#0050").unwrap();
        let mut replay = ReplayTransport::open(file.path()).unwrap();
        let frame = replay.receive().unwrap().unwrap();
        assert_eq!(frame.byte(1), 0x50);
    }
}
