use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use log::debug;

use super::{line::parse_sensor_line, SensorError, SensorEvent};

/// Where sensor lines come from.
#[derive(Clone, Debug, PartialEq)]
pub enum SensorSource {
    /// USB/serial bridge printing one line per channel change.
    Serial {
        port: String,
        baud: u32,
        read_timeout_ms: u64,
    },
    Stdin,
    /// Recorded trace; leading millisecond offsets are honoured.
    File { path: PathBuf },
}

impl fmt::Display for SensorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { port, baud, .. } => write!(f, "serial port {port} @ {baud}"),
            Self::Stdin => write!(f, "stdin"),
            Self::File { path } => write!(f, "trace file {}", path.display()),
        }
    }
}

impl SensorSource {
    /// Serial links are expected to come back after a disconnect; streams end.
    pub fn reconnects(&self) -> bool {
        matches!(self, Self::Serial { .. })
    }

    pub fn open(&self) -> Result<SensorReader, SensorError> {
        match self {
            Self::Serial {
                port,
                baud,
                read_timeout_ms,
            } => {
                let mut serial = serialport::new(port, *baud)
                    .timeout(Duration::from_millis(*read_timeout_ms))
                    .open()
                    .map_err(|e| SensorError::Open {
                        target: self.to_string(),
                        reason: e.to_string(),
                    })?;
                // Keep the control lines low so the bridge board is not reset on attach.
                let _ = serial.write_data_terminal_ready(false);
                let _ = serial.write_request_to_send(false);
                Ok(SensorReader::new(Box::new(BufReader::new(serial)), false))
            }
            Self::Stdin => Ok(SensorReader::new(
                Box::new(BufReader::new(io::stdin())),
                false,
            )),
            Self::File { path } => {
                let file = File::open(path).map_err(|e| SensorError::Open {
                    target: self.to_string(),
                    reason: e.to_string(),
                })?;
                Ok(SensorReader::new(Box::new(BufReader::new(file)), true))
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReadOutcome {
    Event(SensorEvent),
    /// Nothing arrived within the link's read timeout.
    Idle,
    EndOfStream,
}

pub struct SensorReader {
    reader: Box<dyn BufRead + Send>,
    paced: bool,
    opened_at: Instant,
    /// Bytes of the line being assembled; survives read timeouts.
    line: Vec<u8>,
}

impl SensorReader {
    pub fn new(reader: Box<dyn BufRead + Send>, paced: bool) -> Self {
        Self {
            reader,
            paced,
            opened_at: Instant::now(),
            line: Vec::new(),
        }
    }

    /// Reads until one event, a read timeout, or end of stream. Malformed
    /// lines, including ones that are not UTF-8, come back as
    /// `SensorError::Parse` and leave the reader usable.
    pub fn next_event(&mut self) -> Result<ReadOutcome, SensorError> {
        loop {
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) if self.line.is_empty() => return Ok(ReadOutcome::EndOfStream),
                Ok(_) => {}
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    return Ok(ReadOutcome::Idle);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }

            let bytes = std::mem::take(&mut self.line);
            let line = String::from_utf8(bytes).map_err(|err| SensorError::Parse {
                line: String::from_utf8_lossy(err.as_bytes()).trim_end().to_string(),
                reason: "not valid UTF-8".to_string(),
            })?;

            debug!("sensor line: {}", line.trim_end());
            let Some(parsed) = parse_sensor_line(&line)? else {
                continue;
            };
            if let (true, Some(offset_ms)) = (self.paced, parsed.offset_ms) {
                let due = self
                    .opened_at
                    .checked_add(Duration::from_millis(offset_ms));
                let now = Instant::now();
                if let Some(due) = due.filter(|due| *due > now) {
                    thread::sleep(due - now);
                }
            }
            return Ok(ReadOutcome::Event(parsed.event));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn reader(text: &str) -> SensorReader {
        SensorReader::new(Box::new(Cursor::new(text.as_bytes().to_vec())), false)
    }

    #[test]
    fn yields_events_and_skips_comments() {
        let mut reader = reader("# bridge v2\nain,0,410\n\ndin,7,0\n");

        assert_eq!(
            reader.next_event().unwrap(),
            ReadOutcome::Event(SensorEvent::AnalogChanged {
                index: 0,
                value: 410.0
            })
        );
        assert_eq!(
            reader.next_event().unwrap(),
            ReadOutcome::Event(SensorEvent::DigitalChanged {
                index: 7,
                state: false
            })
        );
        assert_eq!(reader.next_event().unwrap(), ReadOutcome::EndOfStream);
    }

    #[test]
    fn malformed_line_does_not_poison_reader() {
        let mut reader = reader("ain,0,abc\nain,0,5\n");

        assert!(matches!(
            reader.next_event(),
            Err(SensorError::Parse { .. })
        ));
        assert_eq!(
            reader.next_event().unwrap(),
            ReadOutcome::Event(SensorEvent::AnalogChanged {
                index: 0,
                value: 5.0
            })
        );
    }

    #[test]
    fn non_utf8_line_is_skipped_as_malformed() {
        let bytes = b"ain,0,320\n\xff\xfe\nain,0,330\n".to_vec();
        let mut reader = SensorReader::new(Box::new(Cursor::new(bytes)), false);

        assert_eq!(
            reader.next_event().unwrap(),
            ReadOutcome::Event(SensorEvent::AnalogChanged {
                index: 0,
                value: 320.0
            })
        );
        assert!(matches!(
            reader.next_event(),
            Err(SensorError::Parse { .. })
        ));
        assert_eq!(
            reader.next_event().unwrap(),
            ReadOutcome::Event(SensorEvent::AnalogChanged {
                index: 0,
                value: 330.0
            })
        );
        assert_eq!(reader.next_event().unwrap(), ReadOutcome::EndOfStream);
    }

    /// Serves scripted chunks, standing in for a serial port that times out
    /// halfway through a line.
    struct ChunkedLink {
        chunks: Vec<io::Result<Vec<u8>>>,
    }

    impl io::Read for ChunkedLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0)?;
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn timeout_mid_line_keeps_the_partial_line() {
        let link = ChunkedLink {
            chunks: vec![
                Ok(b"ain,0,".to_vec()),
                Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
                Ok(b"410\n".to_vec()),
            ],
        };
        let mut reader = SensorReader::new(Box::new(BufReader::new(link)), false);

        assert_eq!(reader.next_event().unwrap(), ReadOutcome::Idle);
        assert_eq!(
            reader.next_event().unwrap(),
            ReadOutcome::Event(SensorEvent::AnalogChanged {
                index: 0,
                value: 410.0
            })
        );
        assert_eq!(reader.next_event().unwrap(), ReadOutcome::EndOfStream);
    }

    #[test]
    fn missing_trace_file_fails_to_open() {
        let source = SensorSource::File {
            path: PathBuf::from("/nonexistent/millwatch/trace.csv"),
        };
        assert!(matches!(source.open(), Err(SensorError::Open { .. })));
        assert!(!source.reconnects());
    }
}
