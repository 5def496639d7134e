//! Record sources.
//!
//! A record source supplies an ordered, finite sequence of timestamped byte
//! records. The only production implementation reads capture files through
//! libpcap; `MemorySource` feeds synthetic records to tests.

use std::path::Path;

use pcap::{Capture, Offline};

use crate::error::{Error, Result};

/// One captured record: raw bytes and the capture timestamp in fractional
/// seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub data: Vec<u8>,
    pub timestamp: f64,
}

/// An ordered, finite stream of records.
pub trait RecordSource {
    /// Identifier handed to `begin` (the file path, or `-` for stdin).
    fn name(&self) -> &str;

    /// Link-layer type name handed to `begin`.
    fn link_type(&self) -> String;

    /// Next record in source order; `None` on end of stream. Read failures
    /// are fatal for the run.
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// Offline capture file (or stdin via `-`) read through libpcap.
pub struct PcapFileSource {
    name: String,
    capture: Capture<Offline>,
}

impl std::fmt::Debug for PcapFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcapFileSource")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl PcapFileSource {
    /// Open a capture file. A filter expression, when given, is compiled and
    /// applied before the first record is read; any failure is fatal.
    pub fn open(path: &str, filter: Option<&str>) -> Result<Self> {
        let mut capture = Capture::from_file(Path::new(path)).map_err(|e| Error::CaptureOpen {
            path: path.to_string(),
            message: e.to_string(),
        })?;

        if let Some(expr) = filter {
            capture.filter(expr, true).map_err(|e| Error::Filter {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        }

        Ok(Self {
            name: path.to_string(),
            capture,
        })
    }
}

impl RecordSource for PcapFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn link_type(&self) -> String {
        let link = self.capture.get_datalink();
        link.get_name().unwrap_or_else(|_| format!("DLT{}", link.0))
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let ts = &packet.header.ts;
                let timestamp = ts.tv_sec as f64 + ts.tv_usec as f64 / 1_000_000.0;
                Ok(Some(Record {
                    data: packet.data.to_vec(),
                    timestamp,
                }))
            }
            Err(pcap::Error::NoMorePackets) => Ok(None),
            Err(e) => Err(Error::CaptureRead {
                path: self.name.clone(),
                message: e.to_string(),
            }),
        }
    }
}

/// In-memory record source for tests.
pub struct MemorySource {
    name: String,
    link: String,
    records: std::vec::IntoIter<Record>,
}

impl MemorySource {
    pub fn new(name: &str, link: &str, records: Vec<Record>) -> Self {
        Self {
            name: name.to_string(),
            link: link.to_string(),
            records: records.into_iter(),
        }
    }
}

impl RecordSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn link_type(&self) -> String {
        self.link.clone()
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(self.records.next())
    }
}
