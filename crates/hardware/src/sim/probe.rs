//! Per-request analysis probe.
//!
//! When attached, every request completed by the main memory is
//! appended as one CSV line for off-line analysis: array coordinates,
//! access kind, queue arrival, begin and end of execution, and the
//! OrderID the request held when it was issued.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::common::Request;
use crate::common::request::AccessKind;
use crate::pcm::Field;

/// CSV sink for completed memory requests.
pub struct RequestProbe {
    out: BufWriter<File>,
}

impl RequestProbe {
    /// Creates the output file and writes the column header.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    pub fn create(path: &Path) -> io::Result<Self> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(
            out,
            "Channel,Rank,Bank,Type,Queue Arrival,Begin Execution,End Execution,OrderID"
        )?;
        Ok(Self { out })
    }

    /// Appends one completed request.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    pub fn record(&mut self, req: &Request) -> io::Result<()> {
        let kind = match req.kind {
            AccessKind::Read => 'R',
            AccessKind::Write | AccessKind::WriteBack => 'W',
        };
        writeln!(
            self.out,
            "{},{},{},{},{},{},{},{}",
            req.addr_vec.field(Field::Channel),
            req.addr_vec.field(Field::Rank),
            req.addr_vec.field(Field::Bank),
            kind,
            req.queue_arrival,
            req.begin_exe,
            req.end_exe,
            req.order_id
        )
    }

    /// Flushes buffered lines to disk.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
