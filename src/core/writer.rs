//! Sinks for flushed batches.

use std::collections::HashMap;
use std::io::Write;

use parking_lot::Mutex;
use serde::Serialize;

use crate::core::error::DeliveryError;
use crate::core::record::Record;

/// Destination for flushed batches.
///
/// `deliver` is called from the delivery loop, one batch at a time, on
/// tokio's blocking pool. Implementations may block but must not spawn
/// unbounded background work. Failures are reported, never retried here.
pub trait RemoteWriter: Send + Sync + 'static {
    fn deliver(&self, records: &[Record]) -> Result<(), DeliveryError>;
}

impl<F> RemoteWriter for F
where
    F: Fn(&[Record]) -> Result<(), DeliveryError> + Send + Sync + 'static,
{
    fn deliver(&self, records: &[Record]) -> Result<(), DeliveryError> {
        self(records)
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    time: u64,
    #[serde(flatten)]
    attributes: &'a HashMap<String, String>,
}

/// Writes one JSON object per record and flushes the underlying writer after each batch.
#[derive(Debug)]
pub struct JsonLinesWriter<W> {
    out: Mutex<W>,
}

impl<W> JsonLinesWriter<W>
where
    W: Write + Send + 'static,
{
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W> RemoteWriter for JsonLinesWriter<W>
where
    W: Write + Send + 'static,
{
    fn deliver(&self, records: &[Record]) -> Result<(), DeliveryError> {
        let mut out = self.out.lock();
        for record in records {
            let line = JsonLine {
                time: record.unix_millis(),
                attributes: record.attributes(),
            };
            serde_json::to_writer(&mut *out, &line)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}
