//! Reporting sinks.
//!
//! A sink consumes a finished [`BatchReport`]. Sinks run after the batch and
//! their failures are logged only: a broken export never loses the results
//! already computed.

pub mod console;
pub mod export;

use anyhow::Result;
use tracing::{debug, warn};

use crate::engine::batch::BatchReport;

pub use console::ConsoleSink;
pub use export::{CsvSink, JsonSink};

pub trait ReportSink: Send + Sync {
    fn emit(&self, report: &BatchReport) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Emit to every sink in order. Returns how many succeeded.
pub fn emit_all(sinks: &[Box<dyn ReportSink>], report: &BatchReport) -> usize {
    let mut ok = 0;
    for sink in sinks {
        match sink.emit(report) {
            Ok(()) => {
                debug!(sink = sink.name(), "Report emitted");
                ok += 1;
            }
            Err(e) => warn!(sink = sink.name(), error = %e, "Report sink failed"),
        }
    }
    ok
}
