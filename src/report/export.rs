//! File exports: one CSV per dividend basis, or the whole report as JSON.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::ReportSink;
use crate::engine::batch::{BatchReport, BasisReport};

// ─── CSV ────────────────────────────────────────────────────────────

/// Render one basis as CSV.
///
/// Columns: name, ticker, price, roe, pb, annual_dividend,
/// interim_dividend, dividend_per_share, f1_pct, f2_pct, note, provenance
pub fn export_section_csv(section: &BasisReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "name",
        "ticker",
        "price",
        "roe",
        "pb",
        "annual_dividend",
        "interim_dividend",
        "dividend_per_share",
        "f1_pct",
        "f2_pct",
        "note",
        "provenance",
    ])?;

    for r in &section.results {
        wtr.write_record([
            r.name.clone(),
            r.ticker.to_string(),
            format!("{:.2}", r.price),
            format!("{:.2}", r.roe),
            format!("{:.2}", r.pb),
            format!("{:.4}", r.annual_dividend),
            format!("{:.4}", r.interim_dividend),
            format!("{:.4}", r.dividend_per_share),
            format!("{:.2}", r.formula1),
            format!("{:.2}", r.formula2),
            r.note.clone(),
            r.provenance.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Writes `roi_{timestamp}_{basis}.csv` under the output directory.
pub struct CsvSink {
    output_dir: PathBuf,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    /// Write every section; returns the created file paths.
    pub fn write(&self, report: &BatchReport) -> Result<Vec<PathBuf>> {
        ensure_dir(&self.output_dir)?;
        let stamp = report.generated_at.format("%Y%m%d_%H%M%S");

        let mut paths = Vec::with_capacity(report.sections.len());
        for section in &report.sections {
            let path = self.output_dir.join(format!("roi_{stamp}_{}.csv", section.basis));
            let csv = export_section_csv(section)?;
            std::fs::write(&path, csv).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), rows = section.results.len(), "CSV exported");
            paths.push(path);
        }
        Ok(paths)
    }
}

impl ReportSink for CsvSink {
    fn emit(&self, report: &BatchReport) -> Result<()> {
        self.write(report).map(|_| ())
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &BatchReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize BatchReport to JSON")
}

/// Writes `roi_{timestamp}.json` under the output directory.
pub struct JsonSink {
    output_dir: PathBuf,
}

impl JsonSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    pub fn write(&self, report: &BatchReport) -> Result<PathBuf> {
        ensure_dir(&self.output_dir)?;
        let path = self
            .output_dir
            .join(format!("roi_{}.json", report.generated_at.format("%Y%m%d_%H%M%S")));
        std::fs::write(&path, export_json(report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "JSON exported");
        Ok(path)
    }
}

impl ReportSink for JsonSink {
    fn emit(&self, report: &BatchReport) -> Result<()> {
        self.write(report).map(|_| ())
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create output dir: {}", dir.display()))
}
