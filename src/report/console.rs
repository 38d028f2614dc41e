//! Console sink: results and rankings through `tracing`.

use anyhow::Result;
use tracing::{info, warn};

use super::ReportSink;
use crate::engine::batch::{BasisReport, BatchReport};
use crate::engine::ranking::RankedEntry;

pub struct ConsoleSink;

impl ConsoleSink {
    /// Plain-text table for one basis, one line per result.
    pub fn render_section(section: &BasisReport) -> String {
        let mut out = format!("== {} basis ({} stocks) ==\n", section.basis, section.results.len());
        for r in &section.results {
            out.push_str(&format!("{r}\n"));
        }
        out.push_str(&render_ranking("F1 dividend yield", &section.rankings.by_formula1, "%"));
        out.push_str(&render_ranking("F2 ROE/PB", &section.rankings.by_formula2, ""));
        out
    }
}

fn render_ranking(title: &str, entries: &[RankedEntry], unit: &str) -> String {
    let mut out = format!("-- {title} --\n");
    if entries.is_empty() {
        out.push_str("   (no positive values)\n");
    }
    for e in entries {
        out.push_str(&format!("{:>3}. {} ({}) {:.2}{unit}\n", e.rank, e.name, e.ticker, e.value));
    }
    out
}

impl ReportSink for ConsoleSink {
    fn emit(&self, report: &BatchReport) -> Result<()> {
        info!(
            generated_at = %report.generated_at,
            results = report.result_count(),
            skipped = report.skipped.len(),
            "ROI batch report"
        );
        for section in &report.sections {
            for r in &section.results {
                info!(
                    basis = %section.basis,
                    ticker = %r.ticker,
                    name = %r.name,
                    price = r.price,
                    roe = r.roe,
                    pb = r.pb,
                    dividend = r.dividend_per_share,
                    f1 = format!("{:.2}%", r.formula1),
                    f2 = format!("{:.2}%", r.formula2),
                    provenance = %r.provenance,
                    "Result"
                );
            }
            for line in Self::render_section(section).lines() {
                info!("{line}");
            }
        }
        for s in &report.skipped {
            warn!(ticker = %s.ticker, reason = %s.reason, "Skipped");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
