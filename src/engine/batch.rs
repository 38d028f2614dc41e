//! Batch orchestration.
//!
//! One batch = one rule snapshot, one pass of the reconciler over the
//! watchlist, one calculator pass per dividend basis, and the rankings.
//! Rule edits made while a batch runs only affect the next batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::engine::calculator;
use crate::engine::ranking::{self, Rankings};
use crate::engine::reconciler::Reconciler;
use crate::types::{DividendBasis, OverrideRules, RoiResult, Ticker, WatchlistEntry};

/// Remark attached to tickers without a configured note.
pub const DEFAULT_NOTE: &str = "Guaranteed dividend: check company announcements";

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Read-only inputs captured at batch start.
#[derive(Debug, Clone, Default)]
pub struct BatchContext {
    pub rules: OverrideRules,
    /// Ticker → free-text note.
    pub notes: BTreeMap<Ticker, String>,
}

impl BatchContext {
    /// Snapshot the rule table, folding in fixed ROE values from config.
    /// A fixed value already present in the rule table wins.
    pub fn snapshot(
        mut rules: OverrideRules,
        fixed_roe: &BTreeMap<Ticker, f64>,
        notes: BTreeMap<Ticker, String>,
    ) -> Self {
        rules.merge_fixed(fixed_roe);
        Self { rules, notes }
    }

    pub fn note_for(&self, ticker: &Ticker) -> String {
        self.notes
            .get(ticker)
            .cloned()
            .unwrap_or_else(|| DEFAULT_NOTE.to_string())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A ticker dropped from the batch, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedTicker {
    pub ticker: Ticker,
    pub reason: String,
}

/// Results and rankings for one dividend basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisReport {
    pub basis: DividendBasis,
    /// Every result in watchlist order, including zero-valued ones.
    pub results: Vec<RoiResult>,
    pub rankings: Rankings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<BasisReport>,
    pub skipped: Vec<SkippedTicker>,
}

impl BatchReport {
    pub fn section(&self, basis: DividendBasis) -> Option<&BasisReport> {
        self.sections.iter().find(|s| s.basis == basis)
    }

    /// Results for one basis (empty when the basis was not requested).
    pub fn results(&self, basis: DividendBasis) -> &[RoiResult] {
        self.section(basis).map(|s| s.results.as_slice()).unwrap_or(&[])
    }

    pub fn result_count(&self) -> usize {
        self.sections.iter().map(|s| s.results.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run one batch over `entries`. Never fails: tickers without a quote are
/// listed in `skipped`, everything else yields one result per basis.
pub async fn run_batch(
    reconciler: &Reconciler,
    entries: &[WatchlistEntry],
    ctx: &BatchContext,
    bases: &[DividendBasis],
) -> BatchReport {
    let reconciled = reconciler.reconcile_batch(entries, ctx).await;

    let sections: Vec<BasisReport> = bases
        .iter()
        .map(|&basis| {
            let results: Vec<RoiResult> = reconciled
                .records
                .iter()
                .map(|record| calculator::calculate(record, basis))
                .collect();
            let rankings = ranking::rank(&results);
            info!(
                basis = %basis,
                results = results.len(),
                ranked_f1 = rankings.by_formula1.len(),
                ranked_f2 = rankings.by_formula2.len(),
                "Basis computed"
            );
            BasisReport { basis, results, rankings }
        })
        .collect();

    let skipped = reconciled
        .skipped
        .into_iter()
        .map(|(ticker, err)| SkippedTicker { ticker, reason: err.to_string() })
        .collect();

    BatchReport {
        generated_at: Utc::now(),
        sections,
        skipped,
    }
}
