//! Ranking of ROI results by each formula.
//!
//! Both lists are sorted descending with a stable sort, so ties keep their
//! input order. Results whose value is not strictly positive are left out
//! rather than ranked last.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::types::{RoiResult, Ticker};

/// One position in a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based position.
    pub rank: usize,
    pub ticker: Ticker,
    pub name: String,
    pub value: f64,
}

/// Both rankings for one set of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rankings {
    pub by_formula1: Vec<RankedEntry>,
    pub by_formula2: Vec<RankedEntry>,
}

/// Rank by dividend yield (formula 1).
pub fn rank_by_formula1(results: &[RoiResult]) -> Vec<RankedEntry> {
    rank_by(results, |r| r.formula1)
}

/// Rank by ROE / PB (formula 2).
pub fn rank_by_formula2(results: &[RoiResult]) -> Vec<RankedEntry> {
    rank_by(results, |r| r.formula2)
}

pub fn rank(results: &[RoiResult]) -> Rankings {
    Rankings {
        by_formula1: rank_by_formula1(results),
        by_formula2: rank_by_formula2(results),
    }
}

fn rank_by(results: &[RoiResult], value: impl Fn(&RoiResult) -> f64) -> Vec<RankedEntry> {
    let mut eligible: Vec<(&RoiResult, f64)> = results
        .iter()
        .map(|r| (r, value(r)))
        .filter(|(_, v)| *v > 0.0)
        .collect();

    // NaN never passes the filter above, so partial_cmp always succeeds
    eligible.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    eligible
        .into_iter()
        .enumerate()
        .map(|(i, (r, v))| RankedEntry {
            rank: i + 1,
            ticker: r.ticker.clone(),
            name: r.name.clone(),
            value: v,
        })
        .collect()
}
