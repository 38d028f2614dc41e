//! Shared types for ROISCOPE.
//!
//! These types form the data model used across all modules: raw provider
//! shapes (quote, financial record, dividend snapshot), operator-supplied
//! override rules, the reconciled per-stock record and the computed result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Exchange the security is listed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
}

impl Exchange {
    /// Two-letter upper-case prefix ("SH" / "SZ").
    pub fn prefix(&self) -> &'static str {
        match self {
            Exchange::Shanghai => "SH",
            Exchange::Shenzhen => "SZ",
        }
    }
}

/// An exchange-prefixed security code, e.g. `SH600519` or `SZ000858`.
///
/// Input is case-insensitive; the stored form is upper case. Serialises as
/// a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Parse and normalise a ticker symbol.
    pub fn parse(raw: &str) -> Result<Self, RoiError> {
        let symbol = raw.trim().to_uppercase();
        let valid_prefix = symbol.starts_with("SH") || symbol.starts_with("SZ");
        let code = symbol.get(2..).unwrap_or("");
        if !valid_prefix || code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(RoiError::InvalidTicker(raw.to_string()));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn exchange(&self) -> Exchange {
        if self.0.starts_with("SH") {
            Exchange::Shanghai
        } else {
            Exchange::Shenzhen
        }
    }

    /// The bare six-digit code, e.g. `000858`.
    pub fn code(&self) -> &str {
        &self.0[2..]
    }

    /// Lower-case prefixed form used by quote endpoints, e.g. `sz000858`.
    pub fn quote_symbol(&self) -> String {
        self.0.to_lowercase()
    }

    /// Suffixed form used by financial-statement endpoints, e.g. `000858.SZ`.
    pub fn secucode(&self) -> String {
        format!("{}.{}", self.code(), self.exchange().prefix())
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Ticker {
    type Error = RoiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> Self {
        t.0
    }
}

impl std::str::FromStr for Ticker {
    type Err = RoiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ticker::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Provider shapes
// ---------------------------------------------------------------------------

/// Live quote for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockQuote {
    pub ticker: Ticker,
    pub name: String,
    /// Current price in CNY (≥ 0).
    pub price: f64,
    /// Price-to-book ratio; 0 means unknown.
    pub pb: f64,
}

/// Report classification of a periodic disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Annual,
    Interim,
    Other,
}

impl ReportKind {
    /// Classify a provider's report-type label ("2024年报", "2025中报", "三季报" …).
    pub fn classify(label: &str) -> Self {
        let l = label.to_lowercase();
        if label.contains("年报") || l.contains("annual") {
            ReportKind::Annual
        } else if label.contains("中报")
            || label.contains("季报")
            || l.contains("interim")
            || l.contains("quarter")
        {
            ReportKind::Interim
        } else {
            ReportKind::Other
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Annual => write!(f, "annual"),
            ReportKind::Interim => write!(f, "interim"),
            ReportKind::Other => write!(f, "other"),
        }
    }
}

/// One periodic financial disclosure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialRecord {
    pub ticker: Ticker,
    /// Return on equity in percent (15.45 means 15.45 %); 0 = not disclosed.
    pub roe: f64,
    pub book_value_per_share: f64,
    pub kind: ReportKind,
    pub report_date: Option<NaiveDate>,
}

/// Fiscal snapshot a dividend figure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DividendPeriod {
    PriorFullYear,
    PriorYearInterim,
    CurrentInterim,
    /// Trailing twelve months as computed by the provider itself. Optional;
    /// only some providers answer it, and only its yield is consumed.
    Trailing,
}

impl DividendPeriod {
    /// The three disclosure snapshots the LTM figure is built from.
    pub const LTM_INPUTS: [DividendPeriod; 3] = [
        DividendPeriod::PriorFullYear,
        DividendPeriod::PriorYearInterim,
        DividendPeriod::CurrentInterim,
    ];
}

impl fmt::Display for DividendPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DividendPeriod::PriorFullYear => write!(f, "prior full year"),
            DividendPeriod::PriorYearInterim => write!(f, "prior-year interim"),
            DividendPeriod::CurrentInterim => write!(f, "current interim"),
            DividendPeriod::Trailing => write!(f, "trailing"),
        }
    }
}

/// Cash dividend disclosed for one fiscal snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendSnapshot {
    pub ticker: Ticker,
    pub period: DividendPeriod,
    /// Cash dividend per share in CNY; 0 when the provider has no data.
    pub cash_dividend: f64,
    /// Provider-reported dividend yield in percent for this exact period.
    pub reported_yield_pct: Option<f64>,
}

// ---------------------------------------------------------------------------
// Operator configuration
// ---------------------------------------------------------------------------

/// One watchlist row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub name: String,
    pub symbol: Ticker,
}

/// Operator-supplied ROE override for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRule {
    pub symbol: Ticker,
    /// Minimum acceptable ROE in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_roe: Option<f64>,
    /// Fixed ROE in percent; supersedes disclosed data entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_roe: Option<f64>,
}

impl OverrideRule {
    pub fn floor(symbol: Ticker, min_roe: f64) -> Self {
        Self { symbol, min_roe: Some(min_roe), fixed_roe: None }
    }

    pub fn fixed(symbol: Ticker, fixed_roe: f64) -> Self {
        Self { symbol, min_roe: None, fixed_roe: Some(fixed_roe) }
    }
}

/// Ticker → rule mapping. At most one rule per ticker; inserting again
/// replaces the earlier rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideRules {
    rules: BTreeMap<Ticker, OverrideRule>,
}

impl OverrideRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the rule for `rule.symbol`.
    pub fn upsert(&mut self, rule: OverrideRule) {
        self.rules.insert(rule.symbol.clone(), rule);
    }

    pub fn remove(&mut self, ticker: &Ticker) -> Option<OverrideRule> {
        self.rules.remove(ticker)
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&OverrideRule> {
        self.rules.get(ticker)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in ticker order.
    pub fn to_vec(&self) -> Vec<OverrideRule> {
        self.rules.values().cloned().collect()
    }

    /// Add fixed ROE values for tickers whose rule does not already carry one.
    pub fn merge_fixed(&mut self, fixed: &BTreeMap<Ticker, f64>) {
        for (ticker, value) in fixed {
            let rule = self
                .rules
                .entry(ticker.clone())
                .or_insert_with(|| OverrideRule { symbol: ticker.clone(), min_roe: None, fixed_roe: None });
            if rule.fixed_roe.is_none() {
                rule.fixed_roe = Some(*value);
            }
        }
    }
}

impl FromIterator<OverrideRule> for OverrideRules {
    fn from_iter<I: IntoIterator<Item = OverrideRule>>(iter: I) -> Self {
        let mut rules = OverrideRules::new();
        for rule in iter {
            rules.upsert(rule);
        }
        rules
    }
}

// ---------------------------------------------------------------------------
// Reconciled record and result
// ---------------------------------------------------------------------------

/// Which dividend figure Formula 1 is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DividendBasis {
    /// Trailing twelve months: prior full year − prior-year interim + current interim.
    Ltm,
    /// Prior full-year distribution only.
    Annual,
}

impl fmt::Display for DividendBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DividendBasis::Ltm => write!(f, "ltm"),
            DividendBasis::Annual => write!(f, "annual"),
        }
    }
}

/// Informational labels describing where each figure came from.
/// Never read by any computation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub price: String,
    pub roe: String,
    pub pb: String,
    pub dividend: String,
    /// Data gaps encountered while reconciling (failed or empty provider calls).
    #[serde(default)]
    pub gaps: Vec<String>,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "price: {} | roe: {} | pb: {} | dividend: {}",
            self.price, self.roe, self.pb, self.dividend
        )?;
        if !self.gaps.is_empty() {
            write!(f, " | gaps: {}", self.gaps.join(", "))?;
        }
        Ok(())
    }
}

/// The three LTM input snapshots plus the reported yields that came with them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DividendBreakdown {
    pub prior_full_year: f64,
    pub prior_year_interim: f64,
    pub current_interim: f64,
    pub prior_full_year_yield: Option<f64>,
    pub trailing_yield: Option<f64>,
}

/// One reconciled stock, ready for the ROI calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalStockRecord {
    pub ticker: Ticker,
    pub name: String,
    pub price: f64,
    /// ROE after override rules.
    pub roe: f64,
    /// ROE as disclosed by the latest annual report (0 when unknown).
    pub disclosed_roe: f64,
    pub pb: f64,
    pub book_value_per_share: f64,
    pub dividends: DividendBreakdown,
    pub ltm_dividend: f64,
    /// LTM yield in percent, provider-reported when available.
    pub dividend_yield: f64,
    pub note: String,
    pub provenance: Provenance,
}

/// Computed ROI metrics for one (stock, dividend basis) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiResult {
    pub ticker: Ticker,
    pub name: String,
    pub basis: DividendBasis,
    pub price: f64,
    pub roe: f64,
    pub pb: f64,
    pub dividend_per_share: f64,
    pub annual_dividend: f64,
    pub interim_dividend: f64,
    /// Dividend yield in percent.
    pub formula1: f64,
    /// ROE / PB.
    pub formula2: f64,
    pub note: String,
    pub provenance: Provenance,
}

impl fmt::Display for RoiResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) [{}] price={:.2} roe={:.2}% pb={:.2} div={:.4} F1={:.2}% F2={:.2}%",
            self.name,
            self.ticker,
            self.basis,
            self.price,
            self.roe,
            self.pb,
            self.dividend_per_share,
            self.formula1,
            self.formula2,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for ROISCOPE.
///
/// None of these escape the reconciliation engine; they are logged and
/// turned into zero-valued fields, skipped tickers or default configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoiError {
    #[error("Provider unavailable ({provider}) for {ticker}: {message}")]
    ProviderUnavailable {
        provider: String,
        ticker: String,
        message: String,
    },

    #[error("Malformed numeric field {field}: {raw:?}")]
    MalformedNumericField { field: String, raw: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid ticker {0:?}: expected SH/SZ followed by six digits")]
    InvalidTicker(String),

    #[error("Invalid override rule: {0}")]
    InvalidRule(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
