//! Market data providers.
//!
//! One adapter trait per data category (quote, financial disclosures,
//! dividend disclosures). Each adapter hides its wire format and returns
//! the canonical shapes from [`crate::types`], so the reconciliation engine
//! never sees a provider-specific field layout.
//!
//! Implementations:
//! - [`tencent::TencentQuoteProvider`]: live price and PB
//! - [`eastmoney::EastmoneyFinancials`]: ROE / BPS by report period
//! - [`eastmoney::EastmoneyDividends`]: cash dividend and yield per period
//! - [`xueqiu::XueqiuDividends`]: trailing dividend and yield
//!
//! [`RoutedDividends`] combines a dated dividend source with a trailing one.

pub mod eastmoney;
pub mod tencent;
pub mod xueqiu;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use crate::types::{DividendPeriod, DividendSnapshot, FinancialRecord, RoiError, StockQuote, Ticker};

/// Live quote source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch the current quote. `Ok(None)` means the provider answered but
    /// knows nothing about the ticker.
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<Option<StockQuote>>;

    /// Provider name for logging and provenance.
    fn name(&self) -> &'static str;
}

/// Periodic financial disclosure source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FinancialsProvider: Send + Sync {
    /// Fetch all disclosed report periods for a ticker, in any order.
    async fn fetch_financials(&self, ticker: &Ticker) -> Result<Vec<FinancialRecord>>;

    fn name(&self) -> &'static str;
}

/// Dividend disclosure source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DividendProvider: Send + Sync {
    /// Fetch the dividend disclosed for one fiscal snapshot.
    /// `Ok(None)` means no distribution on record for that period.
    async fn fetch_snapshot(
        &self,
        ticker: &Ticker,
        period: DividendPeriod,
    ) -> Result<Option<DividendSnapshot>>;

    fn name(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// Dividend routing
// ---------------------------------------------------------------------------

/// Sends [`DividendPeriod::Trailing`] to one provider and every dated
/// period to another.
pub struct RoutedDividends {
    dated: Box<dyn DividendProvider>,
    trailing: Box<dyn DividendProvider>,
}

impl RoutedDividends {
    pub fn new(dated: Box<dyn DividendProvider>, trailing: Box<dyn DividendProvider>) -> Self {
        Self { dated, trailing }
    }

    fn route(&self, period: DividendPeriod) -> &dyn DividendProvider {
        match period {
            DividendPeriod::Trailing => self.trailing.as_ref(),
            _ => self.dated.as_ref(),
        }
    }
}

#[async_trait]
impl DividendProvider for RoutedDividends {
    async fn fetch_snapshot(
        &self,
        ticker: &Ticker,
        period: DividendPeriod,
    ) -> Result<Option<DividendSnapshot>> {
        let provider = self.route(period);
        provider
            .fetch_snapshot(ticker, period)
            .await
            .with_context(|| format!("{} failed", provider.name()))
    }

    fn name(&self) -> &'static str {
        "routed-dividends"
    }
}

// ---------------------------------------------------------------------------
// Dividend calendar
// ---------------------------------------------------------------------------

/// Maps dividend periods to the report dates providers index them by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DividendCalendar {
    /// Year of the current interim snapshot.
    pub current_year: i32,
}

impl DividendCalendar {
    pub fn new(current_year: i32) -> Self {
        Self { current_year }
    }

    /// Report date for a period; `None` for periods with no fixed date.
    pub fn report_date(&self, period: DividendPeriod) -> Option<NaiveDate> {
        let prior = self.current_year - 1;
        match period {
            DividendPeriod::PriorFullYear => NaiveDate::from_ymd_opt(prior, 12, 31),
            DividendPeriod::PriorYearInterim => NaiveDate::from_ymd_opt(prior, 6, 30),
            DividendPeriod::CurrentInterim => NaiveDate::from_ymd_opt(self.current_year, 6, 30),
            DividendPeriod::Trailing => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient numeric parsing
// ---------------------------------------------------------------------------

/// Parse a numeric text field, substituting 0 for empty or malformed input.
///
/// Providers use "", "-" and "--" for "no value"; those are 0 without noise.
/// Anything else that fails to parse is logged as a malformed field.
pub fn parse_number(field: &str, raw: &str) -> f64 {
    let trimmed = raw.trim().trim_end_matches('%');
    if trimmed.is_empty() || trimmed == "-" || trimmed == "--" {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => {
            let err = RoiError::MalformedNumericField {
                field: field.to_string(),
                raw: raw.to_string(),
            };
            debug!(error = %err, "Substituting 0");
            0.0
        }
    }
}

/// Read a number out of a JSON value that may be a number, a numeric
/// string or null.
pub fn json_number(field: &str, value: Option<&serde_json::Value>) -> f64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => parse_number(field, s),
        Some(serde_json::Value::Null) | None => 0.0,
        Some(other) => parse_number(field, &other.to_string()),
    }
}

/// Parse the leading `YYYY-MM-DD` of a provider date string
/// (e.g. "2024-12-31 00:00:00").
pub fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
