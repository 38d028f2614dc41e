//! Reconciliation engine.
//!
//! Merges the quote, financial and dividend providers' outputs into one
//! [`CanonicalStockRecord`] per ticker. A missing quote drops the ticker;
//! every other provider failure degrades to zero-valued fields plus a
//! provenance gap, so one bad call never sinks a batch.

use anyhow::Result;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::engine::batch::BatchContext;
use crate::engine::calculator;
use crate::providers::{DividendProvider, FinancialsProvider, QuoteProvider};
use crate::types::{
    CanonicalStockRecord, DividendBreakdown, DividendPeriod, DividendSnapshot, FinancialRecord,
    OverrideRules, Provenance, ReportKind, RoiError, StockQuote, Ticker, WatchlistEntry,
};

// ---------------------------------------------------------------------------
// Pure reconciliation rules
// ---------------------------------------------------------------------------

/// Apply override rules to a disclosed annual ROE.
///
/// A fixed override is returned as-is; otherwise a floor lifts lower values
/// up to it. Callers pass 0 when no annual record exists.
pub fn resolve_effective_roe(ticker: &Ticker, disclosed_annual_roe: f64, rules: &OverrideRules) -> f64 {
    resolve_roe_with_source(ticker, disclosed_annual_roe, rules).0
}

/// [`resolve_effective_roe`] plus a label saying which rule (if any) applied.
fn resolve_roe_with_source(
    ticker: &Ticker,
    disclosed: f64,
    rules: &OverrideRules,
) -> (f64, Option<String>) {
    let Some(rule) = rules.get(ticker) else {
        return (disclosed, None);
    };
    if let Some(fixed) = rule.fixed_roe {
        return (fixed, Some(format!("fixed override({fixed}%)")));
    }
    match rule.min_roe {
        Some(floor) if disclosed < floor => {
            (floor, Some(format!("floor({floor}%) over disclosed {disclosed}%")))
        }
        _ => (disclosed, None),
    }
}

/// Trailing-twelve-month dividend from three disclosure snapshots.
///
/// A full-year figure already contains that year's interim payout, so the
/// prior interim is subtracted and the new interim added. Missing snapshots
/// count as 0. The result is not clamped: inconsistent disclosures can make
/// it negative and it is returned unchanged.
pub fn compute_ltm_dividend(
    prior_full_year: Option<f64>,
    prior_year_interim: Option<f64>,
    current_interim: Option<f64>,
) -> f64 {
    prior_full_year.unwrap_or(0.0) - prior_year_interim.unwrap_or(0.0) + current_interim.unwrap_or(0.0)
}

/// Dividend yield in percent: a positive provider-reported yield for the
/// matching period verbatim, else `ltm / price × 100` (0 when price ≤ 0).
pub fn derive_dividend_yield(ltm_dividend: f64, current_price: f64, reported_yield: Option<f64>) -> f64 {
    calculator::formula1_with_yield(reported_yield, ltm_dividend, current_price)
}

/// The most recent annual record. Records without a date sort oldest;
/// among equal dates the first in provider order wins.
pub fn select_annual_record(records: &[FinancialRecord]) -> Option<&FinancialRecord> {
    latest(records.iter().filter(|r| r.kind == ReportKind::Annual))
}

fn latest<'a>(records: impl Iterator<Item = &'a FinancialRecord>) -> Option<&'a FinancialRecord> {
    records.fold(None::<&'a FinancialRecord>, |best, r| match best {
        Some(b) if b.report_date >= r.report_date => Some(b),
        _ => Some(r),
    })
}

/// Round to two decimals (the precision PB is quoted at).
fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Outcome of reconciling a batch: surviving records in input order, plus
/// the tickers dropped for lack of a quote.
#[derive(Debug, Clone, Default)]
pub struct ReconciledBatch {
    pub records: Vec<CanonicalStockRecord>,
    pub skipped: Vec<(Ticker, RoiError)>,
}

/// Dividend snapshots gathered for one ticker.
struct DividendFetch {
    snapshots: HashMap<DividendPeriod, DividendSnapshot>,
    gaps: Vec<String>,
}

/// Drives the three provider adapters and merges their answers.
pub struct Reconciler {
    quotes: Box<dyn QuoteProvider>,
    financials: Box<dyn FinancialsProvider>,
    dividends: Box<dyn DividendProvider>,
}

impl Reconciler {
    pub fn new(
        quotes: Box<dyn QuoteProvider>,
        financials: Box<dyn FinancialsProvider>,
        dividends: Box<dyn DividendProvider>,
    ) -> Self {
        Self { quotes, financials, dividends }
    }

    /// Reconcile every watchlist entry, one ticker at a time.
    pub async fn reconcile_batch(&self, entries: &[WatchlistEntry], ctx: &BatchContext) -> ReconciledBatch {
        info!(count = entries.len(), rules = ctx.rules.len(), "Starting reconciliation");

        let mut batch = ReconciledBatch::default();
        for entry in entries {
            match self.reconcile(entry, ctx).await {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    warn!(ticker = %entry.symbol, error = %e, "Skipping ticker");
                    batch.skipped.push((entry.symbol.clone(), e));
                }
            }
        }

        info!(
            reconciled = batch.records.len(),
            skipped = batch.skipped.len(),
            "Reconciliation complete"
        );
        batch
    }

    /// Reconcile one ticker. Fails only when no quote can be obtained.
    pub async fn reconcile(
        &self,
        entry: &WatchlistEntry,
        ctx: &BatchContext,
    ) -> Result<CanonicalStockRecord, RoiError> {
        let ticker = &entry.symbol;

        let (quote, financials, dividends) = tokio::join!(
            self.quotes.fetch_quote(ticker),
            self.financials.fetch_financials(ticker),
            self.fetch_dividends(ticker),
        );

        let quote = self.require_quote(ticker, quote)?;
        let mut provenance = Provenance {
            price: self.quotes.name().to_string(),
            ..Provenance::default()
        };

        // -- ROE and book value ------------------------------------------

        let records = match financials {
            Ok(records) => records,
            Err(e) => {
                let err = RoiError::ProviderUnavailable {
                    provider: self.financials.name().to_string(),
                    ticker: ticker.to_string(),
                    message: format!("{e:#}"),
                };
                warn!(error = %err, "Financials degraded to zero");
                provenance.gaps.push("financials unavailable".to_string());
                Vec::new()
            }
        };

        let annual = select_annual_record(&records);
        let (disclosed_roe, roe_source) = match annual {
            Some(r) if r.roe > 0.0 => {
                let date = r.report_date.map(|d| d.to_string()).unwrap_or_else(|| "undated".into());
                (r.roe, format!("annual({date}, {}%)", r.roe))
            }
            Some(_) => (0.0, "annual(empty)".to_string()),
            None => (0.0, "annual(missing)".to_string()),
        };
        let book_value_per_share = annual
            .or_else(|| latest(records.iter()))
            .map(|r| r.book_value_per_share)
            .unwrap_or(0.0);

        let (roe, rule_source) = resolve_roe_with_source(ticker, disclosed_roe, &ctx.rules);
        provenance.roe = match rule_source {
            Some(rule) => {
                info!(ticker = %ticker, disclosed = disclosed_roe, effective = roe, rule = %rule, "Override rule applied");
                rule
            }
            None => roe_source,
        };

        // -- PB -------------------------------------------------------------

        let pb = if quote.pb > 0.0 {
            provenance.pb = self.quotes.name().to_string();
            quote.pb
        } else if quote.price > 0.0 && book_value_per_share > 0.0 {
            provenance.pb = format!("derived(price={}/bps={:.2})", quote.price, book_value_per_share);
            round2(quote.price / book_value_per_share)
        } else {
            provenance.pb = "unknown".to_string();
            0.0
        };

        // -- Dividends ------------------------------------------------------

        provenance.gaps.extend(dividends.gaps);
        let cash = |p: DividendPeriod| dividends.snapshots.get(&p).map(|s| s.cash_dividend);
        let reported = |p: DividendPeriod| {
            dividends.snapshots.get(&p).and_then(|s| s.reported_yield_pct).filter(|y| *y > 0.0)
        };

        let breakdown = DividendBreakdown {
            prior_full_year: cash(DividendPeriod::PriorFullYear).unwrap_or(0.0),
            prior_year_interim: cash(DividendPeriod::PriorYearInterim).unwrap_or(0.0),
            current_interim: cash(DividendPeriod::CurrentInterim).unwrap_or(0.0),
            prior_full_year_yield: reported(DividendPeriod::PriorFullYear),
            trailing_yield: reported(DividendPeriod::Trailing),
        };

        let ltm_dividend = compute_ltm_dividend(
            cash(DividendPeriod::PriorFullYear),
            cash(DividendPeriod::PriorYearInterim),
            cash(DividendPeriod::CurrentInterim),
        );
        if ltm_dividend < 0.0 {
            warn!(
                ticker = %ticker,
                ltm = ltm_dividend,
                "Negative LTM dividend: prior interim exceeds full-year disclosure"
            );
        }
        let dividend_yield = derive_dividend_yield(ltm_dividend, quote.price, breakdown.trailing_yield);
        provenance.dividend = format!(
            "ltm({}-{}+{})",
            breakdown.prior_full_year, breakdown.prior_year_interim, breakdown.current_interim
        );

        let name = if quote.name.trim().is_empty() {
            entry.name.clone()
        } else {
            quote.name.clone()
        };

        info!(
            ticker = %ticker,
            price = quote.price,
            roe,
            pb,
            ltm = ltm_dividend,
            yield_pct = dividend_yield,
            "Reconciled"
        );

        Ok(CanonicalStockRecord {
            ticker: ticker.clone(),
            name,
            price: quote.price,
            roe,
            disclosed_roe,
            pb,
            book_value_per_share,
            dividends: breakdown,
            ltm_dividend,
            dividend_yield,
            note: ctx.note_for(ticker),
            provenance,
        })
    }

    fn require_quote(&self, ticker: &Ticker, quote: Result<Option<StockQuote>>) -> Result<StockQuote, RoiError> {
        let unavailable = |message: String| RoiError::ProviderUnavailable {
            provider: self.quotes.name().to_string(),
            ticker: ticker.to_string(),
            message,
        };
        match quote {
            Ok(Some(q)) => Ok(q),
            Ok(None) => Err(unavailable("no quote returned".to_string())),
            Err(e) => Err(unavailable(format!("{e:#}"))),
        }
    }

    /// Fetch every dividend period concurrently. Failed periods are
    /// recorded as gaps and contribute nothing.
    async fn fetch_dividends(&self, ticker: &Ticker) -> DividendFetch {
        let periods = DividendPeriod::LTM_INPUTS
            .into_iter()
            .chain(std::iter::once(DividendPeriod::Trailing));
        let fetches = periods.map(move |period| async move {
            (period, self.dividends.fetch_snapshot(ticker, period).await)
        });

        let mut out = DividendFetch {
            snapshots: HashMap::new(),
            gaps: Vec::new(),
        };
        for (period, result) in join_all(fetches).await {
            match result {
                Ok(Some(snapshot)) => {
                    out.snapshots.insert(period, snapshot);
                }
                Ok(None) => {
                    debug!(ticker = %ticker, period = %period, "No dividend on record");
                }
                Err(e) => {
                    let err = RoiError::ProviderUnavailable {
                        provider: self.dividends.name().to_string(),
                        ticker: ticker.to_string(),
                        message: format!("{period}: {e:#}"),
                    };
                    warn!(error = %err, "Dividend snapshot degraded to zero");
                    out.gaps.push(format!("dividend {period} unavailable"));
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
