//! ROI calculator.
//!
//! Pure functions from a reconciled record to an [`RoiResult`]. Both
//! formulas are total: degenerate inputs produce 0, never an error, so the
//! ranking and reporting stages always receive a number.

use crate::types::{CanonicalStockRecord, DividendBasis, RoiResult};

/// Formula 1: dividend yield in percent.
///
/// `price ≤ 0` gives 0 whatever the dividend, as does a non-finite input.
pub fn formula1(dividend_per_share: f64, price: f64) -> f64 {
    if price <= 0.0 || !price.is_finite() || !dividend_per_share.is_finite() {
        return 0.0;
    }
    dividend_per_share / price * 100.0
}

/// Formula 2: ROE over PB.
///
/// ROE is a bare percent number (15.45, not 0.1545) and is divided as-is,
/// so ROE 15.45 over PB 4.41 reads as 3.50 %. `pb ≤ 0` or a non-finite
/// input gives 0.
pub fn formula2(roe: f64, pb: f64) -> f64 {
    if pb <= 0.0 || !pb.is_finite() || !roe.is_finite() {
        return 0.0;
    }
    roe / pb
}

/// Formula 1 with an already-resolved yield taking precedence when positive.
pub fn formula1_with_yield(resolved_yield: Option<f64>, dividend_per_share: f64, price: f64) -> f64 {
    match resolved_yield {
        Some(y) if y > 0.0 && y.is_finite() => y,
        _ => formula1(dividend_per_share, price),
    }
}

/// Compute the result for one record on one dividend basis.
pub fn calculate(record: &CanonicalStockRecord, basis: DividendBasis) -> RoiResult {
    let (dividend_per_share, resolved_yield, interim_dividend) = match basis {
        DividendBasis::Ltm => (
            record.ltm_dividend,
            Some(record.dividend_yield),
            record.dividends.current_interim,
        ),
        DividendBasis::Annual => (
            record.dividends.prior_full_year,
            record.dividends.prior_full_year_yield,
            0.0,
        ),
    };

    let mut provenance = record.provenance.clone();
    provenance.dividend = match basis {
        DividendBasis::Ltm => record.provenance.dividend.clone(),
        DividendBasis::Annual => format!("annual({})", record.dividends.prior_full_year),
    };

    RoiResult {
        ticker: record.ticker.clone(),
        name: record.name.clone(),
        basis,
        price: record.price,
        roe: record.roe,
        pb: record.pb,
        dividend_per_share,
        annual_dividend: record.dividends.prior_full_year,
        interim_dividend,
        formula1: formula1_with_yield(resolved_yield, dividend_per_share, record.price),
        formula2: formula2(record.roe, record.pb),
        note: record.note.clone(),
        provenance,
    }
}

/// Compute one result per requested basis, in basis order.
pub fn calculate_all(record: &CanonicalStockRecord, bases: &[DividendBasis]) -> Vec<RoiResult> {
    bases.iter().map(|basis| calculate(record, *basis)).collect()
}
