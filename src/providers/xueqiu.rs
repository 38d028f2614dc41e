//! Xueqiu quote-detail adapter for the trailing dividend.
//!
//! API: `https://stock.xueqiu.com/v5/stock/quote.json?symbol=SH600519&extend=detail`
//! Auth: an `xq_a_token` cookie. The endpoint answers `400016` without one.
//! Response:
//!
//! ```json
//! {"data": {"quote": {"symbol": "SH600519", "dividend": 30.876, "dividend_yield": 2.058}},
//!  "error_code": 0, "error_description": ""}
//! ```
//!
//! `dividend` is the trailing-twelve-month cash dividend per share and
//! `dividend_yield` the matching yield in percent. Only
//! [`DividendPeriod::Trailing`] is answered here; dated periods come from
//! the disclosure adapters.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{json_number, DividendProvider};
use crate::types::{DividendPeriod, DividendSnapshot, Ticker};

const BASE_URL: &str = "https://stock.xueqiu.com/v5/stock/quote.json";
const PROVIDER_NAME: &str = "xueqiu";

#[derive(Debug, Deserialize)]
struct QuoteDetailResponse {
    #[serde(default)]
    data: Option<QuoteDetailData>,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    error_description: String,
}

#[derive(Debug, Deserialize)]
struct QuoteDetailData {
    #[serde(default)]
    quote: Option<serde_json::Map<String, serde_json::Value>>,
}

pub struct XueqiuDividends {
    http: Client,
    base_url: String,
}

impl XueqiuDividends {
    /// `token` is sent as the `xq_a_token` cookie when present.
    pub fn new(timeout_secs: u64, user_agent: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            let cookie = HeaderValue::from_str(&format!("xq_a_token={token}"))
                .context("Xueqiu token is not a valid cookie value")?;
            headers.insert(COOKIE, cookie);
        }
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .context("Failed to build Xueqiu HTTP client")?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different endpoint (local fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Convert a quote-detail body into the trailing snapshot.
    ///
    /// `Ok(None)` when the symbol is unknown or nothing was paid over the
    /// trailing year. A non-zero `error_code` is an error.
    pub fn parse_trailing(ticker: &Ticker, body: &str) -> Result<Option<DividendSnapshot>> {
        let resp: QuoteDetailResponse =
            serde_json::from_str(body).context("Failed to parse Xueqiu quote body")?;
        if resp.error_code != 0 {
            anyhow::bail!("Xueqiu error {}: {}", resp.error_code, resp.error_description);
        }

        let Some(quote) = resp.data.and_then(|d| d.quote) else {
            return Ok(None);
        };
        let dividend = json_number("xueqiu.dividend", quote.get("dividend"));
        let yield_pct = json_number("xueqiu.dividend_yield", quote.get("dividend_yield"));
        if dividend <= 0.0 && yield_pct <= 0.0 {
            return Ok(None);
        }

        Ok(Some(DividendSnapshot {
            ticker: ticker.clone(),
            period: DividendPeriod::Trailing,
            cash_dividend: dividend.max(0.0),
            reported_yield_pct: (yield_pct > 0.0).then_some(yield_pct),
        }))
    }
}

#[async_trait]
impl DividendProvider for XueqiuDividends {
    async fn fetch_snapshot(
        &self,
        ticker: &Ticker,
        period: DividendPeriod,
    ) -> Result<Option<DividendSnapshot>> {
        if period != DividendPeriod::Trailing {
            return Ok(None);
        }

        let url = format!("{}?symbol={}&extend=detail", self.base_url, ticker.as_str());
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Xueqiu quote request failed for {ticker}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Xueqiu quote API error for {ticker}: {status}");
        }

        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read Xueqiu quote body for {ticker}"))?;
        let snapshot = Self::parse_trailing(ticker, &body)
            .with_context(|| format!("Trailing dividend unavailable for {ticker}"))?;
        debug!(
            ticker = %ticker,
            cash = snapshot.as_ref().map(|s| s.cash_dividend),
            yield_pct = snapshot.as_ref().and_then(|s| s.reported_yield_pct),
            "Xueqiu trailing dividend fetched"
        );
        Ok(snapshot)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
