//! Tencent real-time quote adapter.
//!
//! API: `https://qt.gtimg.cn/q=sz000858`
//! Auth: none.
//! Response: one JS assignment per symbol,
//! `v_sz000858="51~五粮液~000858~124.50~...";` with `~`-separated fields.
//! Field 1 is the display name, field 3 the last price. The PB field index
//! depends on the response layout and is configurable (46 currently, 38 in
//! older layouts). Unknown symbols answer `v_pv_none_match="1";`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{parse_number, QuoteProvider};
use crate::types::{StockQuote, Ticker};

const BASE_URL: &str = "https://qt.gtimg.cn/q=";
const PROVIDER_NAME: &str = "tencent";

const NAME_FIELD: usize = 1;
const PRICE_FIELD: usize = 3;

/// Default PB field index for the current response layout.
pub const DEFAULT_PB_FIELD: usize = 46;

pub struct TencentQuoteProvider {
    http: Client,
    base_url: String,
    pb_field: usize,
}

impl TencentQuoteProvider {
    pub fn new(timeout_secs: u64, user_agent: &str, pb_field: usize) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("Failed to build Tencent HTTP client")?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            pb_field,
        })
    }

    /// Point the client at a different endpoint (local fixtures).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Parse one quote line. Returns `None` when the payload carries no
    /// quote or has fewer fields than the configured layout expects.
    pub fn parse_quote(ticker: &Ticker, body: &str, pb_field: usize) -> Option<StockQuote> {
        let start = body.find('"')?;
        let end = body.rfind('"')?;
        if end <= start {
            return None;
        }
        let payload = &body[start + 1..end];
        let fields: Vec<&str> = payload.split('~').collect();

        let needed = PRICE_FIELD.max(pb_field);
        if fields.len() <= needed {
            debug!(
                ticker = %ticker,
                fields = fields.len(),
                needed = needed + 1,
                "Quote payload too short"
            );
            return None;
        }

        let name = fields[NAME_FIELD].trim().to_string();
        let price = parse_number("tencent.price", fields[PRICE_FIELD]).max(0.0);
        let pb = parse_number("tencent.pb", fields[pb_field]).max(0.0);

        Some(StockQuote {
            ticker: ticker.clone(),
            name,
            price,
            pb,
        })
    }
}

#[async_trait]
impl QuoteProvider for TencentQuoteProvider {
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<Option<StockQuote>> {
        let url = format!("{}{}", self.base_url, ticker.quote_symbol());
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Tencent quote request failed for {ticker}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("Tencent quote API error for {ticker}: {status}");
        }

        // reqwest decodes using the GBK charset the endpoint declares
        let body = resp
            .text()
            .await
            .with_context(|| format!("Failed to read Tencent quote body for {ticker}"))?;

        let quote = Self::parse_quote(ticker, &body, self.pb_field);
        debug!(ticker = %ticker, found = quote.is_some(), "Tencent quote fetched");
        Ok(quote)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
