//! Eastmoney data-center adapters.
//!
//! Two endpoints, one per disclosure category:
//!
//! - Financial indicators (F10 main financial data):
//!   `https://datacenter.eastmoney.com/securities/api/data/get?type=RPT_F10_FINANCE_MAINFINADATA`
//!   filtered by `SECUCODE` (`000858.SZ`). Each row is one report period with
//!   `REPORT_DATE`, `REPORT_TYPE` ("年报", "中报", "三季报", "一季报"),
//!   `ROEJQ` (weighted ROE, percent) and `BPS`.
//!
//! - Dividend plans:
//!   `https://datacenter-web.eastmoney.com/api/data/v1/get?reportName=RPT_SHAREBONUS_DET`
//!   filtered by `SECURITY_CODE` (`000858`) and `REPORT_DATE`. `PRETAX_BONUS_RMB`
//!   is the pre-tax cash dividend per 10 shares; `DIVIDENT_RATIO` is the
//!   dividend yield as a fraction.
//!
//! Both answer `"result": null` when there is nothing on record.
//! Auth: none.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{json_number, parse_report_date, DividendCalendar, DividendProvider, FinancialsProvider};
use crate::types::{DividendPeriod, DividendSnapshot, FinancialRecord, ReportKind, Ticker};

const FINANCIALS_URL: &str = "https://datacenter.eastmoney.com/securities/api/data/get";
const DIVIDENDS_URL: &str = "https://datacenter-web.eastmoney.com/api/data/v1/get";

const FINANCIALS_NAME: &str = "eastmoney-f10";
const DIVIDENDS_NAME: &str = "eastmoney-bonus";

/// Report periods requested per ticker (newest first).
const FINANCIALS_PAGE_SIZE: u32 = 200;

/// `PRETAX_BONUS_RMB` is quoted per this many shares.
const BONUS_SHARE_BASE: f64 = 10.0;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DataCenterResponse {
    #[serde(default)]
    result: Option<DataCenterResult>,
}

#[derive(Debug, Deserialize)]
struct DataCenterResult {
    #[serde(default)]
    data: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
}

impl DataCenterResponse {
    fn into_rows(self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.result.and_then(|r| r.data).unwrap_or_default()
    }
}

fn build_client(timeout_secs: u64, user_agent: &str, what: &str) -> Result<Client> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(user_agent)
        .build()
        .with_context(|| format!("Failed to build Eastmoney {what} HTTP client"))
}

async fn get_rows(http: &Client, url: &str, what: &str) -> Result<Vec<serde_json::Map<String, serde_json::Value>>> {
    let resp = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("Eastmoney {what} request failed"))?;

    if !resp.status().is_success() {
        let status = resp.status();
        anyhow::bail!("Eastmoney {what} API error: {status}");
    }

    let body: DataCenterResponse = resp
        .json()
        .await
        .with_context(|| format!("Failed to parse Eastmoney {what} response"))?;
    Ok(body.into_rows())
}

// ---------------------------------------------------------------------------
// Financials
// ---------------------------------------------------------------------------

pub struct EastmoneyFinancials {
    http: Client,
    base_url: String,
}

impl EastmoneyFinancials {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout_secs, user_agent, "financials")?,
            base_url: FINANCIALS_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url_for(&self, ticker: &Ticker) -> String {
        let filter = format!("(SECUCODE=\"{}\")", ticker.secucode());
        format!(
            "{}?type=RPT_F10_FINANCE_MAINFINADATA&sty=APP_F10_MAINFINADATA&quoteColumns=\
             &filter={}&p=1&ps={FINANCIALS_PAGE_SIZE}&sr=-1&st=REPORT_DATE&source=HSF10&client=PC",
            self.base_url,
            urlencoding::encode(&filter),
        )
    }

    /// Convert the raw JSON body into financial records.
    pub fn parse_records(ticker: &Ticker, body: &str) -> Result<Vec<FinancialRecord>> {
        let resp: DataCenterResponse =
            serde_json::from_str(body).context("Failed to parse Eastmoney financials body")?;
        Ok(Self::records_from_rows(ticker, resp.into_rows()))
    }

    fn records_from_rows(
        ticker: &Ticker,
        rows: Vec<serde_json::Map<String, serde_json::Value>>,
    ) -> Vec<FinancialRecord> {
        rows.iter()
            .map(|row| {
                let label = row
                    .get("REPORT_TYPE")
                    .and_then(|v| v.as_str())
                    .or_else(|| row.get("REPORT_DATE_NAME").and_then(|v| v.as_str()))
                    .unwrap_or("");
                let report_date = row
                    .get("REPORT_DATE")
                    .and_then(|v| v.as_str())
                    .and_then(parse_report_date);
                FinancialRecord {
                    ticker: ticker.clone(),
                    roe: json_number("eastmoney.ROEJQ", row.get("ROEJQ")),
                    book_value_per_share: json_number("eastmoney.BPS", row.get("BPS")),
                    kind: ReportKind::classify(label),
                    report_date,
                }
            })
            .collect()
    }
}

#[async_trait]
impl FinancialsProvider for EastmoneyFinancials {
    async fn fetch_financials(&self, ticker: &Ticker) -> Result<Vec<FinancialRecord>> {
        let rows = get_rows(&self.http, &self.url_for(ticker), "financials")
            .await
            .with_context(|| format!("Financials unavailable for {ticker}"))?;
        let records = Self::records_from_rows(ticker, rows);
        debug!(ticker = %ticker, periods = records.len(), "Eastmoney financials fetched");
        Ok(records)
    }

    fn name(&self) -> &'static str {
        FINANCIALS_NAME
    }
}

// ---------------------------------------------------------------------------
// Dividends
// ---------------------------------------------------------------------------

pub struct EastmoneyDividends {
    http: Client,
    base_url: String,
    calendar: DividendCalendar,
}

impl EastmoneyDividends {
    pub fn new(timeout_secs: u64, user_agent: &str, calendar: DividendCalendar) -> Result<Self> {
        Ok(Self {
            http: build_client(timeout_secs, user_agent, "dividends")?,
            base_url: DIVIDENDS_URL.to_string(),
            calendar,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url_for(&self, ticker: &Ticker, report_date: &str) -> String {
        let filter = format!("(SECURITY_CODE=\"{}\")(REPORT_DATE='{}')", ticker.code(), report_date);
        format!(
            "{}?sortColumns=PLAN_NOTICE_DATE&sortTypes=-1&pageSize=50&pageNumber=1\
             &reportName=RPT_SHAREBONUS_DET&columns=ALL&quoteColumns=&source=WEB&client=WEB&filter={}",
            self.base_url,
            urlencoding::encode(&filter),
        )
    }

    /// Convert the raw JSON body for one period into a snapshot.
    pub fn parse_snapshot(
        ticker: &Ticker,
        period: DividendPeriod,
        body: &str,
    ) -> Result<Option<DividendSnapshot>> {
        let resp: DataCenterResponse =
            serde_json::from_str(body).context("Failed to parse Eastmoney dividend body")?;
        Ok(Self::snapshot_from_rows(ticker, period, resp.into_rows()))
    }

    fn snapshot_from_rows(
        ticker: &Ticker,
        period: DividendPeriod,
        rows: Vec<serde_json::Map<String, serde_json::Value>>,
    ) -> Option<DividendSnapshot> {
        let row = rows.into_iter().find(|row| {
            row.get("SECURITY_CODE")
                .and_then(|v| v.as_str())
                .map_or(true, |code| code == ticker.code())
        })?;

        let per_ten = json_number("eastmoney.PRETAX_BONUS_RMB", row.get("PRETAX_BONUS_RMB"));
        let ratio = json_number("eastmoney.DIVIDENT_RATIO", row.get("DIVIDENT_RATIO"));

        Some(DividendSnapshot {
            ticker: ticker.clone(),
            period,
            cash_dividend: per_ten / BONUS_SHARE_BASE,
            reported_yield_pct: (ratio > 0.0).then_some(ratio * 100.0),
        })
    }
}

#[async_trait]
impl DividendProvider for EastmoneyDividends {
    async fn fetch_snapshot(
        &self,
        ticker: &Ticker,
        period: DividendPeriod,
    ) -> Result<Option<DividendSnapshot>> {
        // No trailing-twelve-month figure on this endpoint
        let Some(date) = self.calendar.report_date(period) else {
            return Ok(None);
        };
        let date = date.format("%Y-%m-%d").to_string();

        let rows = get_rows(&self.http, &self.url_for(ticker, &date), "dividends")
            .await
            .with_context(|| format!("Dividend snapshot unavailable for {ticker} ({period})"))?;
        let snapshot = Self::snapshot_from_rows(ticker, period, rows);
        debug!(
            ticker = %ticker,
            period = %period,
            report_date = %date,
            cash = snapshot.as_ref().map(|s| s.cash_dividend),
            "Eastmoney dividend fetched"
        );
        Ok(snapshot)
    }

    fn name(&self) -> &'static str {
        DIVIDENDS_NAME
    }
}
