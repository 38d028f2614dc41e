//! HTTP adapters against a local fixture server.
//!
//! The server mimics the wire formats of the Tencent quote endpoint, the
//! two Eastmoney data-center reports and the Xueqiu quote detail closely
//! enough to exercise URL building, status handling and body parsing end
//! to end.

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    routing::get,
    Router,
};
use std::collections::HashMap;

use roiscope::engine::batch::{run_batch, BatchContext};
use roiscope::engine::reconciler::Reconciler;
use roiscope::providers::eastmoney::{EastmoneyDividends, EastmoneyFinancials};
use roiscope::providers::tencent::{TencentQuoteProvider, DEFAULT_PB_FIELD};
use roiscope::providers::xueqiu::XueqiuDividends;
use roiscope::providers::{
    DividendCalendar, DividendProvider, FinancialsProvider, QuoteProvider, RoutedDividends,
};
use roiscope::types::{DividendBasis, DividendPeriod, ReportKind, WatchlistEntry};

use crate::fakes::t;

fn quote_line(symbol: &str, name: &str, price: &str, pb: &str) -> String {
    let mut fields: Vec<String> = (0..50).map(|i| i.to_string()).collect();
    fields[1] = name.to_string();
    fields[3] = price.to_string();
    fields[DEFAULT_PB_FIELD] = pb.to_string();
    format!("v_{symbol}=\"{}\";\n", fields.join("~"))
}

async fn tencent(Path(query): Path<String>) -> Result<String, StatusCode> {
    match query.trim_start_matches("q=") {
        "sz000858" => Ok(quote_line("sz000858", "五粮液", "125.00", "")),
        "sh600519" => Ok(quote_line("sh600519", "贵州茅台", "1500.00", "7.50")),
        "sz000423" => Err(StatusCode::SERVICE_UNAVAILABLE),
        _ => Ok("v_pv_none_match=\"1\";\n".to_string()),
    }
}

async fn financials(Query(params): Query<HashMap<String, String>>) -> String {
    let filter = params.get("filter").cloned().unwrap_or_default();
    if filter.contains("000858.SZ") {
        serde_json::json!({
            "result": {"data": [
                {"REPORT_DATE": "2026-06-30 00:00:00", "REPORT_TYPE": "中报", "ROEJQ": 13.1, "BPS": 52.0},
                {"REPORT_DATE": "2025-12-31 00:00:00", "REPORT_TYPE": "年报", "ROEJQ": 25.0, "BPS": 50.0},
                {"REPORT_DATE": "2024-12-31 00:00:00", "REPORT_TYPE": "年报", "ROEJQ": "24.1", "BPS": 45.0}
            ]}
        })
        .to_string()
    } else {
        serde_json::json!({"result": null, "success": false}).to_string()
    }
}

async fn dividends(Query(params): Query<HashMap<String, String>>) -> String {
    let filter = params.get("filter").cloned().unwrap_or_default();
    let row = if !filter.contains("000858") {
        None
    } else if filter.contains("2025-12-31") {
        Some(serde_json::json!({"SECURITY_CODE": "000858", "PRETAX_BONUS_RMB": 40.0, "DIVIDENT_RATIO": 0.033}))
    } else if filter.contains("2025-06-30") {
        Some(serde_json::json!({"SECURITY_CODE": "000858", "PRETAX_BONUS_RMB": 10.0, "DIVIDENT_RATIO": null}))
    } else if filter.contains("2026-06-30") {
        Some(serde_json::json!({"SECURITY_CODE": "000858", "PRETAX_BONUS_RMB": "22.5", "DIVIDENT_RATIO": "-"}))
    } else {
        None
    };
    match row {
        Some(row) => serde_json::json!({"result": {"data": [row]}}).to_string(),
        None => serde_json::json!({"result": null}).to_string(),
    }
}

const XUEQIU_TOKEN: &str = "fixture-token";

async fn xueqiu(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> String {
    let authorised = headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.contains(&format!("xq_a_token={XUEQIU_TOKEN}")));
    if !authorised {
        return serde_json::json!({"data": {}, "error_code": 400016, "error_description": "token required"})
            .to_string();
    }
    let quote = match params.get("symbol").map(String::as_str) {
        Some("SZ000858") => serde_json::json!({"symbol": "SZ000858", "dividend": 5.1, "dividend_yield": 4.8}),
        Some("SH600519") => serde_json::json!({"symbol": "SH600519", "dividend": null, "dividend_yield": null}),
        _ => serde_json::Value::Null,
    };
    serde_json::json!({"data": {"quote": quote}, "error_code": 0, "error_description": ""}).to_string()
}

/// Start the fixture server and return its base URL.
async fn fixture_server() -> String {
    let app = Router::new()
        .route("/tencent/:query", get(tencent))
        .route("/f10", get(financials))
        .route("/bonus", get(dividends))
        .route("/xueqiu", get(xueqiu));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn providers(base: &str) -> (TencentQuoteProvider, EastmoneyFinancials, EastmoneyDividends) {
    let quotes = TencentQuoteProvider::new(5, "roiscope-test", DEFAULT_PB_FIELD)
        .unwrap()
        .with_base_url(format!("{base}/tencent/q="));
    let financials = EastmoneyFinancials::new(5, "roiscope-test")
        .unwrap()
        .with_base_url(format!("{base}/f10"));
    let dividends = EastmoneyDividends::new(5, "roiscope-test", DividendCalendar::new(2026))
        .unwrap()
        .with_base_url(format!("{base}/bonus"));
    (quotes, financials, dividends)
}

#[tokio::test]
async fn tencent_quote_over_http() {
    let base = fixture_server().await;
    let (quotes, _, _) = providers(&base);

    let q = quotes.fetch_quote(&t("SH600519")).await.unwrap().unwrap();
    assert_eq!(q.name, "贵州茅台");
    assert_eq!(q.price, 1500.0);
    assert_eq!(q.pb, 7.5);

    assert!(quotes.fetch_quote(&t("SZ000001")).await.unwrap().is_none());
    assert!(quotes.fetch_quote(&t("SZ000423")).await.is_err());
}

#[tokio::test]
async fn eastmoney_financials_over_http() {
    let base = fixture_server().await;
    let (_, financials, _) = providers(&base);

    let records = financials.fetch_financials(&t("SZ000858")).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].kind, ReportKind::Interim);
    assert_eq!(records[1].kind, ReportKind::Annual);
    assert_eq!(records[2].roe, 24.1);

    assert!(financials.fetch_financials(&t("SH600519")).await.unwrap().is_empty());
}

#[tokio::test]
async fn eastmoney_dividends_over_http() {
    let base = fixture_server().await;
    let (_, _, dividends) = providers(&base);
    let wly = t("SZ000858");

    let full = dividends.fetch_snapshot(&wly, DividendPeriod::PriorFullYear).await.unwrap().unwrap();
    assert_eq!(full.cash_dividend, 4.0);
    assert!((full.reported_yield_pct.unwrap() - 3.3).abs() < 1e-9);

    let current = dividends.fetch_snapshot(&wly, DividendPeriod::CurrentInterim).await.unwrap().unwrap();
    assert_eq!(current.cash_dividend, 2.25);
    assert_eq!(current.reported_yield_pct, None);

    assert!(dividends.fetch_snapshot(&wly, DividendPeriod::Trailing).await.unwrap().is_none());
    assert!(dividends
        .fetch_snapshot(&t("SH600519"), DividendPeriod::PriorFullYear)
        .await
        .unwrap()
        .is_none());
}

fn trailing(base: &str, token: Option<&str>) -> XueqiuDividends {
    XueqiuDividends::new(5, "roiscope-test", token)
        .unwrap()
        .with_base_url(format!("{base}/xueqiu"))
}

#[tokio::test]
async fn xueqiu_trailing_over_http() {
    let base = fixture_server().await;
    let xq = trailing(&base, Some(XUEQIU_TOKEN));

    let snap = xq.fetch_snapshot(&t("SZ000858"), DividendPeriod::Trailing).await.unwrap().unwrap();
    assert_eq!(snap.cash_dividend, 5.1);
    assert_eq!(snap.reported_yield_pct, Some(4.8));

    assert!(xq.fetch_snapshot(&t("SH600519"), DividendPeriod::Trailing).await.unwrap().is_none());
    assert!(xq.fetch_snapshot(&t("SZ000001"), DividendPeriod::Trailing).await.unwrap().is_none());
    assert!(xq.fetch_snapshot(&t("SZ000858"), DividendPeriod::PriorFullYear).await.unwrap().is_none());

    let anonymous = trailing(&base, None);
    let err = anonymous.fetch_snapshot(&t("SZ000858"), DividendPeriod::Trailing).await.unwrap_err();
    assert!(format!("{err:#}").contains("400016"));
}

#[tokio::test]
async fn batch_uses_trailing_yield_from_xueqiu() {
    let base = fixture_server().await;
    let (q, f, d) = providers(&base);
    let dividends = RoutedDividends::new(Box::new(d), Box::new(trailing(&base, Some(XUEQIU_TOKEN))));
    let reconciler = Reconciler::new(Box::new(q), Box::new(f), Box::new(dividends));

    let entries = vec![WatchlistEntry { name: "五粮液".into(), symbol: t("SZ000858") }];
    let report = run_batch(
        &reconciler,
        &entries,
        &BatchContext::default(),
        &[DividendBasis::Ltm, DividendBasis::Annual],
    )
    .await;

    // The reported trailing yield wins over 5.25 / 125 on the LTM basis
    let ltm = &report.results(DividendBasis::Ltm)[0];
    assert_eq!(ltm.dividend_per_share, 5.25);
    assert_eq!(ltm.formula1, 4.8);
    assert!(ltm.provenance.gaps.is_empty());

    // The annual basis still uses the prior-full-year reported yield
    let annual = &report.results(DividendBasis::Annual)[0];
    assert!((annual.formula1 - 3.3).abs() < 1e-9);
}

#[tokio::test]
async fn batch_degrades_when_xueqiu_refuses() {
    let base = fixture_server().await;
    let (q, f, d) = providers(&base);
    let dividends = RoutedDividends::new(Box::new(d), Box::new(trailing(&base, None)));
    let reconciler = Reconciler::new(Box::new(q), Box::new(f), Box::new(dividends));

    let entries = vec![WatchlistEntry { name: "五粮液".into(), symbol: t("SZ000858") }];
    let report = run_batch(&reconciler, &entries, &BatchContext::default(), &[DividendBasis::Ltm]).await;

    let ltm = &report.results(DividendBasis::Ltm)[0];
    assert!((ltm.formula1 - 4.2).abs() < 1e-9);
    assert_eq!(ltm.provenance.gaps, vec!["dividend trailing unavailable".to_string()]);
}

#[tokio::test]
async fn batch_over_http_providers() {
    let base = fixture_server().await;
    let (q, f, d) = providers(&base);
    let reconciler = Reconciler::new(Box::new(q), Box::new(f), Box::new(d));

    let entries = vec![
        WatchlistEntry { name: "东阿阿胶".into(), symbol: t("SZ000423") },
        WatchlistEntry { name: "五粮液".into(), symbol: t("SZ000858") },
        WatchlistEntry { name: "贵州茅台".into(), symbol: t("SH600519") },
    ];
    let report = run_batch(
        &reconciler,
        &entries,
        &BatchContext::default(),
        &[DividendBasis::Ltm, DividendBasis::Annual],
    )
    .await;

    // 东阿阿胶's quote endpoint answers 503
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].ticker, t("SZ000423"));

    let ltm = report.results(DividendBasis::Ltm);
    assert_eq!(ltm.len(), 2);

    // 五粮液: PB blank on the quote, derived from the 2025 annual BPS
    let wly = &ltm[0];
    assert_eq!(wly.roe, 25.0);
    assert_eq!(wly.pb, 2.5);
    // 4.0 - 1.0 + 2.25
    assert_eq!(wly.dividend_per_share, 5.25);
    assert!((wly.formula1 - 4.2).abs() < 1e-9);

    let annual = report.results(DividendBasis::Annual);
    assert!((annual[0].formula1 - 3.3).abs() < 1e-9);

    // 贵州茅台 has no disclosures on the fixture server
    let moutai = &ltm[1];
    assert_eq!(moutai.roe, 0.0);
    assert_eq!(moutai.dividend_per_share, 0.0);
    assert_eq!(moutai.pb, 7.5);
}
