//! End-to-end batches: watchlist and rules on disk, fake providers, report
//! sinks.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use roiscope::engine::batch::{run_batch, BatchContext, DEFAULT_NOTE};
use roiscope::engine::reconciler::Reconciler;
use roiscope::report::{CsvSink, ReportSink};
use roiscope::storage;
use roiscope::types::{DividendBasis, DividendPeriod, OverrideRule, WatchlistEntry};

use crate::fakes::{t, FakeDividends, FakeFinancials, FakeQuotes};

const BOTH: [DividendBasis; 2] = [DividendBasis::Ltm, DividendBasis::Annual];

fn temp_path(kind: &str) -> String {
    let mut p = std::env::temp_dir();
    p.push(format!("roiscope_it_{kind}_{}.json", uuid::Uuid::new_v4()));
    p.to_string_lossy().to_string()
}

fn entry(name: &str, symbol: &str) -> WatchlistEntry {
    WatchlistEntry { name: name.to_string(), symbol: t(symbol) }
}

/// The default four-stock watchlist with plausible disclosures.
fn liquor_and_gelatin() -> (FakeQuotes, FakeFinancials, FakeDividends) {
    let quotes = FakeQuotes::default()
        .with("SZ000423", "东阿阿胶", 50.0, 2.5)
        .with("SZ000858", "五粮液", 125.0, 0.0)
        .with("SH600519", "贵州茅台", 1500.0, 7.5)
        .with("SZ002304", "洋河股份", 80.0, 2.0);

    let financials = FakeFinancials::default()
        .annual("SZ000423", 2025, 7.5, 20.0)
        .annual("SZ000858", 2024, 24.0, 40.0)
        .annual("SZ000858", 2025, 25.0, 50.0)
        .interim("SZ000858", 2026, 12.0, 52.0)
        .annual("SH600519", 2025, 30.0, 200.0)
        .annual("SZ002304", 2025, 12.0, 40.0);

    let dividends = FakeDividends::default()
        .cash("SZ000423", DividendPeriod::PriorFullYear, 1.5)
        .snapshot("SZ000858", DividendPeriod::PriorFullYear, 4.0, Some(3.3))
        .cash("SZ000858", DividendPeriod::PriorYearInterim, 1.0)
        .cash("SZ000858", DividendPeriod::CurrentInterim, 2.25)
        .cash("SH600519", DividendPeriod::PriorFullYear, 45.0)
        .cash("SH600519", DividendPeriod::CurrentInterim, 24.0)
        .cash("SZ002304", DividendPeriod::PriorFullYear, 3.0);

    (quotes, financials, dividends)
}

fn reconciler(q: FakeQuotes, f: FakeFinancials, d: FakeDividends) -> Reconciler {
    Reconciler::new(Box::new(q), Box::new(f), Box::new(d))
}

#[tokio::test]
async fn second_quote_failure_leaves_two_results_in_order() {
    let quotes = FakeQuotes::default()
        .with("SZ000423", "东阿阿胶", 50.0, 2.5)
        .failing("SZ000858")
        .with("SH600519", "贵州茅台", 1500.0, 7.5);
    let calls = quotes.calls.clone();
    let r = reconciler(quotes, FakeFinancials::default(), FakeDividends::default());

    let entries = vec![
        entry("东阿阿胶", "SZ000423"),
        entry("五粮液", "SZ000858"),
        entry("贵州茅台", "SH600519"),
    ];
    let report = run_batch(&r, &entries, &BatchContext::default(), &[DividendBasis::Ltm]).await;

    let results = report.results(DividendBasis::Ltm);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].ticker, t("SZ000423"));
    assert_eq!(results[1].ticker, t("SH600519"));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].ticker, t("SZ000858"));
    assert!(report.skipped[0].reason.contains("connection refused"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn absent_quote_is_skipped_like_a_failure() {
    let r = reconciler(
        FakeQuotes::default().with("SZ000423", "东阿阿胶", 50.0, 2.5),
        FakeFinancials::default(),
        FakeDividends::default(),
    );
    let entries = vec![entry("东阿阿胶", "SZ000423"), entry("五粮液", "SZ000858")];
    let report = run_batch(&r, &entries, &BatchContext::default(), &BOTH).await;
    assert_eq!(report.result_count(), 2);
    assert_eq!(report.skipped[0].ticker, t("SZ000858"));
}

#[tokio::test]
async fn full_watchlist_with_rules_from_disk() {
    let stocks_path = temp_path("stocks");
    let rules_path = temp_path("rules");
    storage::upsert_rule(&rules_path, OverrideRule::floor(t("SZ000423"), 10.0)).unwrap();

    let (q, f, d) = liquor_and_gelatin();
    let r = reconciler(q, f, d);

    // No stocks file: the default watchlist is used
    let watchlist = storage::load_watchlist(&stocks_path);
    assert_eq!(watchlist.len(), 4);

    let mut fixed = BTreeMap::new();
    fixed.insert(t("SZ002304"), 20.0);
    let mut notes = BTreeMap::new();
    notes.insert(t("SH600519"), "three-year payout plan".to_string());
    let ctx = BatchContext::snapshot(storage::load_rules(&rules_path), &fixed, notes);

    let report = run_batch(&r, &watchlist, &ctx, &BOTH).await;
    assert!(report.skipped.is_empty());

    let ltm = report.results(DividendBasis::Ltm);
    let order: Vec<&str> = ltm.iter().map(|r| r.ticker.as_str()).collect();
    assert_eq!(order, vec!["SZ000423", "SZ000858", "SH600519", "SZ002304"]);

    // 东阿阿胶: floor lifts 7.5 to 10; 10 / 2.5
    let dong_e = &ltm[0];
    assert_eq!(dong_e.roe, 10.0);
    assert!((dong_e.formula2 - 4.0).abs() < 1e-12);
    assert!((dong_e.formula1 - 3.0).abs() < 1e-12);
    assert_eq!(dong_e.note, DEFAULT_NOTE);

    // 五粮液: latest annual (2025), PB derived 125 / 50, LTM 4 - 1 + 2.25
    let wly = &ltm[1];
    assert_eq!(wly.roe, 25.0);
    assert_eq!(wly.pb, 2.5);
    assert_eq!(wly.dividend_per_share, 5.25);
    assert!((wly.formula1 - 4.2).abs() < 1e-12);
    assert!((wly.formula2 - 10.0).abs() < 1e-12);
    assert!(wly.provenance.pb.starts_with("derived("));

    // 贵州茅台: no prior interim on record counts as 0
    let moutai = &ltm[2];
    assert_eq!(moutai.dividend_per_share, 69.0);
    assert_eq!(moutai.note, "three-year payout plan");

    // 洋河股份: fixed ROE from config supersedes the disclosed 12
    let yanghe = &ltm[3];
    assert_eq!(yanghe.roe, 20.0);
    assert!((yanghe.formula2 - 10.0).abs() < 1e-12);

    // Annual basis: 五粮液 uses the reported prior-year yield
    let annual = report.results(DividendBasis::Annual);
    assert_eq!(annual[1].dividend_per_share, 4.0);
    assert_eq!(annual[1].formula1, 3.3);
    assert_eq!(annual[2].dividend_per_share, 45.0);
    assert!((annual[2].formula1 - 3.0).abs() < 1e-12);

    // Rankings: F2 ties (10.0 and 4.0) keep watchlist order
    let f2: Vec<&str> = report
        .section(DividendBasis::Ltm)
        .unwrap()
        .rankings
        .by_formula2
        .iter()
        .map(|e| e.ticker.as_str())
        .collect();
    assert_eq!(f2, vec!["SZ000858", "SZ002304", "SZ000423", "SH600519"]);

    let _ = std::fs::remove_file(&rules_path);
}

#[tokio::test]
async fn provider_failures_degrade_to_zero_with_gaps() {
    let r = reconciler(
        FakeQuotes::default().with("SZ000858", "五粮液", 125.0, 5.0),
        FakeFinancials::default().failing("SZ000858"),
        FakeDividends::default()
            .cash("SZ000858", DividendPeriod::PriorFullYear, 4.0)
            .failing("SZ000858", DividendPeriod::PriorYearInterim),
    );
    let report = run_batch(&r, &[entry("五粮液", "SZ000858")], &BatchContext::default(), &BOTH).await;

    let ltm = &report.results(DividendBasis::Ltm)[0];
    assert_eq!(ltm.roe, 0.0);
    assert_eq!(ltm.formula2, 0.0);
    assert_eq!(ltm.dividend_per_share, 4.0);
    assert_eq!(ltm.provenance.gaps.len(), 2);
    assert!(ltm.provenance.gaps.contains(&"financials unavailable".to_string()));

    let ranking = &report.section(DividendBasis::Ltm).unwrap().rankings;
    assert_eq!(ranking.by_formula1.len(), 1);
    assert!(ranking.by_formula2.is_empty());
}

#[tokio::test]
async fn rule_edits_apply_to_the_next_batch_only() {
    let rules_path = temp_path("rules");
    let make = || {
        reconciler(
            FakeQuotes::default().with("SZ000423", "东阿阿胶", 50.0, 2.5),
            FakeFinancials::default().annual("SZ000423", 2025, 7.5, 20.0),
            FakeDividends::default(),
        )
    };
    let entries = vec![entry("东阿阿胶", "SZ000423")];

    let snapshot = BatchContext::snapshot(storage::load_rules(&rules_path), &BTreeMap::new(), BTreeMap::new());
    storage::upsert_rule(&rules_path, OverrideRule::fixed(t("SZ000423"), 18.0)).unwrap();

    let before = run_batch(&make(), &entries, &snapshot, &[DividendBasis::Ltm]).await;
    assert_eq!(before.results(DividendBasis::Ltm)[0].roe, 7.5);

    let fresh = BatchContext::snapshot(storage::load_rules(&rules_path), &BTreeMap::new(), BTreeMap::new());
    let after = run_batch(&make(), &entries, &fresh, &[DividendBasis::Ltm]).await;
    assert_eq!(after.results(DividendBasis::Ltm)[0].roe, 18.0);

    let _ = std::fs::remove_file(&rules_path);
}

#[tokio::test]
async fn negative_ltm_reaches_the_result() {
    let r = reconciler(
        FakeQuotes::default().with("SZ000858", "五粮液", 100.0, 4.0),
        FakeFinancials::default(),
        FakeDividends::default()
            .cash("SZ000858", DividendPeriod::PriorFullYear, 1.0)
            .cash("SZ000858", DividendPeriod::PriorYearInterim, 3.0),
    );
    let report = run_batch(&r, &[entry("五粮液", "SZ000858")], &BatchContext::default(), &[DividendBasis::Ltm]).await;
    let result = &report.results(DividendBasis::Ltm)[0];
    assert_eq!(result.dividend_per_share, -2.0);
    assert!((result.formula1 + 2.0).abs() < 1e-12);
    assert!(report.section(DividendBasis::Ltm).unwrap().rankings.by_formula1.is_empty());
}

#[tokio::test]
async fn csv_export_of_a_batch() {
    let (q, f, d) = liquor_and_gelatin();
    let r = reconciler(q, f, d);
    let report = run_batch(&r, &storage::default_watchlist(), &BatchContext::default(), &BOTH).await;

    let dir = std::env::temp_dir().join(format!("roiscope_it_csv_{}", uuid::Uuid::new_v4()));
    let sink = CsvSink::new(&dir);
    sink.emit(&report).unwrap();

    let mut files: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    files.sort();
    assert_eq!(files.len(), 2);
    assert!(files[0].ends_with("_annual.csv"));
    assert!(files[1].ends_with("_ltm.csv"));

    let ltm = std::fs::read_to_string(dir.join(&files[1])).unwrap();
    assert_eq!(ltm.lines().count(), 5);
    assert!(ltm.contains("五粮液,SZ000858,125.00,25.00,2.50,"));

    std::fs::remove_dir_all(&dir).unwrap();
}
