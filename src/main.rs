//! ROISCOPE entry point.
//!
//! Loads configuration, initialises structured logging, runs one batch over
//! the watchlist, hands the report to the configured sinks, and optionally
//! keeps serving the JSON API until Ctrl+C.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use roiscope::config::AppConfig;
use roiscope::dashboard::{self, DashboardState};
use roiscope::engine::batch::{self, BatchContext};
use roiscope::engine::reconciler::Reconciler;
use roiscope::providers::eastmoney::{EastmoneyDividends, EastmoneyFinancials};
use roiscope::providers::tencent::TencentQuoteProvider;
use roiscope::providers::xueqiu::XueqiuDividends;
use roiscope::providers::{DividendCalendar, DividendProvider, RoutedDividends};
use roiscope::report::{self, ConsoleSink, CsvSink, JsonSink, ReportSink};
use roiscope::storage;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let cfg = AppConfig::load_or_default(CONFIG_PATH);
    let today = chrono::Local::now().date_naive();
    let current_year = cfg.dividends.resolve_current_year(today);
    info!(
        app = %cfg.app.name,
        current_year,
        bases = ?cfg.report.bases,
        "ROISCOPE starting up"
    );

    // -- Providers ---------------------------------------------------------

    let p = &cfg.providers;
    let disclosed = Box::new(EastmoneyDividends::new(
        p.timeout_secs,
        &p.user_agent,
        DividendCalendar::new(current_year),
    )?);
    let dividends: Box<dyn DividendProvider> = if p.xueqiu_enabled {
        let token = p.resolve_xueqiu_token();
        if token.is_none() {
            warn!("No Xueqiu token configured, trailing dividend requests will likely be refused");
        }
        let trailing = XueqiuDividends::new(p.timeout_secs, &p.user_agent, token.as_deref())?;
        Box::new(RoutedDividends::new(disclosed, Box::new(trailing)))
    } else {
        disclosed
    };
    let reconciler = Reconciler::new(
        Box::new(TencentQuoteProvider::new(p.timeout_secs, &p.user_agent, p.tencent_pb_field)?),
        Box::new(EastmoneyFinancials::new(p.timeout_secs, &p.user_agent)?),
        dividends,
    );

    // -- One batch ---------------------------------------------------------

    let watchlist = storage::load_watchlist(&cfg.storage.watchlist_path);
    let ctx = BatchContext::snapshot(
        storage::load_rules(&cfg.storage.rules_path),
        &cfg.overrides.fixed_roe,
        cfg.notes.clone(),
    );
    let report = batch::run_batch(&reconciler, &watchlist, &ctx, &cfg.report.bases).await;

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(ConsoleSink)];
    if cfg.report.csv {
        sinks.push(Box::new(CsvSink::new(&cfg.report.output_dir)));
    }
    if cfg.report.json {
        sinks.push(Box::new(JsonSink::new(&cfg.report.output_dir)));
    }
    report::emit_all(&sinks, &report);

    // -- Optional API server ----------------------------------------------

    if !cfg.dashboard.enabled {
        info!("Batch complete, dashboard disabled. Exiting.");
        return Ok(());
    }

    let state = DashboardState::new(
        reconciler,
        cfg.storage.watchlist_path.clone(),
        cfg.storage.rules_path.clone(),
    )
    .with_bases(cfg.report.bases.clone())
    .with_overrides(cfg.overrides.fixed_roe.clone(), cfg.notes.clone());
    state.set_latest(report).await;

    info!("Serving API. Press Ctrl+C to stop.");
    dashboard::serve(Arc::new(state), cfg.dashboard.port, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received.");
    })
    .await?;

    info!("ROISCOPE shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
///
/// `RUST_LOG` overrides the default filter; `ROISCOPE_LOG_JSON` switches to
/// JSON lines.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("roiscope=info"));

    let json_logging = std::env::var("ROISCOPE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
