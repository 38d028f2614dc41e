//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every section has defaults, so a partial file is valid and a missing
//! file falls back to [`AppConfig::default`] instead of aborting the run.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::types::{DividendBasis, Ticker};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub providers: ProvidersConfig,
    pub dividends: DividendsConfig,
    pub storage: StorageConfig,
    pub report: ReportConfig,
    pub dashboard: DashboardConfig,
    pub overrides: OverridesConfig,
    /// Free-text remark per ticker, attached to every result for that ticker.
    pub notes: BTreeMap<Ticker, String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self { name: "ROISCOPE".to_string() }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Index of the PB field in the `~`-separated Tencent quote line.
    /// Older response layouts carried it at 38.
    pub tencent_pb_field: usize,
    /// Query Xueqiu for the trailing dividend and yield.
    pub xueqiu_enabled: bool,
    /// `xq_a_token` cookie for Xueqiu. `XUEQIU_TOKEN` in the environment
    /// takes precedence.
    pub xueqiu_token: Option<String>,
}

impl ProvidersConfig {
    /// Xueqiu token from the environment, else from the file.
    pub fn resolve_xueqiu_token(&self) -> Option<String> {
        std::env::var("XUEQIU_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.xueqiu_token.clone())
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            tencent_pb_field: 46,
            xueqiu_enabled: true,
            xueqiu_token: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DividendsConfig {
    /// Year of the current interim snapshot. Derived from today when absent.
    pub current_year: Option<i32>,
}

impl DividendsConfig {
    /// Resolve the current interim year against `today`.
    ///
    /// Interim distributions are disclosed over the summer, so before
    /// September the latest complete interim belongs to the previous year.
    pub fn resolve_current_year(&self, today: NaiveDate) -> i32 {
        self.current_year.unwrap_or_else(|| {
            if today.month() >= 9 {
                today.year()
            } else {
                today.year() - 1
            }
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub watchlist_path: String,
    pub rules_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            watchlist_path: "stocks.json".to_string(),
            rules_path: "rules.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: String,
    pub bases: Vec<DividendBasis>,
    pub csv: bool,
    pub json: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: "data/output".to_string(),
            bases: vec![DividendBasis::Ltm, DividendBasis::Annual],
            csv: true,
            json: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { enabled: false, port: 5000 }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct OverridesConfig {
    /// Ticker → fixed ROE in percent.
    pub fixed_roe: BTreeMap<Ticker, f64>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_or_default(path: &str) -> Self {
        if !Path::new(path).exists() {
            warn!(path, "Config file not found, using built-in defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path, error = %e, "Config file unusable, using built-in defaults");
                Self::default()
            }
        }
    }
}
