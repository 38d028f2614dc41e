//! Persistence layer.
//!
//! The watchlist (`stocks.json`) and the override-rule table (`rules.json`)
//! are kept as pretty-printed JSON arrays. Rows are read one at a time: a
//! row that does not parse is dropped with a warning and the rest of the
//! table still applies.
//!
//! Loading for a batch never fails. A missing or unreadable watchlist falls
//! back to [`default_watchlist`], a missing or unreadable rule table to an
//! empty one. Edits are stricter: they refuse to touch a file that is not a
//! JSON array, and they write rejected rows back unchanged.

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::types::{OverrideRule, OverrideRules, RoiError, Ticker, WatchlistEntry};

/// Built-in watchlist used when none is stored.
pub fn default_watchlist() -> Vec<WatchlistEntry> {
    [
        ("东阿阿胶", "SZ000423"),
        ("五粮液", "SZ000858"),
        ("贵州茅台", "SH600519"),
        ("洋河股份", "SZ002304"),
    ]
    .into_iter()
    .filter_map(|(name, symbol)| {
        Ticker::parse(symbol).ok().map(|symbol| WatchlistEntry { name: name.to_string(), symbol })
    })
    .collect()
}

// ---------------------------------------------------------------------------
// Stored tables
// ---------------------------------------------------------------------------

/// A stored JSON array split into the rows that parsed and the raw rows
/// that did not.
#[derive(Debug)]
struct StoredTable<T> {
    rows: Vec<T>,
    rejected: Vec<Value>,
}

/// `Ok(None)` when the file does not exist. Errors only when the file cannot
/// be read or is not a JSON array.
fn read_table<T, F>(path: &str, check: F) -> Result<Option<StoredTable<T>>>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Result<(), RoiError>,
{
    let Some(raw) = read_json::<Vec<Value>>(path)? else {
        return Ok(None);
    };

    let mut table = StoredTable { rows: Vec::with_capacity(raw.len()), rejected: Vec::new() };
    for (index, value) in raw.into_iter().enumerate() {
        let parsed = serde_json::from_value::<T>(value.clone())
            .map_err(|e| RoiError::Configuration(e.to_string()))
            .and_then(|row| check(&row).map(|()| row));
        match parsed {
            Ok(row) => table.rows.push(row),
            Err(e) => {
                warn!(path, index, row = %value, error = %e, "Dropping invalid row");
                table.rejected.push(value);
            }
        }
    }
    Ok(Some(table))
}

fn write_table<T: Serialize>(path: &str, rows: &[T], rejected: &[Value]) -> Result<()> {
    let mut out = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to serialise rows")?;
    out.extend(rejected.iter().cloned());
    write_json(path, &out)?;
    debug!(path, rows = rows.len(), rejected = rejected.len(), "Table saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

/// Load the watchlist, falling back to the default list when the file is
/// missing, unreadable or holds no valid entry.
pub fn load_watchlist(path: &str) -> Vec<WatchlistEntry> {
    match read_table::<WatchlistEntry, _>(path, |_| Ok(())) {
        Ok(Some(table)) if !table.rows.is_empty() => {
            info!(path, count = table.rows.len(), dropped = table.rejected.len(), "Watchlist loaded");
            table.rows
        }
        Ok(Some(_)) => {
            info!(path, "Watchlist empty, using default list");
            default_watchlist()
        }
        Ok(None) => {
            info!(path, "No watchlist found, using default list");
            default_watchlist()
        }
        Err(e) => {
            let err = RoiError::Configuration(format!("{e:#}"));
            warn!(path, error = %err, "Watchlist unreadable, using default list");
            default_watchlist()
        }
    }
}

/// Watchlist as an edit sees it: the same fallbacks as [`load_watchlist`]
/// except that an unreadable file is an error.
fn watchlist_for_edit(path: &str) -> Result<StoredTable<WatchlistEntry>> {
    let table = read_table::<WatchlistEntry, _>(path, |_| Ok(()))
        .with_context(|| format!("Refusing to edit watchlist {path}"))?;
    Ok(match table {
        Some(table) if !table.rows.is_empty() => table,
        Some(table) => StoredTable { rows: default_watchlist(), rejected: table.rejected },
        None => StoredTable { rows: default_watchlist(), rejected: Vec::new() },
    })
}

/// Append a stock. Rejects a ticker that is already on the list.
pub fn add_stock(path: &str, entry: WatchlistEntry) -> Result<Vec<WatchlistEntry>> {
    if entry.name.trim().is_empty() {
        bail!("Stock name must not be empty");
    }
    let mut table = watchlist_for_edit(path)?;
    if table.rows.iter().any(|e| e.symbol == entry.symbol) {
        bail!("{} is already on the watchlist", entry.symbol);
    }
    info!(ticker = %entry.symbol, name = %entry.name, "Stock added");
    table.rows.push(entry);
    write_table(path, &table.rows, &table.rejected)?;
    Ok(table.rows)
}

/// Remove a stock. Returns `false` when it was not on the list.
pub fn remove_stock(path: &str, ticker: &Ticker) -> Result<bool> {
    let mut table = watchlist_for_edit(path)?;
    let before = table.rows.len();
    table.rows.retain(|e| &e.symbol != ticker);
    if table.rows.len() == before {
        return Ok(false);
    }
    write_table(path, &table.rows, &table.rejected)?;
    info!(ticker = %ticker, "Stock removed");
    Ok(true)
}

// ---------------------------------------------------------------------------
// Override rules
// ---------------------------------------------------------------------------

/// Load the rule table. Invalid rows are dropped one by one; duplicate
/// tickers resolve to the last entry.
pub fn load_rules(path: &str) -> OverrideRules {
    match read_table::<OverrideRule, _>(path, validate_rule) {
        Ok(Some(table)) => {
            let rules: OverrideRules = table.rows.into_iter().collect();
            info!(path, count = rules.len(), dropped = table.rejected.len(), "Override rules loaded");
            rules
        }
        Ok(None) => {
            debug!(path, "No rule table found, no overrides apply");
            OverrideRules::new()
        }
        Err(e) => {
            let err = RoiError::Configuration(format!("{e:#}"));
            warn!(path, error = %err, "Rule table unreadable, no overrides apply");
            OverrideRules::new()
        }
    }
}

/// Reject rules that carry no value or a non-finite one.
pub fn validate_rule(rule: &OverrideRule) -> Result<(), RoiError> {
    if rule.min_roe.is_none() && rule.fixed_roe.is_none() {
        return Err(RoiError::InvalidRule(format!(
            "{}: either min_roe or fixed_roe is required",
            rule.symbol
        )));
    }
    for (label, value) in [("min_roe", rule.min_roe), ("fixed_roe", rule.fixed_roe)] {
        if let Some(v) = value {
            if !v.is_finite() {
                return Err(RoiError::InvalidRule(format!("{}: {label} is not a number", rule.symbol)));
            }
        }
    }
    Ok(())
}

fn rules_for_edit(path: &str) -> Result<(OverrideRules, Vec<Value>)> {
    let table = read_table::<OverrideRule, _>(path, validate_rule)
        .with_context(|| format!("Refusing to edit rule table {path}"))?;
    Ok(match table {
        Some(table) => (table.rows.into_iter().collect(), table.rejected),
        None => (OverrideRules::new(), Vec::new()),
    })
}

/// Insert or replace the rule for a ticker and persist the table.
pub fn upsert_rule(path: &str, rule: OverrideRule) -> Result<OverrideRules> {
    validate_rule(&rule)?;
    let (mut rules, rejected) = rules_for_edit(path)?;
    info!(ticker = %rule.symbol, min_roe = ?rule.min_roe, fixed_roe = ?rule.fixed_roe, "Rule saved");
    rules.upsert(rule);
    write_table(path, &rules.to_vec(), &rejected)?;
    Ok(rules)
}

/// Delete the rule for a ticker. Returns `false` when none existed.
pub fn remove_rule(path: &str, ticker: &Ticker) -> Result<bool> {
    let (mut rules, rejected) = rules_for_edit(path)?;
    if rules.remove(ticker).is_none() {
        return Ok(false);
    }
    write_table(path, &rules.to_vec(), &rejected)?;
    info!(ticker = %ticker, "Rule removed");
    Ok(true)
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// `Ok(None)` when the file does not exist.
fn read_json<T: DeserializeOwned>(path: &str) -> Result<Option<T>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    let value = serde_json::from_str(&json).with_context(|| format!("Failed to parse {path}"))?;
    Ok(Some(value))
}

fn write_json<T: Serialize + ?Sized>(path: &str, value: &T) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory for {path}"))?;
        }
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialise JSON")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {path}"))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
