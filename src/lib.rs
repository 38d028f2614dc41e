//! ROISCOPE: dividend-yield and ROE/PB screening for A-share equities.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod providers;
pub mod engine;
pub mod storage;
pub mod report;
pub mod dashboard;
