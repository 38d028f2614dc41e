//! Core engine: providers → reconciler → calculator → rankings.

pub mod batch;
pub mod calculator;
pub mod ranking;
pub mod reconciler;
