//! signalwatch core: indicator math, scoring, monitor state and alert logic.
//!
//! This crate holds everything that does not own a thread:
//! - Domain types (timeframes, candles, alert types, symbol keys)
//! - Stateless indicators and the volatility classifier
//! - The composite score engine
//! - Per-key monitor state and the cooldown alert decider
//! - The ranked report builder and message formatting
//! - Configuration loading and validation
//! - Collaborator traits with Bybit and Telegram adapters

pub mod alerts;
pub mod classifier;
pub mod config;
pub mod data;
pub mod domain;
pub mod indicators;
pub mod notify;
pub mod report;
pub mod score;
pub mod state;

pub use config::{ConfigError, MonitorConfig};
