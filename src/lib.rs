//! botwatch - read-only monitoring backend for a DCA trading bot
//!
//! Serves balances, trades, price history and per-coin DCA signals computed
//! from the tables the trading engine writes.

pub mod application;
pub mod config;
pub mod domain;
pub mod persistence;
pub mod rate_limit;
pub mod task_runner;
