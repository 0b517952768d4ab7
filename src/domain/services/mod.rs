pub mod freshness_monitor;
pub mod portfolio_aggregator;
pub mod reference_engine;
