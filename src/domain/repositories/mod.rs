pub mod market_repository;
