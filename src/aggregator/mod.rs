/// Concurrency-safe collection point for per-target results
pub mod result_aggregator;

pub use result_aggregator::ResultAggregator;
