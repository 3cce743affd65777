//! Fan-out / fan-in driver
//!
//! Spawns one collection task per registered target, waits for all of them
//! and returns the aggregated results.

use crate::aggregator::ResultAggregator;
use crate::collector::Collector;
use crate::error::ProbeError;
use crate::registry::TargetRegistry;
use crate::summary::ProbeResult;
use log::{error, info};
use std::sync::Arc;

/// Runs a collection round over a target registry
pub struct SummaryRunner {
    collector: Arc<Collector>,
}

impl SummaryRunner {
    pub fn new(collector: Collector) -> Self {
        Self {
            collector: Arc::new(collector),
        }
    }

    /// Probe every target concurrently and gather one result per target
    ///
    /// All tasks are spawned before any is awaited. A target whose task
    /// dies without submitting a result is recorded as failed, so the
    /// returned set always has exactly one entry per registry target.
    ///
    /// # Returns
    ///
    /// The results sorted by target name
    pub async fn run(&self, registry: &TargetRegistry) -> Vec<ProbeResult> {
        info!("Collecting summaries from {} target(s)", registry.len());

        let aggregator = Arc::new(ResultAggregator::with_capacity(registry.len()));
        let mut tasks = Vec::with_capacity(registry.len());

        for target in registry.iter() {
            let collector = Arc::clone(&self.collector);
            let aggregator = Arc::clone(&aggregator);
            let task_target = target.clone();

            let handle = tokio::spawn(async move {
                let result = collector.collect(&task_target).await;
                aggregator.submit(result);
            });
            tasks.push((target, handle));
        }

        // Wait-all barrier
        for (target, handle) in tasks {
            if let Err(e) = handle.await {
                error!("[{}] collection task failed: {}", target.name, e);
                aggregator.submit(ProbeResult::failed(target, ProbeError::Task(e.to_string())));
            }
        }

        let results = aggregator.collect_all();
        let healthy = results.iter().filter(|r| r.status().is_ok()).count();
        info!(
            "Collection finished: {} OK, {} NotOK",
            healthy,
            results.len() - healthy
        );
        results
    }
}
