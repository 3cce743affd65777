//! Result aggregator
//!
//! Gathers the `ProbeResult` of every collection task. Submissions may come
//! from any number of tasks at once; they are serialised by a mutex so no
//! record is lost or duplicated.

use crate::summary::ProbeResult;
use std::sync::{Mutex, MutexGuard};

/// Collects exactly one record per submission
///
/// Shared between tasks behind an `Arc`. The driver owns the barrier that
/// guarantees every submitter has finished before `collect_all` is called.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Mutex<Vec<ProbeResult>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an aggregator with room for `capacity` results
    ///
    /// # Arguments
    ///
    /// * `capacity` - Expected number of submissions, usually the registry size
    ///
    /// # Examples
    ///
    /// ```
    /// use prom_summary::aggregator::ResultAggregator;
    ///
    /// let aggregator = ResultAggregator::with_capacity(16);
    /// assert!(aggregator.is_empty());
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            results: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Add one finished result
    pub fn submit(&self, result: ProbeResult) {
        self.lock().push(result);
    }

    /// Number of results submitted so far
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every submitted result, sorted by target name
    ///
    /// Leaves the aggregator empty.
    pub fn collect_all(&self) -> Vec<ProbeResult> {
        let mut results = std::mem::take(&mut *self.lock());
        results.sort_by(|a, b| a.name().cmp(b.name()));
        results
    }

    // A panic while holding the lock cannot leave the Vec half-written
    fn lock(&self) -> MutexGuard<'_, Vec<ProbeResult>> {
        self.results.lock().unwrap_or_else(|e| e.into_inner())
    }
}
