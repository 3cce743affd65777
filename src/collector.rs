//! Per-target probe sequence
//!
//! A `Collector` runs the ordered probe steps against one target and turns
//! the responses into a single `ProbeResult`. Each step only runs if every
//! previous step succeeded; the first failure ends the sequence and is
//! recorded as the result's cause.

use crate::client::{ClientFactory, QueryValue, Sample};
use crate::error::{ProbeError, ProbeStep, QueryError};
use crate::registry::TargetDescriptor;
use crate::summary::{ProbeFields, ProbeResult};
use chrono::Utc;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-second ingestion rate of the TSDB head over the last five minutes
pub const DEFAULT_INGESTION_RATE_QUERY: &str =
    "rate(prometheus_tsdb_head_samples_appended_total[5m])";

/// Default deadline for a single remote call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs the probe sequence for individual targets
///
/// A collector holds no per-target state, so one instance can be shared by
/// every concurrent collection task.
pub struct Collector {
    factory: Arc<dyn ClientFactory>,
    cancel: CancellationToken,
    call_timeout: Duration,
    ingestion_query: String,
}

impl Collector {
    /// Create a collector
    ///
    /// # Arguments
    ///
    /// * `factory` - Builds one probe client per target
    /// * `cancel` - Process-wide cancellation signal raced against every remote call
    ///
    /// # Examples
    ///
    /// ```
    /// use prom_summary::client::HttpClientFactory;
    /// use prom_summary::collector::Collector;
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// let factory = Arc::new(HttpClientFactory::new(Duration::from_secs(10)));
    /// let collector = Collector::new(factory, CancellationToken::new())
    ///     .with_call_timeout(Duration::from_secs(10));
    /// ```
    pub fn new(factory: Arc<dyn ClientFactory>, cancel: CancellationToken) -> Self {
        Self {
            factory,
            cancel,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            ingestion_query: DEFAULT_INGESTION_RATE_QUERY.to_string(),
        }
    }

    /// Bound every remote call by `timeout`
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Use `query` instead of the default ingestion rate expression
    pub fn with_ingestion_query(mut self, query: impl Into<String>) -> Self {
        self.ingestion_query = query.into();
        self
    }

    /// Probe one target
    ///
    /// Never fails: any error is recorded in the returned result together
    /// with the values gathered by the steps that completed before it.
    pub async fn collect(&self, target: &TargetDescriptor) -> ProbeResult {
        let mut fields = ProbeFields::default();
        let outcome = self.run_sequence(target, &mut fields).await;

        match &outcome {
            Ok(()) => info!("[{}] collected summary from {}", target.name, target.address),
            Err(e) => warn!("[{}] {}", target.name, e),
        }

        ProbeResult::completed(target, fields, outcome)
    }

    async fn run_sequence(
        &self,
        target: &TargetDescriptor,
        fields: &mut ProbeFields,
    ) -> Result<(), ProbeError> {
        let client = self.factory.create(target)?;

        let build_info = self.call(target, ProbeStep::BuildInfo, client.build_info()).await?;
        fields.version = Some(build_info.version);

        let targets = self.call(target, ProbeStep::Targets, client.targets()).await?;
        fields.active_target_count = Some(targets.active.len() as u64);
        fields.dropped_target_count = Some(targets.dropped.len() as u64);

        let runtime_info = self
            .call(target, ProbeStep::RuntimeInfo, client.runtime_info())
            .await?;
        fields.storage_retention = Some(runtime_info.storage_retention);
        fields.time_series_count = runtime_info.time_series_count;
        fields.chunk_count = runtime_info.chunk_count;

        let value = self
            .call(
                target,
                ProbeStep::IngestionRate,
                client.query(&self.ingestion_query, Utc::now()),
            )
            .await?;
        let samples = match value {
            QueryValue::Vector(samples) => samples,
            other => {
                return Err(ProbeError::query(
                    ProbeStep::IngestionRate,
                    QueryError::UnsupportedResultType(other.kind().to_string()),
                ))
            }
        };
        fields.ingested_samples_per_second = mean_sample_value(&samples);

        Ok(())
    }

    /// Await one remote call, bounded by the call timeout and the cancellation token
    async fn call<T, F>(
        &self,
        target: &TargetDescriptor,
        step: ProbeStep,
        request: F,
    ) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, QueryError>>,
    {
        debug!("[{}] {}", target.name, step);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(QueryError::Cancelled),
            response = tokio::time::timeout(self.call_timeout, request) => {
                response.unwrap_or(Err(QueryError::Timeout(self.call_timeout)))
            }
        };

        result.map_err(|e| ProbeError::query(step, e))
    }
}

/// Arithmetic mean of the sample values of an instant vector
///
/// Returns `None` for an empty vector.
pub fn mean_sample_value(samples: &[Sample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let sum: f64 = samples.iter().map(|s| s.value.value).sum();
    Some(sum / samples.len() as f64)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::client::{MockClientFactory, MockProbeApi};
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;

    /// Which step (if any) of the probe sequence fails
    #[derive(Debug, Clone, Copy)]
    struct FailingStep(Option<ProbeStep>);

    impl Arbitrary for FailingStep {
        fn arbitrary(g: &mut Gen) -> Self {
            let steps = [
                None,
                Some(ProbeStep::BuildInfo),
                Some(ProbeStep::Targets),
                Some(ProbeStep::RuntimeInfo),
                Some(ProbeStep::IngestionRate),
            ];
            FailingStep(*g.choose(&steps).unwrap())
        }
    }

    fn err<T>() -> Result<T, QueryError> {
        Err(QueryError::Http("boom".to_string()))
    }

    fn mock_failing_at(step: Option<ProbeStep>) -> MockProbeApi {
        let mock = MockProbeApi::healthy();
        match step {
            None | Some(ProbeStep::InitClient) => mock,
            Some(ProbeStep::BuildInfo) => mock.with_build_info(err()),
            Some(ProbeStep::Targets) => mock.with_targets(err()),
            Some(ProbeStep::RuntimeInfo) => mock.with_runtime_info(err()),
            Some(ProbeStep::IngestionRate) => mock.with_query(err()),
        }
    }

    // Status is NotOk iff an error is recorded, and fields of the failing
    // step and every later step stay empty
    #[quickcheck]
    fn prop_result_is_prefix_of_completed_steps(failing: FailingStep) -> bool {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let factory = MockClientFactory::new()
            .with_client("http://prom:9090", mock_failing_at(failing.0));
        let collector = Collector::new(Arc::new(factory), CancellationToken::new());
        let target = TargetDescriptor::new("prod", "http://prom:9090");

        let result = runtime.block_on(collector.collect(&target));
        let fields = result.fields();

        let reached = |step: ProbeStep| match failing.0 {
            None => true,
            Some(failed) => (step as u8) < (failed as u8),
        };

        result.status().is_ok() == failing.0.is_none()
            && result.error().is_some() == failing.0.is_some()
            && fields.version.is_some() == reached(ProbeStep::BuildInfo)
            && fields.active_target_count.is_some() == reached(ProbeStep::Targets)
            && fields.storage_retention.is_some() == reached(ProbeStep::RuntimeInfo)
            && fields.ingested_samples_per_second.is_some() == reached(ProbeStep::IngestionRate)
    }

    #[quickcheck]
    fn prop_mean_is_bounded_by_samples(values: Vec<u16>) -> bool {
        let samples: Vec<Sample> = values.iter().map(|v| Sample::new(*v as f64)).collect();
        match mean_sample_value(&samples) {
            None => values.is_empty(),
            Some(mean) => {
                let min = *values.iter().min().unwrap() as f64;
                let max = *values.iter().max().unwrap() as f64;
                mean >= min - 1e-9 && mean <= max + 1e-9
            }
        }
    }
}
