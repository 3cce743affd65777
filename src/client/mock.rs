use super::{
    ActiveTarget, ApiFuture, BuildInfo, ClientFactory, DroppedTarget, ProbeApi, QueryValue,
    RuntimeInfo, Sample, TargetsSummary,
};
use crate::error::{ClientInitError, QueryError};
use crate::registry::TargetDescriptor;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory `ProbeApi` with scripted responses
///
/// Every clone shares the same call log, so a test can keep one handle
/// while the collector owns another.
#[derive(Debug, Clone)]
pub struct MockProbeApi {
    build_info: Result<BuildInfo, QueryError>,
    targets: Result<TargetsSummary, QueryError>,
    runtime_info: Result<RuntimeInfo, QueryError>,
    query: Result<QueryValue, QueryError>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl MockProbeApi {
    /// A server on which every call succeeds
    ///
    /// Version 2.30.0, 15d retention, 10 active and 0 dropped targets,
    /// 1000 time series, 50 chunks and an ingestion rate vector of `[5.0]`.
    pub fn healthy() -> Self {
        Self {
            build_info: Ok(BuildInfo {
                version: "2.30.0".to_string(),
                ..BuildInfo::default()
            }),
            targets: Ok(TargetsSummary {
                active: vec![ActiveTarget::default(); 10],
                dropped: Vec::new(),
            }),
            runtime_info: Ok(RuntimeInfo {
                storage_retention: "15d".to_string(),
                time_series_count: Some(1000),
                chunk_count: Some(50),
            }),
            query: Ok(QueryValue::Vector(vec![Sample::new(5.0)])),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A server whose first call already fails, as if nothing were listening
    pub fn unreachable() -> Self {
        let refused = QueryError::Http("connection refused".to_string());
        Self {
            build_info: Err(refused.clone()),
            targets: Err(refused.clone()),
            runtime_info: Err(refused.clone()),
            query: Err(refused),
            ..Self::healthy()
        }
    }

    pub fn with_build_info(mut self, response: Result<BuildInfo, QueryError>) -> Self {
        self.build_info = response;
        self
    }

    pub fn with_targets(mut self, response: Result<TargetsSummary, QueryError>) -> Self {
        self.targets = response;
        self
    }

    /// Respond to the target list with `active` active and `dropped` dropped targets
    pub fn with_target_counts(self, active: usize, dropped: usize) -> Self {
        self.with_targets(Ok(TargetsSummary {
            active: vec![ActiveTarget::default(); active],
            dropped: vec![DroppedTarget::default(); dropped],
        }))
    }

    pub fn with_runtime_info(mut self, response: Result<RuntimeInfo, QueryError>) -> Self {
        self.runtime_info = response;
        self
    }

    pub fn with_query(mut self, response: Result<QueryValue, QueryError>) -> Self {
        self.query = response;
        self
    }

    /// Respond to the instant query with a vector holding these sample values
    pub fn with_rate_samples(self, values: &[f64]) -> Self {
        let samples = values.iter().copied().map(Sample::new).collect();
        self.with_query(Ok(QueryValue::Vector(samples)))
    }

    /// Delay every response (useful for timeout and cancellation tests)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Names of the calls made so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn respond<T: Clone + Send + 'static>(
        &self,
        call: &'static str,
        response: &Result<T, QueryError>,
    ) -> ApiFuture<'_, T> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        let response = response.clone();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            response
        })
    }
}

impl ProbeApi for MockProbeApi {
    fn build_info(&self) -> ApiFuture<'_, BuildInfo> {
        self.respond("build_info", &self.build_info)
    }

    fn targets(&self) -> ApiFuture<'_, TargetsSummary> {
        self.respond("targets", &self.targets)
    }

    fn runtime_info(&self) -> ApiFuture<'_, RuntimeInfo> {
        self.respond("runtime_info", &self.runtime_info)
    }

    fn query<'a>(&'a self, _expr: &'a str, _time: DateTime<Utc>) -> ApiFuture<'a, QueryValue> {
        self.respond("query", &self.query)
    }
}

/// Factory handing out `MockProbeApi`s by target address
///
/// Addresses without a registered mock fail client construction.
#[derive(Debug, Clone, Default)]
pub struct MockClientFactory {
    clients: HashMap<String, MockProbeApi>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, address: impl Into<String>, client: MockProbeApi) -> Self {
        self.clients.insert(address.into(), client);
        self
    }
}

impl ClientFactory for MockClientFactory {
    fn create(&self, target: &TargetDescriptor) -> Result<Box<dyn ProbeApi>, ClientInitError> {
        match self.clients.get(&target.address) {
            Some(client) => Ok(Box::new(client.clone())),
            None => Err(ClientInitError::InvalidAddress {
                address: target.address.clone(),
                reason: "no mock registered".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_healthy_mock_responses() {
        let mock = MockProbeApi::healthy();

        assert_eq!(mock.build_info().await.unwrap().version, "2.30.0");
        assert_eq!(mock.targets().await.unwrap().active.len(), 10);
        assert_eq!(mock.runtime_info().await.unwrap().chunk_count, Some(50));
        assert_eq!(
            mock.query("up", Utc::now()).await.unwrap(),
            QueryValue::Vector(vec![Sample::new(5.0)])
        );
        assert_eq!(
            mock.calls(),
            vec!["build_info", "targets", "runtime_info", "query"]
        );
    }

    #[tokio::test]
    async fn test_clones_share_call_log() {
        let mock = MockProbeApi::unreachable();
        let handle = mock.clone();

        assert!(mock.build_info().await.is_err());
        assert_eq!(handle.calls(), vec!["build_info"]);
    }

    #[test]
    fn test_factory_rejects_unknown_address() {
        let factory = MockClientFactory::new().with_client("http://a:9090", MockProbeApi::healthy());

        assert!(factory
            .create(&TargetDescriptor::new("a", "http://a:9090"))
            .is_ok());
        assert!(factory
            .create(&TargetDescriptor::new("b", "http://b:9090"))
            .is_err());
    }
}
