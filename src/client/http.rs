use super::{ApiFuture, BuildInfo, ClientFactory, ProbeApi, QueryValue, RuntimeInfo, TargetsSummary};
use crate::error::{ClientInitError, QueryError};
use crate::registry::{Credentials, TargetDescriptor};
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::{Client, Request, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const BUILD_INFO_PATH: &str = "api/v1/status/buildinfo";
const TARGETS_PATH: &str = "api/v1/targets";
const RUNTIME_INFO_PATH: &str = "api/v1/status/runtimeinfo";
const QUERY_PATH: &str = "api/v1/query";

/// Longest response body quoted in an error message
const MAX_ERROR_BODY: usize = 256;

/// Attaches HTTP Basic Authentication to outgoing requests
///
/// The request handed to `authorize` is never modified: it is cloned
/// (header map included) and the credentials are set on the clone only.
#[derive(Debug, Clone)]
pub struct BasicAuthTransport {
    credentials: Credentials,
}

impl BasicAuthTransport {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Return an authenticated copy of `request`
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Http` if the request has a streaming body that
    /// cannot be cloned.
    pub fn authorize(&self, client: &Client, request: &Request) -> Result<Request, QueryError> {
        let copy = request
            .try_clone()
            .ok_or_else(|| QueryError::Http("request body cannot be cloned".to_string()))?;

        RequestBuilder::from_parts(client.clone(), copy)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .build()
            .map_err(QueryError::from)
    }
}

/// Envelope wrapping every Prometheus API response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEnvelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// Prometheus HTTP API client for a single server
pub struct PrometheusClient {
    client: Client,
    base_url: Url,
    auth: Option<BasicAuthTransport>,
}

impl PrometheusClient {
    /// Create a client for the server at `address`
    ///
    /// No connection is made here.
    ///
    /// # Arguments
    ///
    /// * `address` - Absolute `http` or `https` URL of the server, optionally with a path prefix
    /// * `credentials` - Basic Authentication credentials applied to every request
    /// * `timeout` - Per-request timeout of the underlying HTTP client
    ///
    /// # Errors
    ///
    /// Returns `ClientInitError::InvalidAddress` if the address is not a usable
    /// endpoint, or `ClientInitError::Transport` if the HTTP client cannot be built.
    pub fn new(
        address: &str,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Result<Self, ClientInitError> {
        let base_url = Self::parse_base_url(address)?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientInitError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            auth: credentials.map(BasicAuthTransport::new),
        })
    }

    /// Parse and normalise a server address so API paths can be joined onto it
    fn parse_base_url(address: &str) -> Result<Url, ClientInitError> {
        let invalid = |reason: String| ClientInitError::InvalidAddress {
            address: address.to_string(),
            reason,
        };

        let mut url = Url::parse(address.trim()).map_err(|e| invalid(e.to_string()))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }

        // A trailing slash keeps any path prefix when joining API paths
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(url)
    }

    /// Full URL of an API endpoint
    fn endpoint(&self, path: &str) -> Result<Url, QueryError> {
        self.base_url
            .join(path)
            .map_err(|e| QueryError::Http(format!("invalid endpoint '{}': {}", path, e)))
    }

    /// Send a request and decode the `data` field of the response envelope
    async fn send<T: DeserializeOwned>(&self, request: Request) -> Result<T, QueryError> {
        let request = match &self.auth {
            Some(auth) => auth.authorize(&self.client, &request)?,
            None => request,
        };

        debug!("{} {}", request.method(), request.url());

        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        decode_envelope(status, &body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, QueryError> {
        let request = self.client.get(self.endpoint(path)?).build()?;
        self.send(request).await
    }
}

/// Decode a Prometheus API response body
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, QueryError> {
    let envelope: ApiEnvelope<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => {
            return Err(QueryError::InvalidResponse(e.to_string()));
        }
        Err(_) => {
            return Err(QueryError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }
    };

    for warning in &envelope.warnings {
        debug!("API warning: {}", warning);
    }

    if envelope.status == "error" {
        return Err(QueryError::Api {
            error_type: envelope.error_type.unwrap_or_else(|| "error".to_string()),
            message: envelope.error.unwrap_or_default(),
        });
    }

    if !status.is_success() {
        return Err(QueryError::Status {
            status: status.as_u16(),
            body: truncate_body(body),
        });
    }

    envelope
        .data
        .ok_or_else(|| QueryError::InvalidResponse("missing 'data' field".to_string()))
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

impl ProbeApi for PrometheusClient {
    fn build_info(&self) -> ApiFuture<'_, BuildInfo> {
        Box::pin(self.get(BUILD_INFO_PATH))
    }

    fn targets(&self) -> ApiFuture<'_, TargetsSummary> {
        Box::pin(self.get(TARGETS_PATH))
    }

    fn runtime_info(&self) -> ApiFuture<'_, RuntimeInfo> {
        Box::pin(self.get(RUNTIME_INFO_PATH))
    }

    fn query<'a>(&'a self, expr: &'a str, time: DateTime<Utc>) -> ApiFuture<'a, QueryValue> {
        Box::pin(async move {
            let request = self
                .client
                .get(self.endpoint(QUERY_PATH)?)
                .query(&[
                    ("query", expr.to_string()),
                    ("time", time.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ])
                .build()?;
            self.send(request).await
        })
    }
}

/// Factory producing `PrometheusClient`s
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    timeout: Duration,
}

impl HttpClientFactory {
    /// # Arguments
    ///
    /// * `timeout` - Per-request timeout installed on every client
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(&self, target: &TargetDescriptor) -> Result<Box<dyn ProbeApi>, ClientInitError> {
        let client =
            PrometheusClient::new(&target.address, target.credentials.clone(), self.timeout)?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Collector;
    use crate::summary::ProbeStatus;
    use reqwest::header::AUTHORIZATION;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    fn client(address: &str) -> PrometheusClient {
        PrometheusClient::new(address, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_rejects_unparseable_address() {
        let result = PrometheusClient::new("not a url", None, Duration::from_secs(5));
        assert!(matches!(
            result,
            Err(ClientInitError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let result = PrometheusClient::new("ftp://prom:9090", None, Duration::from_secs(5));
        match result {
            Err(ClientInitError::InvalidAddress { reason, .. }) => {
                assert!(reason.contains("ftp"));
            }
            _ => panic!("expected InvalidAddress"),
        }
    }

    #[test]
    fn test_endpoint_keeps_path_prefix() {
        let proxied = client("http://proxy:8080/prometheus");
        assert_eq!(
            proxied.endpoint(BUILD_INFO_PATH).unwrap().as_str(),
            "http://proxy:8080/prometheus/api/v1/status/buildinfo"
        );

        let plain = client("http://prom:9090/");
        assert_eq!(
            plain.endpoint(TARGETS_PATH).unwrap().as_str(),
            "http://prom:9090/api/v1/targets"
        );
    }

    #[test]
    fn test_authorize_does_not_mutate_original_request() {
        let client = Client::new();
        let original = client
            .get("http://prom:9090/api/v1/targets")
            .header("X-Scope", "team-a")
            .build()
            .unwrap();
        let auth = BasicAuthTransport::new(Credentials::new("admin", "secret"));

        let authorized = auth.authorize(&client, &original).unwrap();

        assert!(original.headers().get(AUTHORIZATION).is_none());
        assert_eq!(original.headers().get("X-Scope").unwrap(), "team-a");
        assert_eq!(
            authorized.headers().get(AUTHORIZATION).unwrap(),
            "Basic YWRtaW46c2VjcmV0"
        );
        assert_eq!(authorized.headers().get("X-Scope").unwrap(), "team-a");
        assert_eq!(authorized.url(), original.url());
    }

    #[test]
    fn test_decode_success_envelope() {
        let body = br#"{"status":"success","data":{"version":"2.30.0","revision":"abc","goVersion":"go1.17"}}"#;
        let info: BuildInfo = decode_envelope(StatusCode::OK, body).unwrap();
        assert_eq!(info.version, "2.30.0");
        assert_eq!(info.go_version, "go1.17");
    }

    #[test]
    fn test_decode_error_envelope() {
        let body = br#"{"status":"error","errorType":"bad_data","error":"parse error at char 5"}"#;
        let err = decode_envelope::<QueryValue>(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert_eq!(
            err,
            QueryError::Api {
                error_type: "bad_data".to_string(),
                message: "parse error at char 5".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_non_json_failure() {
        let err = decode_envelope::<BuildInfo>(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>")
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::Status {
                status: 502,
                body: "<html>bad gateway</html>".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_missing_data() {
        let err = decode_envelope::<BuildInfo>(StatusCode::OK, br#"{"status":"success"}"#)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidResponse(_)));
    }

    #[test]
    fn test_decode_invalid_json_on_success() {
        let err = decode_envelope::<BuildInfo>(StatusCode::OK, b"not json").unwrap_err();
        assert!(matches!(err, QueryError::InvalidResponse(_)));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(MAX_ERROR_BODY + 10);
        let truncated = truncate_body(long.as_bytes());
        assert_eq!(truncated.len(), MAX_ERROR_BODY + 3);
        assert!(truncated.ends_with("..."));
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_on_request() {
        // Nothing listens on port 1; creation succeeds, the call fails
        let factory = HttpClientFactory::new(Duration::from_secs(2));
        let target = TargetDescriptor::new("down", "http://127.0.0.1:1");
        let client = factory.create(&target).unwrap();

        let result = client.build_info().await;
        assert!(matches!(result, Err(QueryError::Http(_))));
    }

    /// Serve canned API envelopes on a local port, recording every request head
    async fn serve_envelopes() -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&head).to_string();
                    let path = head.split_whitespace().nth(1).unwrap_or_default().to_string();

                    let data = if path.starts_with("/api/v1/status/buildinfo") {
                        r#"{"version":"2.30.0","revision":"abc"}"#
                    } else if path.starts_with("/api/v1/targets") {
                        r#"{"activeTargets":[{"health":"up"},{"health":"down"}],"droppedTargets":[{}]}"#
                    } else if path.starts_with("/api/v1/status/runtimeinfo") {
                        r#"{"storageRetention":"15d","timeSeriesCount":1000,"chunkCount":50}"#
                    } else {
                        r#"{"resultType":"vector","result":[{"metric":{},"value":[1.0,"2"]},{"metric":{},"value":[1.0,"4"]}]}"#
                    };
                    let body = format!(r#"{{"status":"success","data":{}}}"#, data);
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );

                    recorded.lock().unwrap().push(head);
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        (address, requests)
    }

    fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    #[tokio::test]
    async fn test_authenticated_collection_over_http() {
        let (address, requests) = serve_envelopes().await;
        let target = TargetDescriptor::new("local", address)
            .with_credentials(Credentials::new("admin", "secret"));
        let collector = Collector::new(
            Arc::new(HttpClientFactory::new(Duration::from_secs(5))),
            CancellationToken::new(),
        );

        let result = collector.collect(&target).await;

        assert_eq!(result.status(), &ProbeStatus::Ok);
        let fields = result.fields();
        assert_eq!(fields.version.as_deref(), Some("2.30.0"));
        assert_eq!(fields.active_target_count, Some(2));
        assert_eq!(fields.dropped_target_count, Some(1));
        assert_eq!(fields.storage_retention.as_deref(), Some("15d"));
        assert_eq!(fields.time_series_count, Some(1000));
        assert_eq!(fields.chunk_count, Some(50));
        assert_eq!(fields.ingested_samples_per_second, Some(3.0));

        let requests = requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 4);
        for head in &requests {
            assert_eq!(header(head, "authorization"), Some("Basic YWRtaW46c2VjcmV0"));
        }

        let query_line = requests
            .iter()
            .map(|head| head.lines().next().unwrap_or_default())
            .find(|line| line.contains("/api/v1/query?"))
            .unwrap();
        assert!(query_line.starts_with("GET /api/v1/query?query=rate%28prometheus_tsdb_head_samples_appended_total%5B5m%5D%29&time="));
        let url = query_line.split_whitespace().nth(1).unwrap();
        assert!(url.ends_with('Z'));
    }
}
