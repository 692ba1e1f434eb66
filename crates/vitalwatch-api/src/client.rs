// Data access client
//
// Wraps `reqwest::Client` with a hard per-request timeout, a time-boxed
// cache for GET responses, and fallback substitution for failed reads.
// Endpoint-level wrappers live in `resources.rs` as inherent methods to
// keep this module focused on transport mechanics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::cache::{ResponseCache, cache_key};
use crate::endpoints::{Endpoint, EndpointTable};
use crate::error::Error;
use crate::fallback::FallbackSource;
use crate::fanout::Settled;
use crate::transport::TransportConfig;

/// Default hard timeout for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Default freshness window for cached GET responses.
pub const DEFAULT_CACHE_WINDOW: Duration = Duration::from_millis(30_000);

// ── Configuration ────────────────────────────────────────────────────

/// Runtime configuration for an [`ApiClient`].
///
/// Built by the caller (CLI, config crate); never touches disk.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://telemetry.example.com`.
    pub base_url: Url,
    /// Hard budget for each network call.
    pub timeout: Duration,
    /// How long a cached GET response may be reused.
    pub cache_window: Duration,
    /// Symbolic endpoint routing.
    pub endpoints: EndpointTable,
    /// TLS and connection settings.
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Configuration with default timeout, cache window and endpoints.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            cache_window: DEFAULT_CACHE_WINDOW,
            endpoints: EndpointTable::default(),
            transport: TransportConfig::default(),
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────

/// Where a response payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Fresh from the network.
    Live,
    /// Reused from the response cache.
    Cache,
    /// Substituted from the fallback source after a failed call.
    Fallback,
}

/// A decoded JSON payload tagged with its [`Origin`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub data: Value,
    pub origin: Origin,
}

impl ApiResponse {
    pub fn new(data: Value, origin: Origin) -> Self {
        Self { data, origin }
    }

    /// `true` unless the payload was substituted from the fallback source.
    pub fn is_live_data(&self) -> bool {
        self.origin != Origin::Fallback
    }
}

/// Snapshot of the client's connectivity as of the last probe.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub is_online: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub base_url: String,
    pub cache_size: usize,
}

/// Monotonic request counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageStats {
    /// Network calls issued (cache hits excluded).
    pub total_requests: u64,
    pub cache_hits: u64,
    pub errors: u64,
    /// Failed reads answered from the fallback source.
    pub fallbacks: u64,
    pub last_success: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    errors: AtomicU64,
    fallbacks: AtomicU64,
}

#[derive(Default)]
struct ProbeState {
    is_online: bool,
    last_check: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
}

// ── Client ───────────────────────────────────────────────────────────

/// HTTP client for the telemetry API.
///
/// GET responses are cached per `(method, path)` for the configured
/// window; failed GETs are answered from the fallback source when one is
/// attached and has an entry for the path. POST/PUT never touch the cache
/// and never fall back.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    endpoints: EndpointTable,
    cache: ResponseCache,
    fallback: Option<Arc<dyn FallbackSource>>,
    probe: RwLock<ProbeState>,
    counters: Counters,
}

impl ApiClient {
    /// Build a client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = config.transport.build_client()?;
        Ok(Self::with_client(http, config))
    }

    /// Wrap a pre-built `reqwest::Client`. The caller is responsible for
    /// its default headers.
    pub fn with_client(http: reqwest::Client, config: ClientConfig) -> Self {
        Self {
            http,
            base_url: config.base_url,
            timeout: config.timeout,
            endpoints: config.endpoints,
            cache: ResponseCache::new(config.cache_window),
            fallback: None,
            probe: RwLock::new(ProbeState::default()),
            counters: Counters::default(),
        }
    }

    /// Attach a fallback source for failed reads.
    pub fn with_fallback(mut self, source: Arc<dyn FallbackSource>) -> Self {
        self.fallback = Some(source);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoints(&self) -> &EndpointTable {
        &self.endpoints
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cache_window(&self) -> Duration {
        self.cache.window()
    }

    // ── Core request ─────────────────────────────────────────────────

    /// Perform one HTTP operation against a resolved path.
    ///
    /// `body` is sent as JSON for POST and PUT only. `use_cache` only
    /// affects GET.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        use_cache: bool,
    ) -> Result<ApiResponse, Error> {
        let is_get = method == Method::GET;
        let key = cache_key(&method, path);

        if is_get && use_cache {
            if let Some(data) = self.cache.get(&key) {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(path, "serving cached response");
                return Ok(ApiResponse::new(data, Origin::Cache));
            }
        }

        match self.execute(method.clone(), path, body).await {
            Ok(data) => {
                self.record_success();
                if is_get && use_cache {
                    self.cache.insert(key, data.clone());
                }
                Ok(ApiResponse::new(data, Origin::Live))
            }
            Err(err) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                if is_get {
                    if let Some(data) = self.lookup_fallback(path) {
                        warn!(path, error = %err, "request failed, serving fallback data");
                        self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
                        return Ok(ApiResponse::new(data, Origin::Fallback));
                    }
                }
                warn!(%method, path, error = %err, "request failed");
                Err(err)
            }
        }
    }

    /// `GET` with caching and fallback.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, Error> {
        self.request(Method::GET, path, None, true).await
    }

    /// `GET` that always hits the network (fallback still applies).
    pub async fn get_fresh(&self, path: &str) -> Result<ApiResponse, Error> {
        self.request(Method::GET, path, None, false).await
    }

    /// `POST` a JSON body. Never cached, never falls back.
    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<ApiResponse, Error> {
        self.request(Method::POST, path, body, false).await
    }

    /// `PUT` a JSON body. Never cached, never falls back.
    pub async fn put(&self, path: &str, body: &Value) -> Result<ApiResponse, Error> {
        self.request(Method::PUT, path, Some(body), false).await
    }

    /// Issue concurrent GETs and wait for every one to settle.
    ///
    /// One failure never aborts the others; results keep input order.
    pub async fn get_all(&self, paths: &[&str]) -> Vec<Settled> {
        let futs = paths.iter().map(|&path| async move {
            Settled {
                path: path.to_owned(),
                result: self.get(path).await,
            }
        });
        futures_util::future::join_all(futs).await
    }

    /// Read the fallback source directly, without touching the network.
    pub fn fallback_value(&self, path: &str) -> Result<ApiResponse, Error> {
        self.lookup_fallback(path)
            .map(|data| ApiResponse::new(data, Origin::Fallback))
            .ok_or_else(|| Error::FallbackUnavailable {
                path: path.to_owned(),
            })
    }

    // ── Connectivity ─────────────────────────────────────────────────

    /// Probe the health endpoint.
    ///
    /// Online iff the body carries `"status": "healthy"`. Bypasses both
    /// cache and fallback, never fails, and records the outcome and probe
    /// time for [`connection_status`](Self::connection_status).
    pub async fn check_connection(&self) -> bool {
        let path = self.endpoints.path(Endpoint::Health).to_owned();
        debug!(path, "checking API connectivity");

        let online = match self.execute(Method::GET, &path, None).await {
            Ok(body) if is_healthy(&body) => {
                self.record_success();
                let version = body.get("version").and_then(Value::as_str).unwrap_or("unknown");
                info!(version, "API online");
                true
            }
            Ok(body) => {
                warn!(status = ?body.get("status"), "health check returned an unhealthy status");
                false
            }
            Err(err) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "API offline");
                false
            }
        };

        let mut probe = self.probe.write().unwrap_or_else(PoisonError::into_inner);
        probe.is_online = online;
        probe.last_check = Some(Utc::now());
        online
    }

    /// Whether the last probe found the API online.
    pub fn is_online(&self) -> bool {
        self.probe.read().unwrap_or_else(PoisonError::into_inner).is_online
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let probe = self.probe.read().unwrap_or_else(PoisonError::into_inner);
        ConnectionStatus {
            is_online: probe.is_online,
            last_check: probe.last_check,
            base_url: self.base_url.to_string(),
            cache_size: self.cache.len(),
        }
    }

    pub fn usage_stats(&self) -> UsageStats {
        let probe = self.probe.read().unwrap_or_else(PoisonError::into_inner);
        UsageStats {
            total_requests: self.counters.requests.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
            last_success: probe.last_success,
        }
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("response cache cleared");
    }

    // ── Transport mechanics ──────────────────────────────────────────

    /// Join a resolved path onto the base URL, preserving any base path.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let full = format!("{base}/{}", path.trim_start_matches('/'));
        Ok(Url::parse(&full)?)
    }

    /// One network call under the hard timeout. Dropping the inner future
    /// on expiry aborts the in-flight request.
    async fn execute(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, Error> {
        let url = self.url(path)?;
        debug!(%method, %url, "API request");
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let sends_body = method == Method::POST || method == Method::PUT;
        let mut builder = self.http.request(method, url);
        if let (true, Some(body)) = (sends_body, body) {
            builder = builder.json(body);
        }

        let call = async move {
            let resp = builder.send().await?;
            read_json(resp).await
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_ms: duration_millis(self.timeout),
            }),
        }
    }

    fn lookup_fallback(&self, path: &str) -> Option<Value> {
        self.fallback.as_ref().and_then(|source| source.lookup(path))
    }

    fn record_success(&self) {
        let mut probe = self.probe.write().unwrap_or_else(PoisonError::into_inner);
        probe.last_success = Some(Utc::now());
    }
}

/// Check the status code and decode the body as JSON.
///
/// An empty 2xx body decodes to `null`.
async fn read_json(resp: reqwest::Response) -> Result<Value, Error> {
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::HttpStatus {
            code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
        });
    }

    let body = resp.text().await?;
    trace!(len = body.len(), "response body received");
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(|e| {
        let preview = body.chars().take(200).collect::<String>();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })
}

fn is_healthy(body: &Value) -> bool {
    body.get("status").and_then(Value::as_str) == Some("healthy")
}

pub(crate) fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
