//! Outbound request gateway shared by HTTP-backed providers

use crate::config::GatewayConfig;
use crate::throttle::{Throttle, WindowThrottle};
use crate::url::build_url;
use bytes::Bytes;
use ferry_core::{ErrorKind, ProviderError, Result};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Where a request goes. A deferred URL is computed right before the first
/// attempt and reused for every retry.
pub enum UrlSource {
    Value(String),
    Deferred(Box<dyn Fn() -> String + Send + Sync>),
}

impl UrlSource {
    pub fn deferred(build: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self::Deferred(Box::new(build))
    }

    fn resolve(&self) -> String {
        match self {
            Self::Value(url) => url.clone(),
            Self::Deferred(build) => build(),
        }
    }
}

impl fmt::Debug for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(url) => f.debug_tuple("Value").field(url).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<String> for UrlSource {
    fn from(url: String) -> Self {
        Self::Value(url)
    }
}

impl From<&str> for UrlSource {
    fn from(url: &str) -> Self {
        Self::Value(url.to_string())
    }
}

impl From<url::Url> for UrlSource {
    fn from(url: url::Url) -> Self {
        Self::Value(url.into())
    }
}

/// Per-request knobs
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Extra headers; `None` drops a default header of that name
    pub headers: Vec<(String, Option<String>)>,
    /// Byte range as `(start, end)`, either side open
    pub range: Option<(Option<u64>, Option<u64>)>,
    /// Acceptable status codes. Unset means every response is returned as is.
    pub expects: Option<HashSet<u16>>,
    /// Kind of error raised when the status is not expected
    pub throws: ErrorKind,
    /// Overrides the configured retry count
    pub retry: Option<u32>,
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), Some(value.into())));
        self
    }

    pub fn without_header(mut self, name: impl Into<String>) -> Self {
        self.headers.push((name.into(), None));
        self
    }

    pub fn range(mut self, start: Option<u64>, end: Option<u64>) -> Self {
        self.range = Some((start, end));
        self
    }

    pub fn expects(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.expects = Some(codes.into_iter().collect());
        self
    }

    pub fn throws(mut self, kind: ErrorKind) -> Self {
        self.throws = kind;
        self
    }

    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

enum Attempt {
    Success(Response),
    /// Unexpected status listed in `retry_on`
    Retryable(ProviderError),
    Terminal(ProviderError),
}

/// Issues throttled, retried HTTP requests on behalf of a provider
pub struct RequestGateway {
    config: GatewayConfig,
    http: Client,
    throttle: Arc<dyn Throttle>,
    default_headers: Vec<(String, String)>,
    base_url: Option<String>,
}

impl RequestGateway {
    /// Create a gateway with its own window throttle sized from `config`
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(transport_error)?;
        let throttle = Arc::new(WindowThrottle::new(
            config.throttle_concurrency,
            config.throttle_interval(),
        ));

        Ok(Self {
            config,
            http,
            throttle,
            default_headers: Vec::new(),
            base_url: None,
        })
    }

    /// Replace the throttle, e.g. to share one budget across gateways
    pub fn with_throttle(mut self, throttle: Arc<dyn Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    /// Header sent with every request (credentials usually)
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn throttle(&self) -> Arc<dyn Throttle> {
        self.throttle.clone()
    }

    /// URL under the configured base
    pub fn build_url<S: AsRef<str>>(&self, segments: &[S], query: &[(&str, &str)]) -> Result<String> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidPath("gateway has no base url".to_string()))?;
        build_url(base, segments, query)
    }

    /// Default headers merged with `extra`, plus a `Range` header
    pub fn build_headers(
        &self,
        extra: &[(String, Option<String>)],
        range: Option<(Option<u64>, Option<u64>)>,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.default_headers {
            headers.insert(header_name(name)?, header_value(value)?);
        }
        for (name, value) in extra {
            let name = header_name(name)?;
            match value {
                Some(value) => {
                    headers.insert(name, header_value(value)?);
                }
                None => {
                    headers.remove(&name);
                }
            }
        }
        if let Some((start, end)) = range {
            headers.insert(header::RANGE, header_value(&build_range_header(start, end))?);
        }
        Ok(headers)
    }

    /// Send a request, retrying unexpected statuses listed in `retry_on`.
    ///
    /// Every attempt, retries included, passes through the throttle. Retry
    /// `n` sleeps `n * backoff_base` first. Transport failures are never
    /// retried. With `expects` unset the first response is returned whatever
    /// its status.
    #[instrument(skip_all, fields(method = %method))]
    pub async fn send(
        &self,
        method: Method,
        url: impl Into<UrlSource>,
        options: RequestOptions,
    ) -> Result<Response> {
        let url = url.into().resolve();
        let headers = self.build_headers(&options.headers, options.range)?;
        let retries = options.retry.unwrap_or(self.config.retry);

        let mut attempt = 0;
        loop {
            match self.attempt(&method, &url, &headers, &options).await {
                Attempt::Success(response) => return Ok(response),
                Attempt::Terminal(err) => return Err(err),
                Attempt::Retryable(err) if attempt >= retries => {
                    warn!(url = %url, code = err.code(), attempt, "giving up");
                    return Err(err);
                }
                Attempt::Retryable(err) => {
                    attempt += 1;
                    let delay = self.config.backoff_delay(attempt);
                    warn!(url = %url, code = err.code(), attempt, ?delay, "retrying request");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        options: &RequestOptions,
    ) -> Attempt {
        self.throttle.acquire().await;

        let mut req = self.http.request(method.clone(), url).headers(headers.clone());
        if !options.query.is_empty() {
            req = req.query(&options.query);
        }
        if let Some(body) = &options.body {
            req = req.body(body.clone());
        }

        debug!("Sending {} request to {}", method, url);
        let response = match req.send().await {
            Ok(response) => response,
            Err(err) => return Attempt::Terminal(transport_error(err)),
        };

        let status = response.status().as_u16();
        match &options.expects {
            Some(expected) if !expected.contains(&status) => {
                let err = error_from_response(response, options.throws).await;
                if self.config.is_retryable(status) {
                    Attempt::Retryable(err)
                } else {
                    Attempt::Terminal(err)
                }
            }
            _ => Attempt::Success(response),
        }
    }
}

impl fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestGateway")
            .field("config", &self.config)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// `bytes=start-end`, either side may be empty
pub fn build_range_header(start: Option<u64>, end: Option<u64>) -> String {
    let side = |bound: Option<u64>| bound.map(|b| b.to_string()).unwrap_or_default();
    format!("bytes={}-{}", side(start), side(end))
}

/// Turn an unexpected response into an error of `kind`.
///
/// The message is the body's JSON `message` field if there is one, else the
/// body text, else the status reason.
pub async fn error_from_response(response: Response, kind: ErrorKind) -> ProviderError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| body.get("message")?.as_str().map(str::to_string))
        .or_else(|| {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

    ProviderError::from_kind(kind, status.as_u16(), message)
}

/// Map a failure that produced no response
pub fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Http(format!("request timed out: {err}"))
    } else if err.is_connect() {
        ProviderError::Http(format!("connection failed: {err}"))
    } else {
        ProviderError::Http(err.to_string())
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ProviderError::provider(400, format!("invalid header name {name:?}: {e}")))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ProviderError::provider(400, format!("invalid header value: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_header() {
        assert_eq!(build_range_header(Some(0), Some(99)), "bytes=0-99");
        assert_eq!(build_range_header(Some(100), None), "bytes=100-");
        assert_eq!(build_range_header(None, Some(500)), "bytes=-500");
    }

    #[test]
    fn test_headers_merge_and_drop() {
        let gateway = RequestGateway::new(GatewayConfig::default())
            .unwrap()
            .with_default_header("Authorization", "Bearer abc")
            .with_default_header("X-Trace", "1");

        let headers = gateway
            .build_headers(
                &[
                    ("X-Trace".to_string(), None),
                    ("Content-Type".to_string(), Some("text/plain".to_string())),
                ],
                Some((Some(0), Some(9))),
            )
            .unwrap();

        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc");
        assert!(headers.get("x-trace").is_none());
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(headers.get("range").unwrap(), "bytes=0-9");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let gateway = RequestGateway::new(GatewayConfig::default()).unwrap();
        let err = gateway
            .build_headers(&[("bad header".to_string(), Some("v".to_string()))], None)
            .unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[test]
    fn test_build_url_requires_base() {
        let gateway = RequestGateway::new(GatewayConfig::default()).unwrap();
        assert!(gateway.build_url(&["a"], &[]).is_err());

        let gateway = gateway.with_base_url("https://api.example.com/v2");
        assert_eq!(
            gateway.build_url(&["files", "42"], &[]).unwrap(),
            "https://api.example.com/v2/files/42"
        );
    }
}
