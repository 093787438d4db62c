use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::error::ApiError;
use super::pathsearch;
use super::pool::{ConnectionPoolConfig, ConnectionPoolManager, ConnectionStats};
use super::signer::{Signer, HEADER_SDK_DATE, SDK_DATE_FORMAT};

pub const HEADER_PROJECT_ID: &str = "X-Project-Id";
pub const HEADER_SECURITY_TOKEN: &str = "X-Security-Token";
pub const HEADER_ENTERPRISE_PROJECT_ID: &str = "Enterprise-Project-Id";

/// Signed HuaweiCloud REST client shared by every service
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    signer: Signer,
    security_token: Option<String>,
    retry_config: RetryConfig,
    pool_manager: ConnectionPoolManager,
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 30000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry `attempt` (counted from 1), doubling up to
    /// `max_backoff_ms`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(
            self.initial_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

/// Body and extra headers for a single request
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }
}

impl Client {
    pub fn new(
        access_key: &str,
        secret_key: &str,
        security_token: Option<String>,
        insecure: bool,
    ) -> Result<Self, ApiError> {
        Self::with_config(
            access_key,
            secret_key,
            security_token,
            insecure,
            RetryConfig::default(),
        )
    }

    pub fn with_config(
        access_key: &str,
        secret_key: &str,
        security_token: Option<String>,
        insecure: bool,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let pool_manager = ConnectionPoolManager::new(ConnectionPoolConfig::default());
        let http_client = pool_manager.build_client(insecure)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                signer: Signer::new(access_key, secret_key),
                security_token: security_token.filter(|t| !t.is_empty()),
                retry_config,
                pool_manager,
            }),
        })
    }

    pub async fn get_connection_stats(&self) -> ConnectionStats {
        self.inner.pool_manager.get_stats().await
    }

    /// Sign and send a request to an absolute URL, retrying throttled and
    /// unavailable responses. Empty response bodies come back as `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        options: &RequestOptions,
    ) -> Result<Value, ApiError> {
        let parsed =
            Url::parse(url).map_err(|e| ApiError::ParseError(format!("invalid URL {}: {}", url, e)))?;
        let body = match &options.body {
            Some(body) => serde_json::to_vec(body)
                .map_err(|e| ApiError::ParseError(format!("failed to encode body: {}", e)))?,
            None => Vec::new(),
        };

        self.execute_with_retry(
            || async {
                let headers = self.signed_headers(&method, &parsed, &options.headers, &body)?;
                tracing::debug!("{} request to: {}", method, url);

                let mut request = self
                    .inner
                    .http_client
                    .request(method.clone(), parsed.clone())
                    .headers(headers);
                if !body.is_empty() {
                    request = request.body(body.clone());
                }
                Ok(request.send().await?)
            },
            url,
        )
        .await
    }

    fn signed_headers(
        &self,
        method: &Method,
        url: &Url,
        extra: &BTreeMap<String, String>,
        body: &[u8],
    ) -> Result<HeaderMap, ApiError> {
        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE.as_str().to_string(), "application/json".to_string());
        headers.insert(
            HEADER_SDK_DATE.to_string(),
            Utc::now().format(SDK_DATE_FORMAT).to_string(),
        );
        if let Some(token) = &self.inner.security_token {
            headers.insert(HEADER_SECURITY_TOKEN.to_string(), token.clone());
        }
        for (name, value) in extra {
            headers.insert(name.clone(), value.clone());
        }

        let mut to_sign = headers.clone();
        to_sign.insert("host".to_string(), host_header(url));
        let authorization = self
            .inner
            .signer
            .sign(method.as_str(), url, &to_sign, body)?;

        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::ParseError(format!("invalid header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| ApiError::ParseError(format!("invalid header value: {}", e)))?;
            map.insert(name, value);
        }
        let authorization = HeaderValue::from_str(&authorization)
            .map_err(|e| ApiError::AuthError(e.to_string()))?;
        map.insert(AUTHORIZATION, authorization);
        Ok(map)
    }

    async fn execute_with_retry<F, Fut>(&self, request_fn: F, url: &str) -> Result<Value, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, ApiError>>,
    {
        let retry = &self.inner.retry_config;
        let mut last_error = None;

        for attempt in 0..=retry.max_retries {
            if attempt > 0 {
                let backoff = retry.backoff(attempt);
                tracing::debug!(
                    "Retrying request to {} after {:?} (attempt {})",
                    url,
                    backoff,
                    attempt
                );
                self.inner.pool_manager.record_retry().await;
                tokio::time::sleep(backoff).await;
            }

            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        self.inner.pool_manager.record_request(true).await;
                        return self.parse_success_response(response).await;
                    }

                    self.inner.pool_manager.record_request(false).await;

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() {
                        tracing::warn!("{} answered HTTP {}", url, status.as_u16());
                        last_error = Some(self.handle_error_response(response).await);
                    } else {
                        return Err(self.handle_error_response(response).await);
                    }
                }
                Err(ApiError::RequestError(e)) => {
                    self.inner.pool_manager.record_request(false).await;

                    if e.is_timeout() {
                        last_error = Some(ApiError::Timeout(
                            self.inner.pool_manager.request_timeout().as_secs(),
                        ));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    async fn parse_success_response(&self, response: reqwest::Response) -> Result<Value, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    async fn handle_error_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let (code, message) = match serde_json::from_str::<Value>(&text) {
            Ok(body) => error_fields(&body, &text),
            Err(_) => (String::new(), text.clone()),
        };

        if status == reqwest::StatusCode::UNAUTHORIZED.as_u16() {
            return ApiError::AuthError(message);
        }

        ApiError::ApiError {
            status,
            code,
            message,
        }
    }
}

/// HuaweiCloud services disagree on the error body layout
fn error_fields(body: &Value, raw: &str) -> (String, String) {
    const CODES: [&str; 4] = ["error_code", "errorCode", "error.code", "code"];
    const MESSAGES: [&str; 4] = ["error_msg", "errorMsg", "error.message", "message"];

    let code = CODES
        .iter()
        .find_map(|expr| pathsearch::search_string(expr, body))
        .unwrap_or_default();
    let message = MESSAGES
        .iter()
        .find_map(|expr| pathsearch::search_string(expr, body))
        .unwrap_or_else(|| raw.to_string());
    (code, message)
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// A client bound to one service endpoint. Paths are relative to the
/// endpoint and may use the `{project_id}` and `{domain_id}` placeholders.
#[derive(Clone)]
pub struct ServiceClient {
    client: Client,
    endpoint: String,
    project_id: String,
    domain_id: String,
    headers: BTreeMap<String, String>,
}

impl ServiceClient {
    pub fn new(client: Client, endpoint: &str, project_id: &str, domain_id: &str) -> Self {
        let mut endpoint = endpoint.to_string();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            client,
            endpoint,
            project_id: project_id.to_string(),
            domain_id: domain_id.to_string(),
            headers: BTreeMap::new(),
        }
    }

    /// Sends `X-Project-Id` on every request
    pub fn project_scoped(mut self) -> Self {
        if !self.project_id.is_empty() {
            self.headers
                .insert(HEADER_PROJECT_ID.to_string(), self.project_id.clone());
        }
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn domain_id(&self) -> &str {
        &self.domain_id
    }

    pub fn url(&self, path: &str) -> String {
        let path = path
            .trim_start_matches('/')
            .replace("{project_id}", &self.project_id)
            .replace("{domain_id}", &self.domain_id);
        format!("{}{}", self.endpoint, path)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Value, ApiError> {
        let mut options = options;
        for (name, value) in &self.headers {
            options
                .headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self.client.request(method, &self.url(path), &options).await
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, RequestOptions::new()).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, RequestOptions::new().json(body))
            .await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value, ApiError> {
        self.request(Method::PUT, path, RequestOptions::new().json(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, RequestOptions::new())
            .await
    }
}
