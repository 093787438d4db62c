//! Query string building and response decoding shared by the service modules

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;

/// Deserialize a response body into a typed struct
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::ParseError(format!("unexpected response shape: {}", e)))
}

#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    params: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    /// Skips empty strings, which HuaweiCloud list APIs reject as filters
    pub fn add_non_empty<K: Into<String>>(mut self, key: K, value: &str) -> Self {
        if !value.is_empty() {
            self.params.push((key.into(), value.to_string()));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append to a path that may already carry a query string
    pub fn append_to(&self, path: &str) -> String {
        if self.params.is_empty() {
            return path.to_string();
        }
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{}{}{}", path, separator, self.to_query_string())
    }
}
