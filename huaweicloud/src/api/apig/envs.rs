//! Environments of an APIG instance. The service has no GET-by-id for
//! environments, so reads go through the list endpoint.

use serde::{Deserialize, Serialize};

use crate::api::client::ServiceClient;
use crate::api::common::{decode, QueryParams};
use crate::api::error::ApiError;
use crate::api::pagination;

const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentRequest {
    pub name: String,
    #[serde(rename = "remark", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "remark", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
}

pub struct EnvsApi<'a> {
    client: &'a ServiceClient,
    base: String,
}

impl<'a> EnvsApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient, base: String) -> Self {
        Self { client, base }
    }

    pub async fn create(
        &self,
        request: &EnvironmentRequest,
    ) -> Result<EnvironmentResponse, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::ParseError(e.to_string()))?;
        decode(self.client.post(&self.base, body).await?)
    }

    /// All environments, optionally filtered by (fuzzy) name
    pub async fn list(&self, name: Option<&str>) -> Result<Vec<EnvironmentResponse>, ApiError> {
        let path = QueryParams::new()
            .add_optional("name", name.filter(|n| !n.is_empty()))
            .append_to(&self.base);
        pagination::list_by_offset(self.client, &path, "envs", PAGE_SIZE)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// Look the environment up by name and confirm the id still matches
    pub async fn get(&self, id: &str, name: &str) -> Result<EnvironmentResponse, ApiError> {
        self.list(Some(name))
            .await?
            .into_iter()
            .find(|env| env.id == id)
            .ok_or_else(|| ApiError::not_found(format!("environment {} not found", id)))
    }

    pub async fn update(
        &self,
        id: &str,
        request: &EnvironmentRequest,
    ) -> Result<EnvironmentResponse, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::ParseError(e.to_string()))?;
        decode(self.client.put(&format!("{}/{}", self.base, id), body).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{}/{}", self.base, id)).await?;
        Ok(())
    }
}
