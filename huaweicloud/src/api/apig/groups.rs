//! API groups of an APIG instance

use serde::{Deserialize, Serialize};

use crate::api::client::ServiceClient;
use crate::api::common::decode;
use crate::api::error::ApiError;

/// Body for POST/PUT .../api-groups
#[derive(Debug, Clone, Serialize)]
pub struct ApiGroupRequest {
    pub name: String,
    #[serde(rename = "remark", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiGroupResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "remark", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub register_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

pub struct GroupsApi<'a> {
    client: &'a ServiceClient,
    base: String,
}

impl<'a> GroupsApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient, base: String) -> Self {
        Self { client, base }
    }

    pub async fn create(&self, request: &ApiGroupRequest) -> Result<ApiGroupResponse, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::ParseError(e.to_string()))?;
        decode(self.client.post(&self.base, body).await?)
    }

    pub async fn get(&self, id: &str) -> Result<ApiGroupResponse, ApiError> {
        decode(self.client.get(&format!("{}/{}", self.base, id)).await?)
    }

    pub async fn update(
        &self,
        id: &str,
        request: &ApiGroupRequest,
    ) -> Result<ApiGroupResponse, ApiError> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::ParseError(e.to_string()))?;
        decode(self.client.put(&format!("{}/{}", self.base, id), body).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{}/{}", self.base, id)).await?;
        Ok(())
    }
}
