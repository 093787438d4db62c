//! APIs of a dedicated instance: frontend definition, default backend and
//! backend policies in one document

use serde_json::Value;

use crate::api::client::ServiceClient;
use crate::api::common::QueryParams;
use crate::api::error::ApiError;
use crate::api::pagination;

const PAGE_SIZE: u32 = 100;

pub struct ApisApi<'a> {
    client: &'a ServiceClient,
    base: String,
}

impl<'a> ApisApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient, base: String) -> Self {
        Self { client, base }
    }

    /// POST .../apis
    pub async fn create(&self, body: Value) -> Result<Value, ApiError> {
        self.client.post(&self.base, body).await
    }

    /// GET .../apis/{api_id}, the full API definition including backends
    /// and policies
    pub async fn get(&self, api_id: &str) -> Result<Value, ApiError> {
        self.client.get(&format!("{}/{}", self.base, api_id)).await
    }

    /// PUT .../apis/{api_id}; the body replaces the whole definition
    pub async fn update(&self, api_id: &str, body: Value) -> Result<Value, ApiError> {
        self.client.put(&format!("{}/{}", self.base, api_id), body).await
    }

    pub async fn delete(&self, api_id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{}/{}", self.base, api_id)).await?;
        Ok(())
    }

    /// The `name` filter is fuzzy, so the exact match is picked locally
    pub async fn find_by_name(&self, name: &str) -> Result<Value, ApiError> {
        let path = QueryParams::new().add("name", name).append_to(&self.base);
        let apis = pagination::list_by_offset(self.client, &path, "apis", PAGE_SIZE).await?;

        apis.into_iter()
            .find(|api| api["name"].as_str() == Some(name))
            .ok_or_else(|| ApiError::not_found(format!("no API named '{}'", name)))
    }
}
