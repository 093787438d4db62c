//! Account level policy assignments and their tags

use reqwest::Method;
use serde_json::{json, Value};

use crate::api::client::{RequestOptions, ServiceClient};
use crate::api::error::ApiError;
use crate::api::pagination;
use crate::api::pathsearch;

const BASE: &str = "v1/resource-manager/domains/{domain_id}/policy-assignments";
const TAGS_BASE: &str = "v1/resource-manager/config:policyAssignments";
const PAGE_SIZE: u32 = 200;

pub const STATUS_ENABLED: &str = "Enabled";
pub const STATUS_DISABLED: &str = "Disabled";
pub const STATUS_EVALUATING: &str = "Evaluating";

pub struct PolicyAssignmentsApi<'a> {
    client: &'a ServiceClient,
}

impl<'a> PolicyAssignmentsApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, body: Value) -> Result<Value, ApiError> {
        self.client.put(BASE, body).await
    }

    pub async fn get(&self, id: &str) -> Result<Value, ApiError> {
        self.client.get(&format!("{}/{}", BASE, id)).await
    }

    pub async fn list(&self) -> Result<Vec<Value>, ApiError> {
        pagination::list_by_marker(self.client, BASE, "value", PAGE_SIZE).await
    }

    pub async fn update(&self, id: &str, body: Value) -> Result<Value, ApiError> {
        self.client.put(&format!("{}/{}", BASE, id), body).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{}/{}", BASE, id)).await?;
        Ok(())
    }

    pub async fn enable(&self, id: &str) -> Result<(), ApiError> {
        self.action(id, "enable").await
    }

    pub async fn disable(&self, id: &str) -> Result<(), ApiError> {
        self.action(id, "disable").await
    }

    /// Switch to `Enabled` or `Disabled`
    pub async fn set_status(&self, id: &str, status: &str) -> Result<(), ApiError> {
        if status == STATUS_ENABLED {
            self.enable(id).await
        } else {
            self.disable(id).await
        }
    }

    async fn action(&self, id: &str, action: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}/{}", BASE, id, action);
        self.client
            .request(Method::POST, &path, RequestOptions::new())
            .await?;
        Ok(())
    }

    /// The assignment and its current status, or `None` once it is gone
    pub async fn refresh(&self, id: &str) -> Result<Option<(Value, String)>, ApiError> {
        match self.get(id).await {
            Ok(body) => {
                let state = pathsearch::search_string("state", &body).unwrap_or_default();
                Ok(Some((body, state)))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Tags as `(key, value)` pairs
    pub async fn list_tags(&self, id: &str) -> Result<Vec<(String, String)>, ApiError> {
        let body = self.client.get(&format!("{}/{}/tags", TAGS_BASE, id)).await?;
        Ok(pathsearch::search_array("tags", &body)
            .iter()
            .filter_map(|tag| {
                let key = tag["key"].as_str()?;
                Some((key.to_string(), tag["value"].as_str().unwrap_or_default().to_string()))
            })
            .collect())
    }

    pub async fn create_tags(&self, id: &str, tags: &[(String, String)]) -> Result<(), ApiError> {
        self.tag_action(id, "create", tags).await
    }

    pub async fn delete_tags(&self, id: &str, tags: &[(String, String)]) -> Result<(), ApiError> {
        self.tag_action(id, "delete", tags).await
    }

    async fn tag_action(
        &self,
        id: &str,
        action: &str,
        tags: &[(String, String)],
    ) -> Result<(), ApiError> {
        if tags.is_empty() {
            return Ok(());
        }
        let tags: Vec<Value> = tags
            .iter()
            .map(|(k, v)| json!({ "key": k, "value": v }))
            .collect();
        let path = format!("{}/{}/tags/{}", TAGS_BASE, id, action);
        self.client.post(&path, json!({ "tags": tags })).await?;
        Ok(())
    }
}
