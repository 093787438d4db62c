//! Request throttling policies and their per-user/per-app exceptions

use serde_json::{json, Value};

use crate::api::client::ServiceClient;
use crate::api::common::QueryParams;
use crate::api::error::ApiError;
use crate::api::pagination;

const PAGE_SIZE: u32 = 100;

pub struct ThrottlesApi<'a> {
    client: &'a ServiceClient,
    base: String,
}

impl<'a> ThrottlesApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient, base: String) -> Self {
        Self { client, base }
    }

    /// POST .../throttles
    pub async fn create(&self, body: Value) -> Result<Value, ApiError> {
        self.client.post(&self.base, body).await
    }

    /// GET .../throttles/{id}
    pub async fn get(&self, id: &str) -> Result<Value, ApiError> {
        self.client.get(&format!("{}/{}", self.base, id)).await
    }

    /// PUT .../throttles/{id}
    pub async fn update(&self, id: &str, body: Value) -> Result<Value, ApiError> {
        self.client.put(&format!("{}/{}", self.base, id), body).await
    }

    /// DELETE .../throttles/{id}
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{}/{}", self.base, id)).await?;
        Ok(())
    }

    /// The `name` filter is fuzzy, so the exact match is picked locally
    pub async fn find_by_name(&self, name: &str) -> Result<Value, ApiError> {
        let path = QueryParams::new().add("name", name).append_to(&self.base);
        let policies = pagination::list_by_offset(self.client, &path, "throttles", PAGE_SIZE).await?;

        policies
            .into_iter()
            .find(|p| p["name"].as_str() == Some(name))
            .ok_or_else(|| ApiError::not_found(format!("no throttling policy named '{}'", name)))
    }

    /// GET .../throttles/{id}/throttle-specials
    pub async fn list_specials(&self, id: &str) -> Result<Vec<Value>, ApiError> {
        pagination::list_by_offset(
            self.client,
            &self.specials_path(id),
            "throttle_specials",
            PAGE_SIZE,
        )
        .await
    }

    /// `object_type` is `USER` or `APP`
    pub async fn create_special(
        &self,
        id: &str,
        object_type: &str,
        object_id: &str,
        call_limits: i64,
    ) -> Result<Value, ApiError> {
        let body = json!({
            "object_type": object_type,
            "object_id": object_id,
            "call_limits": call_limits,
        });
        self.client.post(&self.specials_path(id), body).await
    }

    pub async fn update_special(
        &self,
        id: &str,
        special_id: &str,
        call_limits: i64,
    ) -> Result<Value, ApiError> {
        let path = format!("{}/{}", self.specials_path(id), special_id);
        self.client
            .put(&path, json!({ "call_limits": call_limits }))
            .await
    }

    pub async fn delete_special(&self, id: &str, special_id: &str) -> Result<(), ApiError> {
        let path = format!("{}/{}", self.specials_path(id), special_id);
        self.client.delete(&path).await?;
        Ok(())
    }

    fn specials_path(&self, id: &str) -> String {
        format!("{}/{}/throttle-specials", self.base, id)
    }
}
