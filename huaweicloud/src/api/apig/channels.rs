//! VPC channels (load balancing channels) of an APIG instance

use serde_json::Value;

use crate::api::client::ServiceClient;
use crate::api::error::ApiError;

pub struct ChannelsApi<'a> {
    client: &'a ServiceClient,
    base: String,
}

impl<'a> ChannelsApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient, base: String) -> Self {
        Self { client, base }
    }

    pub async fn create(&self, body: Value) -> Result<Value, ApiError> {
        self.client.post(&self.base, body).await
    }

    pub async fn get(&self, id: &str) -> Result<Value, ApiError> {
        self.client.get(&format!("{}/{}", self.base, id)).await
    }

    /// The service replaces the whole channel, members included
    pub async fn update(&self, id: &str, body: Value) -> Result<Value, ApiError> {
        self.client.put(&format!("{}/{}", self.base, id), body).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{}/{}", self.base, id)).await?;
        Ok(())
    }
}
