//! Organization conformance packs (assignment packages)

use serde_json::Value;

use crate::api::client::ServiceClient;
use crate::api::common::QueryParams;
use crate::api::error::ApiError;
use crate::api::pathsearch;

pub const CREATE_SUCCESSFUL: &str = "CREATE_SUCCESSFUL";
pub const CREATE_IN_PROGRESS: &str = "CREATE_IN_PROGRESS";
pub const UPDATE_SUCCESSFUL: &str = "UPDATE_SUCCESSFUL";
pub const UPDATE_IN_PROGRESS: &str = "UPDATE_IN_PROGRESS";
pub const ROLLBACK_SUCCESSFUL: &str = "ROLLBACK_SUCCESSFUL";
pub const ROLLBACK_IN_PROGRESS: &str = "ROLLBACK_IN_PROGRESS";
pub const DELETE_IN_PROGRESS: &str = "DELETE_IN_PROGRESS";

pub struct OrgConformancePacksApi<'a> {
    client: &'a ServiceClient,
    base: String,
}

impl<'a> OrgConformancePacksApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient, organization_base: String) -> Self {
        Self {
            client,
            base: format!("{}/conformance-packs", organization_base),
        }
    }

    /// Returns the new package id
    pub async fn create(&self, body: Value) -> Result<String, ApiError> {
        let response = self.client.post(&self.base, body).await?;
        pathsearch::search_string("org_conformance_pack_id", &response)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ApiError::ParseError(
                    "unable to find the organization conformance pack ID in the response"
                        .to_string(),
                )
            })
    }

    pub async fn get(&self, id: &str) -> Result<Value, ApiError> {
        self.client.get(&format!("{}/{}", self.base, id)).await
    }

    pub async fn update(&self, id: &str, body: Value) -> Result<Value, ApiError> {
        self.client.put(&format!("{}/{}", self.base, id), body).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client.delete(&format!("{}/{}", self.base, id)).await?;
        Ok(())
    }

    /// Deployment state looked up by package name; empty when none is reported
    pub async fn status(&self, name: &str) -> Result<(Value, String), ApiError> {
        let path = QueryParams::new()
            .add("conformance_pack_name", name)
            .append_to(&format!("{}/statuses", self.base));
        let body = self.client.get(&path).await?;
        let state = pathsearch::search_string("statuses[0].state", &body).unwrap_or_default();
        Ok((body, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::{Client, RetryConfig};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn api(service: &ServiceClient) -> OrgConformancePacksApi<'_> {
        OrgConformancePacksApi::new(service, "v1/resource-manager/organizations/o-1".to_string())
    }

    #[tokio::test]
    async fn create_and_status() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/resource-manager/organizations/o-1/conformance-packs")
            .match_body(Matcher::PartialJson(json!({"name": "pack"})))
            .with_status(200)
            .with_body(r#"{"org_conformance_pack_id": "cp-1"}"#)
            .create_async()
            .await;
        server
            .mock(
                "GET",
                "/v1/resource-manager/organizations/o-1/conformance-packs/statuses",
            )
            .match_query(Matcher::UrlEncoded("conformance_pack_name".into(), "pack".into()))
            .with_status(200)
            .with_body(r#"{"statuses": [{"state": "CREATE_IN_PROGRESS"}]}"#)
            .create_async()
            .await;

        let client = Client::with_config("AK", "SK", None, false, RetryConfig::default()).unwrap();
        let service = ServiceClient::new(client, &server.url(), "", "d1");

        assert_eq!(api(&service).create(json!({"name": "pack"})).await.unwrap(), "cp-1");
        let (_, state) = api(&service).status("pack").await.unwrap();
        assert_eq!(state, CREATE_IN_PROGRESS);
    }

    #[tokio::test]
    async fn create_without_id_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/resource-manager/organizations/o-1/conformance-packs")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = Client::with_config("AK", "SK", None, false, RetryConfig::default()).unwrap();
        let service = ServiceClient::new(client, &server.url(), "", "d1");

        let err = api(&service).create(json!({"name": "pack"})).await.unwrap_err();
        assert!(matches!(err, ApiError::ParseError(_)));
    }
}
