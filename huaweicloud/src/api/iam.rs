//! IAM lookups used to fill in project and domain ids the user did not set

use super::client::ServiceClient;
use super::common::QueryParams;
use super::error::ApiError;
use super::pathsearch;

pub struct IamApi<'a> {
    client: &'a ServiceClient,
}

impl<'a> IamApi<'a> {
    pub fn new(client: &'a ServiceClient) -> Self {
        Self { client }
    }

    /// GET /v3/projects?name={region}, the project named after the region
    pub async fn project_id(&self, region: &str) -> Result<Option<String>, ApiError> {
        let path = QueryParams::new().add("name", region).append_to("v3/projects");
        let body = self.client.get(&path).await?;
        Ok(pathsearch::search_string("projects[0].id", &body).filter(|id| !id.is_empty()))
    }

    /// GET /v3/auth/domains, the domain owning the credentials
    pub async fn domain_id(&self) -> Result<Option<String>, ApiError> {
        let body = self.client.get("v3/auth/domains").await?;
        Ok(pathsearch::search_string("domains[0].id", &body).filter(|id| !id.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::Client;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn project_id_comes_from_region_named_project() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v3/projects")
            .match_query(Matcher::UrlEncoded("name".into(), "cn-north-4".into()))
            .with_status(200)
            .with_body(r#"{"projects": [{"id": "0970d7b7d400f2470fbec00316a03560", "name": "cn-north-4"}]}"#)
            .create_async()
            .await;

        let client = Client::new("AK", "SK", None, false).unwrap();
        let service = ServiceClient::new(client, &server.url(), "", "");
        let id = IamApi::new(&service).project_id("cn-north-4").await.unwrap();

        assert_eq!(id.as_deref(), Some("0970d7b7d400f2470fbec00316a03560"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_domain_is_none() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v3/auth/domains")
            .with_status(200)
            .with_body(r#"{"domains": []}"#)
            .create_async()
            .await;

        let client = Client::new("AK", "SK", None, false).unwrap();
        let service = ServiceClient::new(client, &server.url(), "", "");
        assert_eq!(IamApi::new(&service).domain_id().await.unwrap(), None);
    }
}
