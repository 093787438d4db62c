use reqwest::Method;
use serde_json::{json, Value};

use super::alarm_rules::with_enterprise_project;
use crate::api::client::{RequestOptions, ServiceClient};
use crate::api::common::QueryParams;
use crate::api::error::ApiError;
use crate::api::pathsearch;

const BASE: &str = "v4/{project_id}/alarm-rules-template";

/// Error code returned (with HTTP 400) when deleting an unknown template
pub const TEMPLATE_NOT_FOUND_CODE: &str = "AOM.02018001";

/// Reads span every enterprise project the caller can see
const ALL_GRANTED_EPS: &str = "all_granted_eps";

pub struct AlarmRuleTemplatesApi<'a> {
    client: &'a ServiceClient,
}

impl<'a> AlarmRuleTemplatesApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient) -> Self {
        Self { client }
    }

    /// Returns the id of the new template
    pub async fn create(&self, body: Value, enterprise_project_id: &str) -> Result<String, ApiError> {
        let response = self
            .client
            .request(
                Method::POST,
                BASE,
                with_enterprise_project(RequestOptions::new().json(body), enterprise_project_id),
            )
            .await?;
        pathsearch::search_string("alarm_rule_templates[0].alarm_rule_template_id", &response)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ApiError::ParseError(
                    "unable to find the alarm rule template ID in the response".to_string(),
                )
            })
    }

    pub async fn get(&self, id: &str) -> Result<Value, ApiError> {
        let path = QueryParams::new().add("id", id).append_to(BASE);
        let body = self
            .client
            .request(
                Method::GET,
                &path,
                with_enterprise_project(RequestOptions::new(), ALL_GRANTED_EPS),
            )
            .await?;
        match pathsearch::search("[]|[0]", &body) {
            Value::Null => Err(ApiError::not_found(format!(
                "alarm rule template {} not found",
                id
            ))),
            template => Ok(template),
        }
    }

    /// `body` must already carry `alarm_rule_template_id`
    pub async fn update(&self, body: Value, enterprise_project_id: &str) -> Result<(), ApiError> {
        self.client
            .request(
                Method::PUT,
                BASE,
                with_enterprise_project(RequestOptions::new().json(body), enterprise_project_id),
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let options = RequestOptions::new().json(json!({ "alarm_rule_templates": [id] }));
        self.client
            .request(Method::DELETE, BASE, options)
            .await
            .map_err(|e| e.with_not_found_code(TEMPLATE_NOT_FOUND_CODE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::{Client, RetryConfig};
    use mockito::{Matcher, Server};

    fn service(url: &str) -> ServiceClient {
        let client = Client::with_config("AK", "SK", None, false, RetryConfig::default()).unwrap();
        ServiceClient::new(client, url, "p1", "")
    }

    #[tokio::test]
    async fn get_reads_the_first_match_across_projects() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v4/p1/alarm-rules-template")
            .match_query(Matcher::UrlEncoded("id".into(), "t-1".into()))
            .match_header("Enterprise-Project-Id", "all_granted_eps")
            .with_status(200)
            .with_body(r#"[{"alarm_rule_template_id": "t-1", "alarm_rule_template_name": "tpl"}]"#)
            .create_async()
            .await;

        let service = service(&server.url());
        let template = AlarmRuleTemplatesApi::new(&service).get("t-1").await.unwrap();
        assert_eq!(template["alarm_rule_template_name"], "tpl");
    }

    #[tokio::test]
    async fn delete_of_unknown_template_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/v4/p1/alarm-rules-template")
            .with_status(400)
            .with_body(r#"{"error_code": "AOM.02018001", "error_msg": "template not exist"}"#)
            .create_async()
            .await;

        let service = service(&server.url());
        let err = AlarmRuleTemplatesApi::new(&service)
            .delete("t-1")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
