//! v4 alarm rules. Rules are addressed by name; add and update both POST
//! to the collection with an `action_id` selector.

use reqwest::Method;
use serde_json::{json, Value};

use crate::api::client::{RequestOptions, ServiceClient, HEADER_ENTERPRISE_PROJECT_ID};
use crate::api::common::QueryParams;
use crate::api::error::ApiError;
use crate::api::pathsearch;

const BASE: &str = "v4/{project_id}/alarm-rules";

pub struct AlarmRulesApi<'a> {
    client: &'a ServiceClient,
}

impl<'a> AlarmRulesApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, body: Value, enterprise_project_id: &str) -> Result<Value, ApiError> {
        self.action("add-alarm-action", body, enterprise_project_id)
            .await
    }

    pub async fn update(&self, body: Value, enterprise_project_id: &str) -> Result<Value, ApiError> {
        self.action("update-alarm-action", body, enterprise_project_id)
            .await
    }

    async fn action(
        &self,
        action_id: &str,
        body: Value,
        enterprise_project_id: &str,
    ) -> Result<Value, ApiError> {
        let path = QueryParams::new()
            .add("action_id", action_id)
            .append_to(BASE);
        self.client
            .request(
                Method::POST,
                &path,
                with_enterprise_project(RequestOptions::new().json(body), enterprise_project_id),
            )
            .await
    }

    /// The single rule called `name`; a 404 when the listing is empty
    pub async fn get(&self, name: &str, enterprise_project_id: &str) -> Result<Value, ApiError> {
        let path = QueryParams::new().add("name", name).append_to(BASE);
        let body = self
            .client
            .request(
                Method::GET,
                &path,
                with_enterprise_project(RequestOptions::new(), enterprise_project_id),
            )
            .await?;
        match pathsearch::search("alarm_rules[0]", &body) {
            Value::Null => Err(ApiError::not_found(format!("alarm rule {} not found", name))),
            rule => Ok(rule),
        }
    }

    pub async fn delete(&self, name: &str, enterprise_project_id: &str) -> Result<(), ApiError> {
        let options = RequestOptions::new().json(json!({ "alarm_rules": [name] }));
        self.client
            .request(
                Method::DELETE,
                BASE,
                with_enterprise_project(options, enterprise_project_id),
            )
            .await?;
        Ok(())
    }
}

pub(crate) fn with_enterprise_project(options: RequestOptions, id: &str) -> RequestOptions {
    if id.is_empty() {
        options
    } else {
        options.header(HEADER_ENTERPRISE_PROJECT_ID, id)
    }
}
