//! Policy assignments of the account, filtered by name, status or policy
//! definition

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use tfplug::validator::StringOneOf;
use uuid::Uuid;

use crate::api::pathsearch;
use crate::api::rms::policy_assignments::{STATUS_DISABLED, STATUS_ENABLED, STATUS_EVALUATING};
use crate::resources::common::{
    api_error, format_rfc3339, get_str, not_configured, object, provider_data_from,
};
use crate::resources::rms::resource_policy_assignment::flatten_parameters;
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_rms_policy_assignments";

#[derive(Default)]
pub struct RmsPolicyAssignmentsDataSource {
    provider_data: Option<HuaweiCloudProviderData>,
}

impl RmsPolicyAssignmentsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Empty filters match everything
struct Filter {
    name: String,
    status: String,
    policy_definition_id: String,
}

impl Filter {
    fn from_config(config: &DynamicValue) -> Self {
        Self {
            name: get_str(config, "name"),
            status: get_str(config, "status"),
            policy_definition_id: get_str(config, "policy_definition_id"),
        }
    }

    fn matches(&self, assignment: &Value) -> bool {
        [
            (&self.name, "name"),
            (&self.status, "state"),
            (&self.policy_definition_id, "policy_definition_id"),
        ]
        .iter()
        .all(|(want, field)| {
            want.is_empty()
                || pathsearch::search_string(field, assignment).as_deref() == Some(want.as_str())
        })
    }
}

fn flatten_assignment(assignment: &Value) -> Dynamic {
    let text = |expr: &str| pathsearch::search_string(expr, assignment).unwrap_or_default();
    object([
        ("id", Dynamic::from(text("id"))),
        ("name", Dynamic::from(text("name"))),
        ("description", Dynamic::from(text("description"))),
        ("type", Dynamic::from(text("policy_assignment_type"))),
        ("status", Dynamic::from(text("state"))),
        ("policy_definition_id", Dynamic::from(text("policy_definition_id"))),
        ("period", Dynamic::from(text("period"))),
        ("function_urn", Dynamic::from(text("custom_policy.function_urn"))),
        (
            "parameters",
            Dynamic::Map(flatten_parameters(&pathsearch::search("parameters", assignment))),
        ),
        ("created_at", Dynamic::from(format_rfc3339(&text("created")))),
        ("updated_at", Dynamic::from(format_rfc3339(&text("updated")))),
    ])
}

#[async_trait]
impl DataSource for RmsPolicyAssignmentsDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let mut assignment: BTreeMap<String, AttributeType> = [
            "id",
            "name",
            "description",
            "type",
            "status",
            "policy_definition_id",
            "period",
            "function_urn",
            "created_at",
            "updated_at",
        ]
        .iter()
        .map(|name| (name.to_string(), AttributeType::String))
        .collect();
        assignment.insert(
            "parameters".to_string(),
            AttributeType::map(AttributeType::String),
        );

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Lists the RMS policy assignments of the account")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The data source ID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Only return the assignment with this name")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("Only return assignments in this status")
                    .optional()
                    .validator(StringOneOf::new([
                        STATUS_ENABLED,
                        STATUS_DISABLED,
                        STATUS_EVALUATING,
                    ]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("policy_definition_id", AttributeType::String)
                    .description("Only return assignments of this built-in policy")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "assignments",
                    AttributeType::list(AttributeType::Object(assignment)),
                )
                .description("The matching policy assignments")
                .computed()
                .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];

        let client = match &self.provider_data {
            Some(data) => data.config.domain_client("rms"),
            None => {
                diagnostics.push(not_configured());
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                    deferred: None,
                };
            }
        };

        let assignments = match client.rms().policy_assignments().list().await {
            Ok(assignments) => assignments,
            Err(e) => {
                diagnostics.push(api_error("Failed to list policy assignments", e));
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                    deferred: None,
                };
            }
        };

        let filter = Filter::from_config(&request.config);
        let assignments: Vec<Dynamic> = assignments
            .iter()
            .filter(|assignment| filter.matches(assignment))
            .map(flatten_assignment)
            .collect();
        tracing::debug!("Found {} matching policy assignments", assignments.len());

        let mut state = request.config;
        let _ = state.set_string(&AttributePath::new("id"), Uuid::new_v4().to_string());
        let _ = state.set_list(&AttributePath::new("assignments"), assignments);

        ReadDataSourceResponse {
            state,
            diagnostics,
            deferred: None,
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for RmsPolicyAssignmentsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        self.provider_data = provider_data_from(request.provider_data, &mut diagnostics);
        ConfigureDataSourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{provider_data, value};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::sync::Arc;
    use tfplug::types::ClientCapabilities;

    const ASSIGNMENTS: &str = "/v1/resource-manager/domains/d1/policy-assignments";

    #[tokio::test]
    async fn pages_are_followed_and_filtered() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", ASSIGNMENTS)
            .match_query(Matcher::Regex("^limit=200$".into()))
            .with_status(200)
            .with_body(
                json!({
                    "value": [
                        {"id": "pa-1", "name": "ecs-flavor", "state": "Enabled",
                         "policy_assignment_type": "builtin", "policy_definition_id": "def-1",
                         "parameters": {"listOfAllowedFlavors": {"value": ["s6.small.1"]}},
                         "created": "2024-03-01T08:00:00.000Z"},
                        {"id": "pa-2", "name": "obs-public", "state": "Disabled",
                         "policy_definition_id": "def-2"}
                    ],
                    "page_info": {"next_marker": "m2"}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", ASSIGNMENTS)
            .match_query(Matcher::UrlEncoded("marker".into(), "m2".into()))
            .with_status(200)
            .with_body(
                json!({
                    "value": [
                        {"id": "pa-3", "name": "custom-check", "state": "Enabled",
                         "policy_assignment_type": "custom",
                         "custom_policy": {"function_urn": "urn:fss:cn-north-4:p1:function:default:check"}}
                    ],
                    "page_info": {"next_marker": null}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut data_source = RmsPolicyAssignmentsDataSource::new();
        data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: Some(Arc::new(provider_data(&server.url()))),
                },
            )
            .await;
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: value(json!({"status": "Enabled"})),
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        first.assert_async().await;
        second.assert_async().await;

        let assignments = response
            .state
            .get(&AttributePath::new("assignments"))
            .as_list()
            .unwrap()
            .clone();
        let ids: Vec<_> = assignments.iter().map(|a| a.attr("id").as_str()).collect();
        assert_eq!(ids, vec![Some("pa-1"), Some("pa-3")]);
        assert_eq!(
            assignments[0].attr("parameters").attr("listOfAllowedFlavors").as_str(),
            Some(r#"["s6.small.1"]"#)
        );
        assert_eq!(assignments[0].attr("created_at").as_str(), Some("2024-03-01T08:00:00Z"));
        assert_eq!(
            assignments[1].attr("function_urn").as_str(),
            Some("urn:fss:cn-north-4:p1:function:default:check")
        );
    }

    #[test]
    fn filters_combine() {
        let filter = Filter {
            name: "ecs-flavor".to_string(),
            status: String::new(),
            policy_definition_id: "def-1".to_string(),
        };
        assert!(filter.matches(&json!({"name": "ecs-flavor", "policy_definition_id": "def-1"})));
        assert!(!filter.matches(&json!({"name": "ecs-flavor", "policy_definition_id": "def-2"})));
    }
}
