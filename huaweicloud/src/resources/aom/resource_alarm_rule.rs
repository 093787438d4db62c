//! AOM v4 alarm rule. The rule name is its id.

use async_trait::async_trait;
use serde_json::{json, Value};
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use super::alarm_spec::{
    alarm_tags_block, build_alarm_tags, build_event_conditions, build_metric_conditions,
    build_no_data, build_notification, build_recovery, event_trigger_conditions_block, field,
    flat, flat_str, flatten_alarm_tags, flatten_event_conditions, flatten_metric_conditions,
    flatten_no_data, flatten_notification, flatten_recovery, metric_trigger_conditions_block,
    monitor_objects, no_data_block, notification_block, recovery_block,
};
use crate::api::body::remove_nil;
use crate::api::{pathsearch, ApiError, ServiceClient};
use crate::resources::common::{
    api_error, attr_list, attr_single, check_deleted, get_str, has_changes, id_attribute,
    millis_to_rfc3339, not_configured, object, provider_data_from, region_attribute,
    set_opt_str,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_aomv4_alarm_rule";

/// Changes to anything else force a new rule
const UPDATABLE: [&str; 6] = [
    "description",
    "enable",
    "prom_instance_id",
    "alarm_notifications",
    "event_alarm_spec",
    "metric_alarm_spec",
];

#[derive(Default)]
pub struct AomAlarmRuleResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

/// Client, region and enterprise project for a rule
struct Scope {
    client: ServiceClient,
    region: String,
    enterprise_project_id: String,
}

impl AomAlarmRuleResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn scope(&self, state: &DynamicValue) -> Result<Scope, Diagnostic> {
        let config = &self.provider_data.as_ref().ok_or_else(not_configured)?.config;
        let region = config.get_region(state);
        let client = config
            .service_client("aom", &region)
            .await
            .map_err(|e| api_error("Failed to create AOM client", e))?;
        Ok(Scope {
            client,
            region,
            enterprise_project_id: config.get_enterprise_project_id(state),
        })
    }

    pub(crate) fn build_body(config: &DynamicValue) -> Value {
        let root = &config.value;

        let metric = attr_single(root, "metric_alarm_spec");
        let metric_body = if metric.is_null() {
            Value::Null
        } else {
            json!({
                "monitor_type": field(&metric, "monitor_type"),
                "no_data_conditions": build_no_data(&metric),
                "trigger_conditions": build_metric_conditions(&attr_list(&metric, "trigger_conditions"), true),
                "monitor_objects": field(&metric, "monitor_objects"),
            })
        };

        let event = attr_single(root, "event_alarm_spec");
        let event_body = if event.is_null() {
            Value::Null
        } else {
            json!({
                "alarm_source": field(&event, "alarm_source"),
                "event_source": field(&event, "event_source"),
                "trigger_conditions": build_event_conditions(&attr_list(&event, "trigger_conditions")),
                "monitor_objects": field(&event, "monitor_objects"),
            })
        };

        let mut body = remove_nil(json!({
            "alarm_rule_name": get_str(config, "name"),
            "alarm_rule_type": get_str(config, "type"),
            "alarm_notifications": build_notification(&attr_single(root, "alarm_notifications")),
            "metric_alarm_spec": metric_body,
            "event_alarm_spec": event_body,
            "prom_instance_id": field(root, "prom_instance_id"),
            "alarm_rule_enable": root.attr("enable").to_json(),
            "alarm_rule_description": field(root, "description"),
        }));

        // the service rejects metric specs without these, even when empty
        if !metric.is_null() {
            let spec = &mut body["metric_alarm_spec"];
            spec["recovery_conditions"] = remove_nil(build_recovery(&metric));
            spec["alarm_tags"] = build_alarm_tags(&metric);
        }
        body
    }

    fn flatten_metric_spec(rule: &Value) -> Vec<Dynamic> {
        let spec = pathsearch::search("metric_alarm_spec", rule);
        if spec.is_null() {
            return vec![];
        }
        vec![object([
            ("monitor_type", flat(&spec, "monitor_type")),
            ("no_data_conditions", Dynamic::List(flatten_no_data(&spec))),
            ("alarm_tags", Dynamic::List(flatten_alarm_tags(&spec))),
            ("trigger_conditions", Dynamic::List(flatten_metric_conditions(&spec, true))),
            ("recovery_conditions", Dynamic::List(flatten_recovery(&spec))),
            ("monitor_objects", flat(&spec, "monitor_objects")),
        ])]
    }

    fn flatten_event_spec(rule: &Value) -> Vec<Dynamic> {
        let spec = pathsearch::search("event_alarm_spec", rule);
        if spec.is_null() {
            return vec![];
        }
        vec![object([
            ("alarm_source", flat(&spec, "alarm_source")),
            ("event_source", flat(&spec, "event_source")),
            ("trigger_conditions", Dynamic::List(flatten_event_conditions(&spec))),
            ("monitor_objects", flat(&spec, "monitor_objects")),
        ])]
    }

    async fn read_state(scope: &Scope, mut state: DynamicValue) -> Result<DynamicValue, ApiError> {
        let aom = scope.client.aom();
        let rule = aom
            .alarm_rules()
            .get(&get_str(&state, "id"), &scope.enterprise_project_id)
            .await?;
        let text = |expr: &str| pathsearch::search_string(expr, &rule).unwrap_or_default();
        let millis = |expr: &str| pathsearch::search_i64(expr, &rule).unwrap_or_default();

        let _ = state.set_string(&AttributePath::new("region"), scope.region.clone());
        let _ = state.set_string(&AttributePath::new("name"), text("alarm_rule_name"));
        let _ = state.set_string(&AttributePath::new("type"), text("alarm_rule_type"));
        let _ = state.set_list(
            &AttributePath::new("alarm_notifications"),
            flatten_notification(&pathsearch::search("alarm_notifications", &rule)),
        );
        let _ = state.set_list(
            &AttributePath::new("metric_alarm_spec"),
            Self::flatten_metric_spec(&rule),
        );
        let _ = state.set_list(
            &AttributePath::new("event_alarm_spec"),
            Self::flatten_event_spec(&rule),
        );
        set_opt_str(&mut state, "prom_instance_id", &text("prom_instance_id"));
        set_opt_str(&mut state, "description", &text("alarm_rule_description"));
        let _ = state.set(&AttributePath::new("enable"), flat(&rule, "alarm_rule_enable"));
        let _ = state.set_string(&AttributePath::new("status"), text("alarm_rule_status"));
        let _ = state.set(&AttributePath::new("alarm_rule_id"), flat_str(&rule, "alarm_rule_id"));
        let _ = state.set_string(
            &AttributePath::new("enterprise_project_id"),
            text("enterprise_project_id"),
        );
        let _ = state.set_string(
            &AttributePath::new("created_at"),
            millis_to_rfc3339(millis("alarm_create_time")),
        );
        let _ = state.set_string(
            &AttributePath::new("updated_at"),
            millis_to_rfc3339(millis("alarm_update_time")),
        );

        Ok(state)
    }
}

#[async_trait]
impl Resource for AomAlarmRuleResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ResourceMetadataRequest,
    ) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let computed = |name: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .computed()
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an AOM v4 metric or event alarm rule")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The rule name, also used as its ID")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("metric or event")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("prom_instance_id", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable", AttributeType::Bool)
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enterprise_project_id", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(computed("status"))
            .attribute(computed("alarm_rule_id"))
            .attribute(computed("created_at"))
            .attribute(computed("updated_at"))
            .block(notification_block("alarm_notifications", true))
            .block(
                NestedBlockBuilder::new("event_alarm_spec")
                    .description("Event alarm settings; conflicts with metric_alarm_spec")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("alarm_source", AttributeType::String)
                            .required()
                            .force_new()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("event_source", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(monitor_objects())
                    .block(event_trigger_conditions_block())
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("metric_alarm_spec")
                    .description("Metric alarm settings; conflicts with event_alarm_spec")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("monitor_type", AttributeType::String)
                            .required()
                            .force_new()
                            .build(),
                    )
                    .attribute(monitor_objects())
                    .block(recovery_block(true))
                    .block(metric_trigger_conditions_block(true))
                    .block(no_data_block())
                    .block(alarm_tags_block())
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        let root = &request.config.value;

        let specs = ["event_alarm_spec", "metric_alarm_spec"]
            .iter()
            .filter(|name| !attr_list(root, name).is_empty())
            .count();
        if specs != 1 {
            diagnostics.push(Diagnostic::error(
                "Invalid alarm spec",
                "Exactly one of event_alarm_spec or metric_alarm_spec must be specified",
            ));
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut state = request.planned_state;

        let scope = match self.scope(&state).await {
            Ok(scope) => scope,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let name = get_str(&request.config, "name");
        let aom = scope.client.aom();
        if let Err(e) = aom
            .alarm_rules()
            .create(Self::build_body(&request.config), &scope.enterprise_project_id)
            .await
        {
            diagnostics.push(api_error("Failed to create alarm rule", e));
            return CreateResourceResponse {
                new_state: DynamicValue::null(),
                private: vec![],
                diagnostics,
            };
        }
        tracing::info!("Created AOM alarm rule {}", name);
        let _ = state.set_string(&AttributePath::new("id"), name);

        let new_state = match Self::read_state(&scope, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read alarm rule", e));
                state
            }
        };

        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let new_state = match self.scope(&request.current_state).await {
            Ok(scope) => match Self::read_state(&scope, request.current_state.clone()).await {
                Ok(state) => Some(state),
                Err(e) => {
                    let id = get_str(&request.current_state, "id");
                    match check_deleted(&e, "alarm rule", &id) {
                        Some(diag) => {
                            diagnostics.push(diag);
                            Some(request.current_state)
                        }
                        None => None,
                    }
                }
            },
            Err(diag) => {
                diagnostics.push(diag);
                Some(request.current_state)
            }
        };

        ReadResourceResponse {
            new_state,
            diagnostics,
            private: request.private,
            deferred: None,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let scope = match self.scope(&request.prior_state).await {
            Ok(scope) => scope,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };

        if has_changes(&request.prior_state, &request.planned_state, &UPDATABLE) {
            let aom = scope.client.aom();
            if let Err(e) = aom
                .alarm_rules()
                .update(Self::build_body(&request.config), &scope.enterprise_project_id)
                .await
            {
                diagnostics.push(api_error("Failed to update alarm rule", e));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        }

        let mut state = request.planned_state;
        let _ = state.set_string(
            &AttributePath::new("id"),
            get_str(&request.prior_state, "id"),
        );
        let new_state = match Self::read_state(&scope, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read alarm rule", e));
                state
            }
        };

        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let scope = match self.scope(&request.prior_state).await {
            Ok(scope) => scope,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };
        let aom = scope.client.aom();
        let api = aom.alarm_rules();
        let name = get_str(&request.prior_state, "id");

        // deleting an unknown name succeeds, so look it up first
        let deleted: Result<(), ApiError> = async {
            api.get(&name, &scope.enterprise_project_id).await?;
            api.delete(&name, &scope.enterprise_project_id).await
        }
        .await;
        match deleted {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diagnostics.push(api_error(format!("Failed to delete alarm rule ({})", name), e)),
        }

        DeleteResourceResponse { diagnostics }
    }

    fn import_handler(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for AomAlarmRuleResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];
        self.provider_data = provider_data_from(request.provider_data, &mut diagnostics);
        ConfigureResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithImportState for AomAlarmRuleResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        };
        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
#[path = "./resource_alarm_rule_test.rs"]
mod resource_alarm_rule_test;
