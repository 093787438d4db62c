//! AOM alarm rule template: a reusable set of metric and event alarm rule
//! specs bound to cloud services, CCE clusters or Prometheus instances

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
    flat, flatten_alarm_tags, flatten_event_conditions, flatten_metric_conditions,
    flatten_no_data, flatten_notification, flatten_recovery, metric_trigger_conditions_block,
    monitor_objects, no_data_block, notification_block, recovery_block,
};
use crate::api::body::remove_nil;
use crate::api::{pathsearch, ApiError, ServiceClient};
use crate::resources::common::{
    api_error, attr_json, attr_list, attr_single, attr_str, check_deleted, get_str,
    has_changes, id_attribute, millis_to_rfc3339, not_configured, object, provider_data_from,
    region_attribute, set_opt_str,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_aom_alarm_rules_template";

const UPDATABLE: [&str; 4] = ["type", "description", "alarm_template_spec_list", "templating"];

#[derive(Default)]
pub struct AomAlarmRulesTemplateResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

fn optional_string(name: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .build()
}

fn optional_string_set(name: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, AttributeType::set(AttributeType::String))
        .optional()
        .build()
}

fn build_event_spec(spec: &Dynamic) -> Value {
    if spec.is_null() {
        return Value::Null;
    }
    json!({
        "alarm_subtype": field(spec, "alarm_subtype"),
        "alarm_source": field(spec, "alarm_source"),
        "event_source": field(spec, "event_source"),
        "trigger_conditions": build_event_conditions(&attr_list(spec, "trigger_conditions")),
        "monitor_objects": field(spec, "monitor_objects"),
        "monitor_object_templates": field(spec, "monitor_object_templates"),
    })
}

fn build_metric_spec(spec: &Dynamic) -> Value {
    if spec.is_null() {
        return Value::Null;
    }
    let configured = |name: &str| !attr_list(spec, name).is_empty();
    json!({
        "alarm_subtype": field(spec, "alarm_subtype"),
        "alarm_source": field(spec, "alarm_source"),
        "monitor_type": field(spec, "monitor_type"),
        "recovery_conditions": if configured("recovery_conditions") { build_recovery(spec) } else { Value::Null },
        "no_data_conditions": build_no_data(spec),
        "alarm_tags": if configured("alarm_tags") { build_alarm_tags(spec) } else { Value::Null },
        "trigger_conditions": build_metric_conditions(&attr_list(spec, "trigger_conditions"), false),
    })
}

/// Items without a rule name are placeholders and are skipped
fn build_spec_items(items: &[Dynamic]) -> Value {
    let built: Vec<Value> = items
        .iter()
        .filter(|item| !attr_str(item, "alarm_rule_name").is_empty())
        .map(|item| {
            json!({
                "alarm_template_name": attr_json(item, "alarm_rule_name"),
                "alarm_template_spec_type": attr_json(item, "alarm_rule_type"),
                "desc": field(item, "alarm_rule_description"),
                "event_alarm_template_spec": build_event_spec(&attr_single(item, "event_alarm_spec")),
                "metric_alarm_template_spec": build_metric_spec(&attr_single(item, "metric_alarm_spec")),
            })
        })
        .collect();
    Value::Array(built)
}

fn build_spec_list(specs: &[Dynamic]) -> Value {
    let built: Vec<Value> = specs
        .iter()
        .map(|spec| {
            remove_nil(json!({
                "related_cloud_service": field(spec, "related_cloud_service"),
                "related_cce_clusters": field(spec, "related_cce_clusters"),
                "related_prometheus_instances": field(spec, "related_prometheus_instances"),
                "alarm_notification": build_notification(&attr_single(spec, "alarm_notification")),
                "alarm_template_spec_items": build_spec_items(&attr_list(spec, "alarm_template_spec_items")),
            }))
        })
        .filter(|spec| spec.as_object().is_some_and(|m| !m.is_empty()))
        .collect();
    Value::Array(built)
}

/// Variables always carry `query`, even when empty
fn build_templating(config: &DynamicValue) -> Value {
    let templating = attr_single(&config.value, "templating");
    let list: Vec<Value> = attr_list(&templating, "list")
        .iter()
        .map(|var| {
            json!({
                "name": attr_json(var, "name"),
                "query": attr_str(var, "query"),
                "type": field(var, "type"),
                "description": field(var, "description"),
            })
        })
        .collect();
    json!({ "list": list })
}

fn flatten_event_spec(item: &Value) -> Vec<Dynamic> {
    let spec = pathsearch::search("event_alarm_template_spec", item);
    if spec.is_null() {
        return vec![];
    }
    vec![object([
        ("alarm_subtype", flat(&spec, "alarm_subtype")),
        ("alarm_source", flat(&spec, "alarm_source")),
        ("event_source", flat(&spec, "event_source")),
        ("trigger_conditions", Dynamic::List(flatten_event_conditions(&spec))),
        ("monitor_objects", flat(&spec, "monitor_objects")),
        ("monitor_object_templates", flat(&spec, "monitor_object_templates")),
    ])]
}

fn flatten_metric_spec(item: &Value) -> Vec<Dynamic> {
    let spec = pathsearch::search("metric_alarm_template_spec", item);
    if spec.is_null() {
        return vec![];
    }
    vec![object([
        ("alarm_subtype", flat(&spec, "alarm_subtype")),
        ("alarm_source", flat(&spec, "alarm_source")),
        ("monitor_type", flat(&spec, "monitor_type")),
        ("no_data_conditions", Dynamic::List(flatten_no_data(&spec))),
        ("alarm_tags", Dynamic::List(flatten_alarm_tags(&spec))),
        ("trigger_conditions", Dynamic::List(flatten_metric_conditions(&spec, false))),
        ("recovery_conditions", Dynamic::List(flatten_recovery(&spec))),
    ])]
}

fn flatten_spec_list(template: &Value) -> Vec<Dynamic> {
    pathsearch::search_array("alarm_template_spec_list", template)
        .iter()
        .map(|spec| {
            let items: Vec<Dynamic> = pathsearch::search_array("alarm_template_spec_items", spec)
                .iter()
                .map(|item| {
                    object([
                        ("alarm_rule_name", flat(item, "alarm_template_name")),
                        ("alarm_rule_type", flat(item, "alarm_template_spec_type")),
                        ("alarm_rule_description", flat(item, "desc")),
                        ("event_alarm_spec", Dynamic::List(flatten_event_spec(item))),
                        ("metric_alarm_spec", Dynamic::List(flatten_metric_spec(item))),
                    ])
                })
                .collect();
            object([
                ("related_cloud_service", flat(spec, "related_cloud_service")),
                ("related_cce_clusters", flat(spec, "related_cce_clusters")),
                ("related_prometheus_instances", flat(spec, "related_prometheus_instances")),
                (
                    "alarm_notification",
                    Dynamic::List(flatten_notification(&pathsearch::search("alarm_notification", spec))),
                ),
                ("alarm_template_spec_items", Dynamic::List(items)),
            ])
        })
        .collect()
}

fn flatten_templating(template: &Value) -> Vec<Dynamic> {
    let templating = pathsearch::search("templating", template);
    let list: Vec<Dynamic> = pathsearch::search_array("list", &templating)
        .iter()
        .map(|var| {
            object([
                ("name", flat(var, "name")),
                ("type", flat(var, "type")),
                ("query", flat(var, "query")),
                ("description", flat(var, "description")),
            ])
        })
        .collect();
    if list.is_empty() {
        return vec![];
    }
    vec![object([("list", Dynamic::List(list))])]
}

impl AomAlarmRulesTemplateResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self, state: &DynamicValue) -> Result<(ServiceClient, String, String), Diagnostic> {
        let config = &self.provider_data.as_ref().ok_or_else(not_configured)?.config;
        let region = config.get_region(state);
        let client = config
            .service_client("aom", &region)
            .await
            .map_err(|e| api_error("Failed to create AOM client", e))?;
        Ok((client, region, config.get_enterprise_project_id(state)))
    }

    pub(crate) fn build_body(config: &DynamicValue) -> Value {
        remove_nil(json!({
            "alarm_rule_template_name": get_str(config, "name"),
            "alarm_rule_template_type": get_str(config, "type"),
            "alarm_template_spec_list": build_spec_list(&attr_list(&config.value, "alarm_template_spec_list")),
            "templating": build_templating(config),
            "alarm_rule_template_description": field(&config.value, "description"),
        }))
    }

    /// Updates name the template and always send the description so it can
    /// be cleared
    pub(crate) fn build_update_body(id: &str, config: &DynamicValue) -> Value {
        let mut body = Self::build_body(config);
        body["alarm_rule_template_id"] = json!(id);
        body["alarm_rule_template_description"] = json!(get_str(config, "description"));
        body
    }

    async fn read_state(
        client: &ServiceClient,
        region: &str,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let aom = client.aom();
        let template = aom.alarm_rule_templates().get(&get_str(&state, "id")).await?;
        let text = |expr: &str| pathsearch::search_string(expr, &template).unwrap_or_default();
        let millis = |expr: &str| pathsearch::search_i64(expr, &template).unwrap_or_default();

        let _ = state.set_string(&AttributePath::new("region"), region.to_string());
        let _ = state.set_string(&AttributePath::new("name"), text("alarm_rule_template_name"));
        let _ = state.set_string(&AttributePath::new("type"), text("alarm_rule_template_type"));
        set_opt_str(&mut state, "description", &text("alarm_rule_template_description"));
        let _ = state.set_string(
            &AttributePath::new("enterprise_project_id"),
            text("enterprise_project_id"),
        );
        let _ = state.set_string(
            &AttributePath::new("created_at"),
            millis_to_rfc3339(millis("create_time")),
        );
        let _ = state.set_string(
            &AttributePath::new("updated_at"),
            millis_to_rfc3339(millis("modify_time")),
        );
        let _ = state.set_list(
            &AttributePath::new("alarm_template_spec_list"),
            flatten_spec_list(&template),
        );
        let _ = state.set_list(&AttributePath::new("templating"), flatten_templating(&template));

        Ok(state)
    }
}

#[async_trait]
impl Resource for AomAlarmRulesTemplateResource {
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
        let event_spec = NestedBlockBuilder::new("event_alarm_spec")
            .max_items(1)
            .attribute(optional_string("alarm_subtype"))
            .attribute(optional_string("alarm_source"))
            .attribute(optional_string("event_source"))
            .attribute(monitor_objects())
            .attribute(optional_string_set("monitor_object_templates"))
            .block(event_trigger_conditions_block())
            .build();

        let metric_spec = NestedBlockBuilder::new("metric_alarm_spec")
            .max_items(1)
            .attribute(optional_string("alarm_subtype"))
            .attribute(optional_string("alarm_source"))
            .attribute(optional_string("monitor_type"))
            .block(recovery_block(false))
            .block(metric_trigger_conditions_block(false))
            .block(no_data_block())
            .block(alarm_tags_block())
            .build();

        let spec_items = NestedBlockBuilder::new("alarm_template_spec_items")
            .set()
            .attribute(
                AttributeBuilder::new("alarm_rule_name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("alarm_rule_type", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(optional_string("alarm_rule_description"))
            .block(event_spec)
            .block(metric_spec)
            .build();

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an AOM alarm rule template")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("The template type, such as statics or dynamic")
                    .required()
                    .build(),
            )
            .attribute(optional_string("description"))
            .attribute(
                AttributeBuilder::new("enterprise_project_id", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("updated_at", AttributeType::String)
                    .computed()
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("alarm_template_spec_list")
                    .min_items(1)
                    .attribute(optional_string("related_cloud_service"))
                    .attribute(optional_string_set("related_cce_clusters"))
                    .attribute(optional_string_set("related_prometheus_instances"))
                    .block(notification_block("alarm_notification", false))
                    .block(spec_items)
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("templating")
                    .description("Variables referenced from the template's rules")
                    .max_items(1)
                    .block(
                        NestedBlockBuilder::new("list")
                            .set()
                            .min_items(1)
                            .attribute(
                                AttributeBuilder::new("name", AttributeType::String)
                                    .required()
                                    .build(),
                            )
                            .attribute(optional_string("query"))
                            .attribute(optional_string("type"))
                            .attribute(optional_string("description"))
                            .build(),
                    )
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
        _request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        ValidateResourceConfigResponse {
            diagnostics: vec![],
        }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut state = request.planned_state;

        let (client, region, enterprise_project_id) = match self.client(&state).await {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let aom = client.aom();
        let id = match aom
            .alarm_rule_templates()
            .create(Self::build_body(&request.config), &enterprise_project_id)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                diagnostics.push(api_error("Failed to create alarm rules template", e));
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics,
                };
            }
        };
        tracing::info!("Created AOM alarm rules template {}", id);
        let _ = state.set_string(&AttributePath::new("id"), id);

        let new_state = match Self::read_state(&client, &region, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read alarm rules template", e));
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

        let new_state = match self.client(&request.current_state).await {
            Ok((client, region, _)) => {
                match Self::read_state(&client, &region, request.current_state.clone()).await {
                    Ok(state) => Some(state),
                    Err(e) => {
                        let id = get_str(&request.current_state, "id");
                        match check_deleted(&e, "alarm rules template", &id) {
                            Some(diag) => {
                                diagnostics.push(diag);
                                Some(request.current_state)
                            }
                            None => None,
                        }
                    }
                }
            }
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

        let (client, region, enterprise_project_id) = match self.client(&request.prior_state).await {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        };
        let id = get_str(&request.prior_state, "id");

        if has_changes(&request.prior_state, &request.planned_state, &UPDATABLE) {
            let aom = client.aom();
            if let Err(e) = aom
                .alarm_rule_templates()
                .update(Self::build_update_body(&id, &request.config), &enterprise_project_id)
                .await
            {
                diagnostics.push(api_error(
                    format!("Failed to update alarm rules template ({})", id),
                    e,
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        }

        let mut state = request.planned_state;
        let _ = state.set_string(&AttributePath::new("id"), id);
        let new_state = match Self::read_state(&client, &region, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read alarm rules template", e));
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

        let (client, _, _) = match self.client(&request.prior_state).await {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };
        let id = get_str(&request.prior_state, "id");

        let aom = client.aom();
        match aom.alarm_rule_templates().delete(&id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => diagnostics.push(api_error(
                format!("Failed to delete alarm rules template ({})", id),
                e,
            )),
        }

        DeleteResourceResponse { diagnostics }
    }

    fn import_handler(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for AomAlarmRulesTemplateResource {
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
impl ResourceWithImportState for AomAlarmRulesTemplateResource {
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
