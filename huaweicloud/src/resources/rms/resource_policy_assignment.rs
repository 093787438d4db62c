//! RMS policy assignment at account (domain) level. An assignment applies
//! either a built-in policy definition or a custom FunctionGraph policy.
//!
//! Enabling an assignment starts an evaluation that can run for a long time
//! on large accounts, so creation only waits for it when the assignment has
//! to be disabled straight away.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
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
use tfplug::validator::StringOneOf;

use crate::api::body::{remove_nil, value_ignore_empty};
use crate::api::rms::policy_assignments::{
    PolicyAssignmentsApi, STATUS_DISABLED, STATUS_ENABLED, STATUS_EVALUATING,
};
use crate::api::wait::{StateChangeConf, WaitError};
use crate::api::{pathsearch, ApiError, ServiceClient};
use crate::resources::common::{
    api_error, attr_single, attr_str, check_deleted, format_rfc3339, get_str, has_change,
    id_attribute, not_configured, object, provider_data_from, set_opt_str, timeout,
    timeouts_block, validate_timeouts, wait_error,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_rms_policy_assignment";

const TYPE_BUILTIN: &str = "builtin";
const TYPE_CUSTOM: &str = "custom";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Attributes sent in the assignment body; `status` and `tags` have their
/// own endpoints
const BODY_ATTRIBUTES: [&str; 7] = [
    "name",
    "description",
    "policy_definition_id",
    "period",
    "policy_filter",
    "custom_policy",
    "parameters",
];

#[derive(Default)]
pub struct RmsPolicyAssignmentResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

/// Map of JSON strings (`parameters`, `auth_value`) decoded into values
pub(crate) fn decode_json_map(value: &Dynamic) -> Result<Map<String, Value>, String> {
    let mut out = Map::new();
    if let Some(entries) = value.as_map() {
        for (key, raw) in entries {
            let raw = raw.as_str().unwrap_or_default();
            let decoded = serde_json::from_str(raw)
                .map_err(|e| format!("the value of '{}' is not valid JSON: {}", key, e))?;
            out.insert(key.clone(), decoded);
        }
    }
    Ok(out)
}

/// Inverse of `decode_json_map`
pub(crate) fn encode_json_map(values: &Value) -> HashMap<String, Dynamic> {
    values
        .as_object()
        .map(|members| {
            members
                .iter()
                .map(|(k, v)| (k.clone(), Dynamic::from(serde_json::to_string(v).unwrap_or_default())))
                .collect()
        })
        .unwrap_or_default()
}

/// Policy filter block as sent to RMS, null when not configured
pub(crate) fn build_policy_filter(filter: &Dynamic) -> Value {
    if filter.is_null() {
        return Value::Null;
    }
    let field = |name: &str| value_ignore_empty(json!(attr_str(filter, name)));
    json!({
        "region_id": field("region"),
        "resource_provider": field("resource_provider"),
        "resource_type": field("resource_type"),
        "resource_id": field("resource_id"),
        "tag_key": field("tag_key"),
        "tag_value": field("tag_value"),
    })
}

/// Policy filter from an RMS response; an all-empty filter reads as unset
pub(crate) fn flatten_policy_filter(filter: &Value) -> Vec<Dynamic> {
    let fields = [
        ("region", "region_id"),
        ("resource_provider", "resource_provider"),
        ("resource_type", "resource_type"),
        ("resource_id", "resource_id"),
        ("tag_key", "tag_key"),
        ("tag_value", "tag_value"),
    ];
    let values: Vec<(&str, String)> = fields
        .iter()
        .map(|(attr, field)| (*attr, pathsearch::search_string(field, filter).unwrap_or_default()))
        .collect();
    if values.iter().all(|(_, v)| v.is_empty()) {
        return vec![];
    }
    // unset members stay null to match an unset optional attribute
    vec![object(values.into_iter().map(|(attr, v)| {
        (attr, Some(v).filter(|v| !v.is_empty()).into())
    }))]
}

/// Rule parameters, each wrapped as `{"value": ...}`
pub(crate) fn build_parameters(parameters: &Dynamic) -> Result<Map<String, Value>, String> {
    Ok(decode_json_map(parameters)
        .map_err(|e| format!("invalid parameter value: {}", e))?
        .into_iter()
        .map(|(k, v)| (k, json!({ "value": v })))
        .collect())
}

pub(crate) fn flatten_parameters(parameters: &Value) -> HashMap<String, Dynamic> {
    let values: Map<String, Value> = parameters
        .as_object()
        .map(|members| {
            members
                .iter()
                .map(|(k, v)| (k.clone(), pathsearch::search("value", v)))
                .collect()
        })
        .unwrap_or_default();
    encode_json_map(&Value::Object(values))
}

fn tags_of(value: &Dynamic) -> Vec<(String, String)> {
    let mut tags: Vec<(String, String)> = value
        .as_map()
        .map(|tags| {
            tags.iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default();
    tags.sort();
    tags
}

impl RmsPolicyAssignmentResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<(ServiceClient, Duration), Diagnostic> {
        let config = &self.provider_data.as_ref().ok_or_else(not_configured)?.config;
        if config.domain_id.is_empty() {
            return Err(Diagnostic::error(
                "Missing domain ID",
                "RMS policy assignments are domain scoped; set domain_id in the provider configuration",
            ));
        }
        Ok((config.domain_client("rms"), config.poll_interval))
    }

    pub(crate) fn build_body(config: &DynamicValue) -> Result<Value, String> {
        let root = &config.value;

        let custom = attr_single(root, "custom_policy");
        let (assignment_type, custom_policy) = if custom.is_null() {
            (TYPE_BUILTIN, Value::Null)
        } else {
            let auth_value = decode_json_map(custom.attr("auth_value"))
                .map_err(|e| format!("invalid authorization value: {}", e))?;
            (
                TYPE_CUSTOM,
                json!({
                    "function_urn": attr_str(&custom, "function_urn"),
                    "auth_type": attr_str(&custom, "auth_type"),
                    "auth_value": auth_value,
                }),
            )
        };

        let parameters = build_parameters(root.attr("parameters"))?;

        let mut body = remove_nil(json!({
            "name": get_str(config, "name"),
            "policy_assignment_type": assignment_type,
            "policy_definition_id": value_ignore_empty(json!(get_str(config, "policy_definition_id"))),
            "period": value_ignore_empty(json!(get_str(config, "period"))),
            "policy_filter": build_policy_filter(&attr_single(root, "policy_filter")),
            "custom_policy": custom_policy,
            "parameters": parameters,
        }));
        // sent even when empty so that an update can clear it
        body["description"] = json!(get_str(config, "description"));
        Ok(body)
    }

    async fn wait_for_status(
        ctx: &Context,
        api: &PolicyAssignmentsApi<'_>,
        id: &str,
        pending: &[&str],
        target: &[&str],
        timeout: Duration,
        interval: Duration,
    ) -> Result<(), WaitError> {
        tracing::debug!("Waiting for policy assignment {} to become {:?}", id, target);
        StateChangeConf::new(|| api.refresh(id))
            .pending(pending)
            .target(target)
            .timeout(timeout)
            .delay(interval)
            .poll_interval(interval)
            .continuous_target_occurrence(2)
            .wait_for_state(ctx)
            .await
            .map(|_| ())
    }

    async fn read_state(
        api: &PolicyAssignmentsApi<'_>,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let id = get_str(&state, "id");
        let assignment = api.get(&id).await?;
        let tags = api.list_tags(&id).await?;
        let text = |expr: &str| pathsearch::search_string(expr, &assignment).unwrap_or_default();

        let _ = state.set_string(&AttributePath::new("name"), text("name"));
        let _ = state.set_string(&AttributePath::new("type"), text("policy_assignment_type"));
        let _ = state.set_string(&AttributePath::new("status"), text("state"));
        for (attr, field) in [
            ("description", "description"),
            ("policy_definition_id", "policy_definition_id"),
            ("period", "period"),
        ] {
            set_opt_str(&mut state, attr, &text(field));
        }
        let _ = state.set_string(&AttributePath::new("created_at"), format_rfc3339(&text("created")));
        let _ = state.set_string(&AttributePath::new("updated_at"), format_rfc3339(&text("updated")));

        let _ = state.set_list(
            &AttributePath::new("policy_filter"),
            flatten_policy_filter(&pathsearch::search("policy_filter", &assignment)),
        );

        let custom = pathsearch::search("custom_policy", &assignment);
        let custom_policy = match pathsearch::search_string("function_urn", &custom) {
            Some(urn) if !urn.is_empty() => vec![object([
                ("function_urn", Dynamic::from(urn)),
                (
                    "auth_type",
                    Dynamic::from(pathsearch::search_string("auth_type", &custom).unwrap_or_default()),
                ),
                (
                    "auth_value",
                    Dynamic::Map(encode_json_map(&pathsearch::search("auth_value", &custom))),
                ),
            ])],
            _ => vec![],
        };
        let _ = state.set_list(&AttributePath::new("custom_policy"), custom_policy);

        let parameters = flatten_parameters(&pathsearch::search("parameters", &assignment));
        if !parameters.is_empty() || !state.get(&AttributePath::new("parameters")).is_null() {
            let _ = state.set_map(&AttributePath::new("parameters"), parameters);
        }

        if !tags.is_empty() || !state.get(&AttributePath::new("tags")).is_null() {
            let tags = tags.into_iter().map(|(k, v)| (k, Dynamic::from(v))).collect();
            let _ = state.set_map(&AttributePath::new("tags"), tags);
        }

        Ok(state)
    }

    async fn apply_update(
        &self,
        ctx: &Context,
        request: &UpdateResourceRequest,
    ) -> Result<(), Diagnostic> {
        let (client, interval) = self.client()?;
        let api = client.rms().policy_assignments();
        let (old, new) = (&request.prior_state, &request.planned_state);
        let id = get_str(old, "id");
        let update_timeout = timeout(new, "update", DEFAULT_TIMEOUT);

        let status = get_str(new, "status");
        if has_change(old, new, "status") && !status.is_empty() {
            api.set_status(&id, &status).await.map_err(|e| {
                api_error(format!("Failed to update the status of policy assignment ({})", id), e)
            })?;
            if status == STATUS_ENABLED {
                let previous = get_str(old, "status");
                Self::wait_for_status(
                    ctx,
                    &api,
                    &id,
                    &[previous.as_str()],
                    &[STATUS_EVALUATING, STATUS_ENABLED],
                    update_timeout,
                    interval,
                )
                .await
                .map_err(|e| wait_error(&format!("policy assignment ({}) to become enabled", id), e))?;
            }
        }

        if BODY_ATTRIBUTES.iter().any(|name| has_change(old, new, name)) {
            let body = Self::build_body(&request.config)
                .map_err(|e| Diagnostic::error("Invalid policy assignment", e))?;
            api.update(&id, body)
                .await
                .map_err(|e| api_error(format!("Failed to update policy assignment ({})", id), e))?;

            let current = if status.is_empty() { get_str(old, "status") } else { status.clone() };
            if !current.is_empty() {
                Self::wait_for_status(ctx, &api, &id, &[], &[current.as_str()], update_timeout, interval)
                    .await
                    .map_err(|e| {
                        wait_error(&format!("policy assignment ({}) to become {}", id, current), e)
                    })?;
            }
        }

        if has_change(old, new, "tags") {
            let result: Result<(), ApiError> = async {
                api.delete_tags(&id, &tags_of(old.get(&AttributePath::new("tags")))).await?;
                api.create_tags(&id, &tags_of(new.get(&AttributePath::new("tags")))).await
            }
            .await;
            result.map_err(|e| api_error("Failed to update the policy assignment tags", e))?;
        }

        Ok(())
    }
}

#[async_trait]
impl Resource for RmsPolicyAssignmentResource {
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
        let optional_string = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an RMS policy assignment")
            .attribute(id_attribute())
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the policy assignment")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(optional_string("description", "The description of the policy assignment"))
            .attribute(optional_string("policy_definition_id", "The ID of a built-in policy definition"))
            .attribute(optional_string("period", "The trigger period of the policy rule check"))
            .attribute(
                AttributeBuilder::new("parameters", AttributeType::map(AttributeType::String))
                    .description("Rule parameters, each value a JSON string")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .description("The expected status, Enabled or Disabled")
                    .optional()
                    .computed()
                    .validator(StringOneOf::new([STATUS_ENABLED, STATUS_DISABLED]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("tags", AttributeType::map(AttributeType::String))
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("The assignment type, builtin or custom")
                    .computed()
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
                NestedBlockBuilder::new("policy_filter")
                    .max_items(1)
                    .description("Filters selecting the resources the policy applies to")
                    .attribute(optional_string("region", "The region of the filtered resources"))
                    .attribute(optional_string("resource_provider", "The cloud service name"))
                    .attribute(optional_string("resource_type", "The resource type"))
                    .attribute(optional_string("resource_id", "A single resource ID"))
                    .attribute(optional_string("tag_key", "Tag key of the filtered resources"))
                    .attribute(optional_string("tag_value", "Tag value of the filtered resources"))
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("custom_policy")
                    .max_items(1)
                    .description("A custom policy backed by a FunctionGraph function")
                    .attribute(
                        AttributeBuilder::new("function_urn", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("auth_type", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("auth_value", AttributeType::map(AttributeType::String))
                            .description("Authorization values, each a JSON string")
                            .optional()
                            .build(),
                    )
                    .build(),
            )
            .block(timeouts_block(&["create", "update"]))
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

        if let Err(e) = decode_json_map(root.attr("parameters")) {
            diagnostics.push(
                Diagnostic::error("Invalid parameters", e)
                    .with_attribute(AttributePath::new("parameters")),
            );
        }
        let custom = attr_single(root, "custom_policy");
        if let Err(e) = decode_json_map(custom.attr("auth_value")) {
            diagnostics.push(
                Diagnostic::error("Invalid auth_value", e).with_attribute(
                    AttributePath::new("custom_policy").index(0).attribute("auth_value"),
                ),
            );
        }
        let filter = attr_single(root, "policy_filter");
        if !attr_str(&filter, "tag_value").is_empty() && attr_str(&filter, "tag_key").is_empty() {
            diagnostics.push(
                Diagnostic::error(
                    "Missing tag_key",
                    "tag_value can only be used together with tag_key",
                )
                .with_attribute(AttributePath::new("policy_filter").index(0).attribute("tag_value")),
            );
        }

        validate_timeouts(&request.config, &mut diagnostics);

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];
        let mut response = CreateResourceResponse {
            new_state: DynamicValue::null(),
            private: vec![],
            diagnostics: vec![],
        };

        let (client, interval) = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                response.diagnostics.push(diag);
                return response;
            }
        };
        let body = match Self::build_body(&request.config) {
            Ok(body) => body,
            Err(e) => {
                response
                    .diagnostics
                    .push(Diagnostic::error("Invalid policy assignment", e));
                return response;
            }
        };

        let api = client.rms().policy_assignments();
        let id = match api.create(body).await {
            Ok(created) => pathsearch::search_string("id", &created).unwrap_or_default(),
            Err(e) => {
                response
                    .diagnostics
                    .push(api_error("Failed to create policy assignment", e));
                return response;
            }
        };
        tracing::info!("Created RMS policy assignment {}", id);

        let mut state = request.planned_state.clone();
        let _ = state.set_string(&AttributePath::new("id"), id.clone());

        if get_str(&request.planned_state, "status") == STATUS_DISABLED {
            let create_timeout = timeout(&request.planned_state, "create", DEFAULT_TIMEOUT);
            let disabled: Result<(), Diagnostic> = async {
                Self::wait_for_status(
                    &ctx,
                    &api,
                    &id,
                    &[STATUS_DISABLED, STATUS_EVALUATING],
                    &[STATUS_ENABLED],
                    create_timeout,
                    interval,
                )
                .await
                .map_err(|e| wait_error(&format!("policy assignment ({}) to become enabled", id), e))?;
                api.disable(&id)
                    .await
                    .map_err(|e| api_error("Failed to disable the policy assignment", e))
            }
            .await;
            if let Err(diag) = disabled {
                diagnostics.push(diag);
            }
        }

        if diagnostics.is_empty() {
            let tags = tags_of(request.planned_state.get(&AttributePath::new("tags")));
            if let Err(e) = api.create_tags(&id, &tags).await {
                diagnostics.push(api_error("Failed to create the policy assignment tags", e));
            }
        }

        if diagnostics.is_empty() {
            match Self::read_state(&api, state.clone()).await {
                Ok(new_state) => state = new_state,
                Err(e) => diagnostics.push(api_error("Failed to read policy assignment", e)),
            }
        }

        CreateResourceResponse {
            new_state: state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let new_state = match self.client() {
            Ok((client, _)) => {
                let api = client.rms().policy_assignments();
                match Self::read_state(&api, request.current_state.clone()).await {
                    Ok(state) => Some(state),
                    Err(e) => {
                        let id = get_str(&request.current_state, "id");
                        match check_deleted(&e, "RMS policy assignment", &id) {
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

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        if let Err(diag) = self.apply_update(&ctx, &request).await {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![diag],
            };
        }

        let mut diagnostics = vec![];
        let new_state = match self.client() {
            Ok((client, _)) => {
                let api = client.rms().policy_assignments();
                match Self::read_state(&api, request.planned_state.clone()).await {
                    Ok(state) => state,
                    Err(e) => {
                        diagnostics.push(api_error("Failed to read policy assignment", e));
                        request.planned_state
                    }
                }
            }
            Err(diag) => {
                diagnostics.push(diag);
                request.planned_state
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

        match self.client() {
            Ok((client, _)) => {
                let api = client.rms().policy_assignments();
                let id = get_str(&request.prior_state, "id");
                let deleted: Result<(), ApiError> = async {
                    // enabled assignments cannot be deleted
                    if get_str(&request.prior_state, "status") == STATUS_ENABLED {
                        api.disable(&id).await?;
                    }
                    api.delete(&id).await
                }
                .await;
                match deleted {
                    Ok(()) => tracing::info!("Deleted RMS policy assignment {}", id),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => diagnostics.push(api_error(
                        format!("Failed to delete policy assignment ({})", id),
                        e,
                    )),
                }
            }
            Err(diag) => diagnostics.push(diag),
        }

        DeleteResourceResponse { diagnostics }
    }

    fn import_handler(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for RmsPolicyAssignmentResource {
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
impl ResourceWithImportState for RmsPolicyAssignmentResource {
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
#[path = "./resource_policy_assignment_test.rs"]
mod resource_policy_assignment_test;
