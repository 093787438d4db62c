//! RMS policy assignment deployed to every account of an organization

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tfplug::context::Context;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource,
    ReadResourceRequest, ReadResourceResponse, Resource, ResourceMetadataRequest,
    ResourceMetadataResponse, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse, ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use super::resource_policy_assignment::{
    build_parameters, build_policy_filter, decode_json_map, flatten_parameters,
    flatten_policy_filter,
};
use crate::api::body::{remove_nil, value_ignore_empty};
use crate::api::rms::org_policy_assignments::{
    OrgPolicyAssignmentsApi, CREATE_IN_PROGRESS, CREATE_SUCCESSFUL, DELETE_IN_PROGRESS,
    UPDATE_IN_PROGRESS, UPDATE_SUCCESSFUL,
};
use crate::api::wait::StateChangeConf;
use crate::api::{pathsearch, ApiError, ServiceClient};
use crate::resources::common::{
    api_error, attr_single, attr_str, check_deleted, format_rfc3339, get_str, not_configured,
    provider_data_from, set_opt_str, timeout, timeouts_block, validate_timeouts, wait_error,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_rms_organizational_policy_assignment";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Default)]
pub struct RmsOrganizationalPolicyAssignmentResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

impl RmsOrganizationalPolicyAssignmentResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<(ServiceClient, Duration), Diagnostic> {
        let config = &self.provider_data.as_ref().ok_or_else(not_configured)?.config;
        Ok((config.domain_client("rms"), config.poll_interval))
    }

    /// Managed assignments reference a policy definition, custom ones a
    /// function; both carry the same metadata shape
    pub(crate) fn build_body(config: &DynamicValue) -> Result<Value, String> {
        let root = &config.value;
        let policy_definition_id = get_str(config, "policy_definition_id");
        let metadata_key = if policy_definition_id.is_empty() {
            "custom_policy_assignment_metadata"
        } else {
            "managed_policy_assignment_metadata"
        };
        let metadata = json!({
            "description": get_str(config, "description"),
            "policy_filter": build_policy_filter(&attr_single(root, "policy_filter")),
            "policy_definition_id": value_ignore_empty(json!(policy_definition_id)),
            "period": value_ignore_empty(json!(get_str(config, "period"))),
            "function_urn": value_ignore_empty(json!(get_str(config, "function_urn"))),
            "parameters": build_parameters(root.attr("parameters"))?,
        });

        let excluded: Vec<String> = root
            .attr("excluded_accounts")
            .as_list()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let mut body = json!({
            "organization_policy_assignment_name": get_str(config, "name"),
            "excluded_accounts": excluded,
        });
        body[metadata_key] = metadata;
        Ok(remove_nil(body))
    }

    async fn put(api: &OrgPolicyAssignmentsApi<'_>, config: &DynamicValue) -> Result<String, Diagnostic> {
        let body = Self::build_body(config)
            .map_err(|e| Diagnostic::error("Invalid organizational policy assignment", e))?;
        api.put(body)
            .await
            .map_err(|e| api_error("Failed to deploy organizational policy assignment", e))
    }

    async fn wait_for_deployment(
        ctx: &Context,
        api: &OrgPolicyAssignmentsApi<'_>,
        id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> Result<(), Diagnostic> {
        StateChangeConf::new(move || async move { api.status(id).await.map(Some) })
            .pending(&[CREATE_IN_PROGRESS, UPDATE_IN_PROGRESS])
            .target(&[CREATE_SUCCESSFUL, UPDATE_SUCCESSFUL])
            .timeout(timeout)
            .delay(interval)
            .poll_interval(interval)
            .wait_for_state(ctx)
            .await
            .map(|_| ())
            .map_err(|e| {
                wait_error(
                    &format!("organizational policy assignment ({}) to be deployed", id),
                    e,
                )
            })
    }

    async fn read_state(
        api: &OrgPolicyAssignmentsApi<'_>,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let assignment = api.get(&get_str(&state, "id")).await?;
        let text = |expr: &str| pathsearch::search_string(expr, &assignment).unwrap_or_default();

        let _ = state.set_string(
            &AttributePath::new("name"),
            text("organization_policy_assignment_name"),
        );
        if let Some(organization_id) =
            pathsearch::search_string("organization_id", &assignment).filter(|v| !v.is_empty())
        {
            let _ = state.set_string(&AttributePath::new("organization_id"), organization_id);
        }
        set_opt_str(&mut state, "description", &text("description"));
        for field in [
            "policy_definition_id",
            "function_urn",
            "period",
            "owner_id",
            "organization_policy_assignment_urn",
        ] {
            let _ = state.set_string(&AttributePath::new(field), text(field));
        }
        let excluded: Vec<Dynamic> = pathsearch::search_array("excluded_accounts", &assignment)
            .iter()
            .map(Dynamic::from)
            .collect();
        let _ = state.set_list(&AttributePath::new("excluded_accounts"), excluded);
        let _ = state.set_list(
            &AttributePath::new("policy_filter"),
            flatten_policy_filter(&pathsearch::search("policy_filter", &assignment)),
        );
        let _ = state.set_map(
            &AttributePath::new("parameters"),
            flatten_parameters(&pathsearch::search("parameters", &assignment)),
        );
        let _ = state.set_string(&AttributePath::new("created_at"), format_rfc3339(&text("created_at")));
        let _ = state.set_string(&AttributePath::new("updated_at"), format_rfc3339(&text("updated_at")));

        Ok(state)
    }

    async fn deploy_and_read(
        &self,
        ctx: &Context,
        config: &DynamicValue,
        mut state: DynamicValue,
        operation: &str,
    ) -> Result<DynamicValue, (Diagnostic, Option<DynamicValue>)> {
        let (client, interval) = self.client().map_err(|diag| (diag, None))?;
        let organization_id = get_str(&state, "organization_id");
        let rms = client.rms();
        let org = rms.organization(&organization_id);
        let api = org.policy_assignments();

        let wait = timeout(&state, operation, DEFAULT_TIMEOUT);
        let id = Self::put(&api, config).await.map_err(|diag| (diag, None))?;
        tracing::info!("Deployed organizational policy assignment {}", id);
        let _ = state.set_string(&AttributePath::new("id"), id.clone());

        // the assignment exists from here on, so failures keep it in state
        if let Err(diag) = Self::wait_for_deployment(ctx, &api, &id, wait, interval).await {
            return Err((diag, Some(state)));
        }

        Self::read_state(&api, state.clone()).await.map_err(|e| {
            (
                api_error("Failed to read organizational policy assignment", e),
                Some(state),
            )
        })
    }
}

#[async_trait]
impl Resource for RmsOrganizationalPolicyAssignmentResource {
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
        let optional_computed = |name: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .optional()
                .computed()
                .build()
        };
        let computed = |name: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .computed()
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an RMS policy assignment for an organization")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("organization_id", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("excluded_accounts", AttributeType::set(AttributeType::String))
                    .description("Accounts the assignment is not applied to")
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
                AttributeBuilder::new("policy_definition_id", AttributeType::String)
                    .description("The managed policy definition; conflicts with function_urn")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("function_urn", AttributeType::String)
                    .description("The function backing a custom policy")
                    .optional()
                    .computed()
                    .force_new()
                    .build(),
            )
            .attribute(optional_computed("period"))
            .attribute(
                AttributeBuilder::new("parameters", AttributeType::map(AttributeType::String))
                    .description("Rule parameters, each value a JSON string")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(computed("owner_id"))
            .attribute(computed("organization_policy_assignment_urn"))
            .attribute(computed("created_at"))
            .attribute(computed("updated_at"))
            .block(
                NestedBlockBuilder::new("policy_filter")
                    .max_items(1)
                    .attribute(optional_computed("region"))
                    .attribute(optional_computed("resource_provider"))
                    .attribute(optional_computed("resource_type"))
                    .attribute(optional_computed("resource_id"))
                    .attribute(optional_computed("tag_key"))
                    .attribute(optional_computed("tag_value"))
                    .build(),
            )
            .block(timeouts_block(&["create", "update", "delete"]))
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

        let definition = root.attr("policy_definition_id");
        let function = root.attr("function_urn");
        // unknown values are settled at apply time
        if !definition.is_unknown() && !function.is_unknown() {
            let set = [definition, function]
                .iter()
                .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                .count();
            if set != 1 {
                diagnostics.push(Diagnostic::error(
                    "Invalid policy reference",
                    "Exactly one of policy_definition_id or function_urn must be specified",
                ));
            }
        }
        if let Err(e) = decode_json_map(root.attr("parameters")) {
            diagnostics.push(
                Diagnostic::error("Invalid parameters", e)
                    .with_attribute(AttributePath::new("parameters")),
            );
        }
        let filter = attr_single(root, "policy_filter");
        if !attr_str(&filter, "tag_value").is_empty() && attr_str(&filter, "tag_key").is_empty() {
            diagnostics.push(Diagnostic::error(
                "Missing tag_key",
                "tag_value can only be used together with tag_key",
            ));
        }

        validate_timeouts(&request.config, &mut diagnostics);

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        match self
            .deploy_and_read(&ctx, &request.config, request.planned_state, "create")
            .await
        {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err((diag, state)) => CreateResourceResponse {
                new_state: state.unwrap_or_else(DynamicValue::null),
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let new_state = match self.client() {
            Ok((client, _)) => {
                let rms = client.rms();
                let org = rms.organization(&get_str(&request.current_state, "organization_id"));
                match Self::read_state(&org.policy_assignments(), request.current_state.clone()).await {
                    Ok(state) => Some(state),
                    Err(e) => {
                        let id = get_str(&request.current_state, "id");
                        match check_deleted(&e, "organizational policy assignment", &id) {
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
        let mut planned = request.planned_state;
        let _ = planned.set_string(
            &AttributePath::new("id"),
            get_str(&request.prior_state, "id"),
        );
        match self.deploy_and_read(&ctx, &request.config, planned, "update").await {
            Ok(new_state) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Err((diag, state)) => UpdateResourceResponse {
                new_state: state.unwrap_or(request.prior_state),
                private: vec![],
                diagnostics: vec![diag],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        let (client, interval) = match self.client() {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };
        let rms = client.rms();
        let org = rms.organization(&get_str(&request.prior_state, "organization_id"));
        let api = org.policy_assignments();
        let id = get_str(&request.prior_state, "id");

        match api.delete(&id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(api_error(
                    format!("Failed to delete organizational policy assignment ({})", id),
                    e,
                ));
                return DeleteResourceResponse { diagnostics };
            }
        }

        let (api, assignment_id) = (&api, id.as_str());
        let waited = StateChangeConf::new(move || async move {
            match api.status(assignment_id).await {
                Ok(status) => Ok(Some(status)),
                Err(e) if e.is_not_found() => Ok(Some((Value::Null, String::new()))),
                Err(e) => Err(e),
            }
        })
        .pending(&[DELETE_IN_PROGRESS])
        .target(&[""])
        .timeout(timeout(&request.prior_state, "delete", DEFAULT_TIMEOUT))
        .delay(interval)
        .poll_interval(interval)
        .wait_for_state(&ctx)
        .await;
        if let Err(e) = waited {
            diagnostics.push(wait_error(
                &format!("organizational policy assignment ({}) to be deleted", id),
                e,
            ));
        }

        DeleteResourceResponse { diagnostics }
    }

    fn import_handler(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for RmsOrganizationalPolicyAssignmentResource {
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
impl ResourceWithImportState for RmsOrganizationalPolicyAssignmentResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        };

        match tfplug::parse_import_id(&request.id, &["organization_id", "id"]) {
            Ok(parts) => {
                let mut state = DynamicValue::object();
                let _ = state.set_string(&AttributePath::new("organization_id"), parts[0].clone());
                let _ = state.set_string(&AttributePath::new("id"), parts[1].clone());
                response.imported_resources.push(ImportedResource {
                    type_name: request.type_name,
                    state,
                    private: vec![],
                });
            }
            Err(diag) => response.diagnostics.push(diag),
        }

        response
    }
}
