//! Organization conformance pack, deployed to member accounts from a
//! predefined template, an inline template body or an OBS template URI

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

use crate::api::body::{remove_nil, value_ignore_empty};
use crate::api::rms::org_conformance_packs::{
    OrgConformancePacksApi, CREATE_IN_PROGRESS, CREATE_SUCCESSFUL, DELETE_IN_PROGRESS,
    ROLLBACK_IN_PROGRESS, ROLLBACK_SUCCESSFUL, UPDATE_IN_PROGRESS, UPDATE_SUCCESSFUL,
};
use crate::api::wait::StateChangeConf;
use crate::api::{pathsearch, ApiError, ServiceClient};
use crate::resources::common::{
    api_error, attr_str, check_deleted, format_rfc3339, get_list, get_str, not_configured,
    object, provider_data_from, timeout, timeouts_block, to_json_string, validate_timeouts,
    wait_error,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_rms_organizational_assignment_package";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const TEMPLATE_SOURCES: [&str; 3] = ["template_key", "template_body", "template_uri"];

#[derive(Default)]
pub struct RmsOrganizationalAssignmentPackageResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

/// `vars_structure` entries; each `var_value` holds JSON text
fn build_vars(state: &DynamicValue) -> Result<Vec<Value>, String> {
    get_list(state, "vars_structure")
        .iter()
        .map(|var| {
            let key = attr_str(var, "var_key");
            let raw = attr_str(var, "var_value");
            let value: Value = serde_json::from_str(&raw)
                .map_err(|e| format!("var_value of {:?} is not valid JSON: {}", key, e))?;
            Ok(json!({
                "var_key": value_ignore_empty(json!(key)),
                "var_value": value,
            }))
        })
        .collect()
}

fn flatten_vars(package: &Value) -> Vec<Dynamic> {
    pathsearch::search_array("vars_structure", package)
        .iter()
        .map(|var| {
            object([
                (
                    "var_key",
                    Dynamic::from(pathsearch::search_string("var_key", var)),
                ),
                (
                    "var_value",
                    Dynamic::from(to_json_string(&pathsearch::search("var_value", var))),
                ),
            ])
        })
        .collect()
}

impl RmsOrganizationalAssignmentPackageResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<(ServiceClient, Duration), Diagnostic> {
        let config = &self.provider_data.as_ref().ok_or_else(not_configured)?.config;
        Ok((config.domain_client("rms"), config.poll_interval))
    }

    /// Template sources only go out on create; they force replacement
    pub(crate) fn build_body(config: &DynamicValue, creating: bool) -> Result<Value, String> {
        let excluded: Vec<String> = get_list(config, "excluded_accounts")
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect();

        let mut body = json!({
            "name": get_str(config, "name"),
            "excluded_accounts": value_ignore_empty(json!(excluded)),
            "vars_structure": build_vars(config)?,
        });
        if creating {
            for field in TEMPLATE_SOURCES {
                body[field] = value_ignore_empty(json!(get_str(config, field)));
            }
        }
        Ok(remove_nil(body))
    }

    /// Waits on the deployment state reported for the package name
    async fn wait_for_deployment(
        ctx: &Context,
        api: &OrgConformancePacksApi<'_>,
        name: &str,
        pending: &[&str],
        target: &[&str],
        timeout: Duration,
        interval: Duration,
    ) -> Result<(), Diagnostic> {
        StateChangeConf::new(move || async move {
            match api.status(name).await {
                Ok(status) => Ok(Some(status)),
                Err(e) if e.is_not_found() => Ok(Some((Value::Null, String::new()))),
                Err(e) => Err(e),
            }
        })
        .pending(pending)
        .target(target)
        .timeout(timeout)
        .delay(interval)
        .poll_interval(interval)
        .wait_for_state(ctx)
        .await
        .map(|_| ())
        .map_err(|e| wait_error(&format!("assignment package ({}) to reach {:?}", name, target), e))
    }

    async fn read_state(
        api: &OrgConformancePacksApi<'_>,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let package = api.get(&get_str(&state, "id")).await?;
        let text = |expr: &str| pathsearch::search_string(expr, &package).unwrap_or_default();

        if let Some(organization_id) =
            pathsearch::search_string("organization_id", &package).filter(|v| !v.is_empty())
        {
            let _ = state.set_string(&AttributePath::new("organization_id"), organization_id);
        }
        let _ = state.set_string(&AttributePath::new("name"), text("org_conformance_pack_name"));
        let _ = state.set_string(&AttributePath::new("owner_id"), text("owner_id"));
        let _ = state.set_string(
            &AttributePath::new("org_conformance_pack_urn"),
            text("org_conformance_pack_urn"),
        );
        let excluded: Vec<Dynamic> = pathsearch::search_array("excluded_accounts", &package)
            .iter()
            .map(Dynamic::from)
            .collect();
        let _ = state.set_list(&AttributePath::new("excluded_accounts"), excluded);
        let _ = state.set_list(&AttributePath::new("vars_structure"), flatten_vars(&package));
        let _ = state.set_string(&AttributePath::new("created_at"), format_rfc3339(&text("created_at")));
        let _ = state.set_string(&AttributePath::new("updated_at"), format_rfc3339(&text("updated_at")));

        Ok(state)
    }
}

#[async_trait]
impl Resource for RmsOrganizationalAssignmentPackageResource {
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
        let template = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .computed()
                .force_new()
                .build()
        };
        let computed = |name: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .computed()
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an RMS conformance package assigned to an organization")
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
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("excluded_accounts", AttributeType::list(AttributeType::String))
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(template("template_key", "Name of a predefined conformance package"))
            .attribute(template("template_body", "Content of a custom conformance package"))
            .attribute(template("template_uri", "OBS address of a conformance package"))
            .attribute(computed("owner_id"))
            .attribute(computed("org_conformance_pack_urn"))
            .attribute(computed("created_at"))
            .attribute(computed("updated_at"))
            .block(
                NestedBlockBuilder::new("vars_structure")
                    .set()
                    .description("Template parameters; var_value is JSON text")
                    .attribute(
                        AttributeBuilder::new("var_key", AttributeType::String)
                            .optional()
                            .computed()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("var_value", AttributeType::String)
                            .optional()
                            .computed()
                            .build(),
                    )
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

        let sources: Vec<&Dynamic> = TEMPLATE_SOURCES.iter().map(|f| root.attr(f)).collect();
        if !sources.iter().any(|v| v.is_unknown()) {
            let set = sources.iter().filter(|v| !v.is_empty()).count();
            if set != 1 {
                diagnostics.push(Diagnostic::error(
                    "Invalid template source",
                    "Exactly one of template_key, template_body or template_uri must be specified",
                ));
            }
        }

        for (i, var) in get_list(&request.config, "vars_structure").iter().enumerate() {
            let raw = var.attr("var_value");
            let Some(raw) = raw.as_str() else { continue };
            if let Err(e) = serde_json::from_str::<Value>(raw) {
                diagnostics.push(
                    Diagnostic::error("Invalid var_value", e.to_string()).with_attribute(
                        AttributePath::new("vars_structure")
                            .index(i as i64)
                            .attribute("var_value"),
                    ),
                );
            }
        }

        validate_timeouts(&request.config, &mut diagnostics);

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let (client, interval) = match self.client() {
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
        let rms = client.rms();
        let org = rms.organization(&get_str(&request.planned_state, "organization_id"));
        let api = org.conformance_packs();

        let created: Result<String, Diagnostic> = async {
            let body = Self::build_body(&request.config, true)
                .map_err(|e| Diagnostic::error("Invalid assignment package", e))?;
            let id = api
                .create(body)
                .await
                .map_err(|e| api_error("Failed to create assignment package", e))?;
            tracing::info!("Created organizational assignment package {}", id);
            Ok(id)
        }
        .await;
        let id = match created {
            Ok(id) => id,
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics,
                };
            }
        };

        let mut state = request.planned_state;
        let _ = state.set_string(&AttributePath::new("id"), id);

        let waited = Self::wait_for_deployment(
            &ctx,
            &api,
            &get_str(&state, "name"),
            &[CREATE_IN_PROGRESS, ROLLBACK_IN_PROGRESS],
            &[CREATE_SUCCESSFUL, ROLLBACK_SUCCESSFUL],
            timeout(&state, "create", DEFAULT_TIMEOUT),
            interval,
        )
        .await;
        if let Err(diag) = waited {
            diagnostics.push(diag);
            return CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics,
            };
        }

        let new_state = match Self::read_state(&api, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read assignment package", e));
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

        let new_state = match self.client() {
            Ok((client, _)) => {
                let rms = client.rms();
                let org = rms.organization(&get_str(&request.current_state, "organization_id"));
                match Self::read_state(&org.conformance_packs(), request.current_state.clone()).await {
                    Ok(state) => Some(state),
                    Err(e) => {
                        let id = get_str(&request.current_state, "id");
                        match check_deleted(&e, "assignment package", &id) {
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
        let mut diagnostics = vec![];

        let (client, interval) = match self.client() {
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
        let rms = client.rms();
        let org = rms.organization(&get_str(&request.prior_state, "organization_id"));
        let api = org.conformance_packs();
        let id = get_str(&request.prior_state, "id");

        let updated: Result<(), Diagnostic> = async {
            let body = Self::build_body(&request.config, false)
                .map_err(|e| Diagnostic::error("Invalid assignment package", e))?;
            api.update(&id, body)
                .await
                .map_err(|e| api_error(format!("Failed to update assignment package ({})", id), e))?;
            Self::wait_for_deployment(
                &ctx,
                &api,
                &get_str(&request.planned_state, "name"),
                &[UPDATE_IN_PROGRESS, ROLLBACK_IN_PROGRESS],
                &[UPDATE_SUCCESSFUL, ROLLBACK_SUCCESSFUL],
                timeout(&request.planned_state, "update", DEFAULT_TIMEOUT),
                interval,
            )
            .await
        }
        .await;
        if let Err(diag) = updated {
            diagnostics.push(diag);
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics,
            };
        }

        let mut state = request.planned_state;
        let _ = state.set_string(&AttributePath::new("id"), id);
        let new_state = match Self::read_state(&api, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read assignment package", e));
                state
            }
        };

        UpdateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
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
        let api = org.conformance_packs();
        let id = get_str(&request.prior_state, "id");

        match api.delete(&id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return DeleteResourceResponse { diagnostics },
            Err(e) => {
                diagnostics.push(api_error(
                    format!("Failed to delete assignment package ({})", id),
                    e,
                ));
                return DeleteResourceResponse { diagnostics };
            }
        }

        if let Err(diag) = Self::wait_for_deployment(
            &ctx,
            &api,
            &get_str(&request.prior_state, "name"),
            &[DELETE_IN_PROGRESS],
            &[""],
            timeout(&request.prior_state, "delete", DEFAULT_TIMEOUT),
            interval,
        )
        .await
        {
            diagnostics.push(diag);
        }

        DeleteResourceResponse { diagnostics }
    }

    fn import_handler(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for RmsOrganizationalAssignmentPackageResource {
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
impl ResourceWithImportState for RmsOrganizationalAssignmentPackageResource {
    /// Accepts `<organization_id>/<id>`; a bare id leaves the organization
    /// to be supplied by configuration
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut state = DynamicValue::object();
        match request.id.split_once('/') {
            Some((organization_id, id)) => {
                let _ = state.set_string(
                    &AttributePath::new("organization_id"),
                    organization_id.to_string(),
                );
                let _ = state.set_string(&AttributePath::new("id"), id.to_string());
            }
            None => {
                let _ = state.set_string(&AttributePath::new("id"), request.id.clone());
            }
        }

        ImportResourceStateResponse {
            imported_resources: vec![ImportedResource {
                type_name: request.type_name,
                state,
                private: vec![],
            }],
            diagnostics: vec![],
            deferred: None,
        }
    }
}

#[cfg(test)]
#[path = "./resource_organizational_assignment_package_test.rs"]
mod resource_organizational_assignment_package_test;
