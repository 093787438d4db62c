//! APIG environment resource. Environments have no detail endpoint, so the
//! resource is always located through the list API.

use async_trait::async_trait;
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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::StringLengthBetween;

use crate::api::apig::{EnvironmentRequest, EnvironmentResponse};
use crate::api::{ApiError, ServiceClient};
use crate::resources::common::{
    api_error, check_deleted, format_rfc3339, get_str, id_attribute, not_configured,
    provider_data_from, region_attribute, set_opt_str,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_apig_environment";

#[derive(Default)]
pub struct ApigEnvironmentResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

impl ApigEnvironmentResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self, state: &DynamicValue) -> Result<(ServiceClient, String), Diagnostic> {
        let config = &self.provider_data.as_ref().ok_or_else(not_configured)?.config;
        let region = config.get_region(state);
        let client = config
            .service_client("apig", &region)
            .await
            .map_err(|e| api_error("Failed to create APIG client", e))?;
        Ok((client, region))
    }

    fn request(config: &DynamicValue) -> EnvironmentRequest {
        let description = get_str(config, "description");
        EnvironmentRequest {
            name: get_str(config, "name"),
            description: (!description.is_empty()).then_some(description),
        }
    }

    /// Find the environment recorded in `state`. The name narrows the list
    /// query; after an import only the id is known and every environment
    /// is scanned.
    async fn fetch(
        client: &ServiceClient,
        state: &DynamicValue,
    ) -> Result<EnvironmentResponse, ApiError> {
        let api = client.apig().instance(&get_str(state, "instance_id")).envs();
        let id = get_str(state, "id");
        let name = get_str(state, "name");
        if !name.is_empty() {
            return api.get(&id, &name).await;
        }
        api.list(None)
            .await?
            .into_iter()
            .find(|env| env.id == id)
            .ok_or_else(|| ApiError::not_found(format!("environment {} not found", id)))
    }

    fn apply(mut state: DynamicValue, region: String, env: EnvironmentResponse) -> DynamicValue {
        let _ = state.set_string(&AttributePath::new("id"), env.id);
        let _ = state.set_string(&AttributePath::new("region"), region);
        let _ = state.set_string(&AttributePath::new("name"), env.name);
        set_opt_str(&mut state, "description", &env.description.unwrap_or_default());
        let _ = state.set_string(
            &AttributePath::new("created_at"),
            format_rfc3339(&env.create_time.unwrap_or_default()),
        );
        state
    }
}

#[async_trait]
impl Resource for ApigEnvironmentResource {
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
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages an environment of an APIG dedicated instance")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The environment name")
                    .required()
                    .validator(StringLengthBetween { min: 3, max: 64 })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .validator(StringLengthBetween { min: 0, max: 255 })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::String)
                    .description("The time when the environment was created")
                    .computed()
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

        let new_state = match self.client(&request.planned_state).await {
            Ok((client, region)) => {
                let instance_id = get_str(&request.planned_state, "instance_id");
                let api = client.apig().instance(&instance_id).envs();
                match api.create(&Self::request(&request.config)).await {
                    Ok(env) => {
                        tracing::info!("Created APIG environment {} ({})", env.name, env.id);
                        Self::apply(request.planned_state, region, env)
                    }
                    Err(e) => {
                        diagnostics.push(api_error("Failed to create environment", e));
                        DynamicValue::null()
                    }
                }
            }
            Err(diag) => {
                diagnostics.push(diag);
                DynamicValue::null()
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
            Ok((client, region)) => match Self::fetch(&client, &request.current_state).await {
                Ok(env) => Some(Self::apply(request.current_state, region, env)),
                Err(e) => {
                    let id = get_str(&request.current_state, "id");
                    match check_deleted(&e, "environment", &id) {
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

        let new_state = match self.client(&request.prior_state).await {
            Ok((client, region)) => {
                let instance_id = get_str(&request.prior_state, "instance_id");
                let id = get_str(&request.prior_state, "id");
                let api = client.apig().instance(&instance_id).envs();
                match api.update(&id, &Self::request(&request.config)).await {
                    Ok(env) => Self::apply(request.planned_state, region, env),
                    Err(e) => {
                        diagnostics.push(api_error("Failed to update environment", e));
                        request.prior_state
                    }
                }
            }
            Err(diag) => {
                diagnostics.push(diag);
                request.prior_state
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

        match self.client(&request.prior_state).await {
            Ok((client, _)) => {
                let instance_id = get_str(&request.prior_state, "instance_id");
                let id = get_str(&request.prior_state, "id");
                match client.apig().instance(&instance_id).envs().delete(&id).await {
                    Ok(()) => tracing::info!("Deleted APIG environment {}", id),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => diagnostics.push(api_error(
                        format!("Failed to delete environment ({})", id),
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
impl ResourceWithConfigure for ApigEnvironmentResource {
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
impl ResourceWithImportState for ApigEnvironmentResource {
    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut diagnostics = vec![];
        let mut imported_resources = vec![];

        match tfplug::parse_import_id(&request.id, &["instance_id", "id"]) {
            Ok(parts) => {
                let mut state = DynamicValue::object();
                let _ = state.set_string(&AttributePath::new("instance_id"), parts[0].clone());
                let _ = state.set_string(&AttributePath::new("id"), parts[1].clone());
                imported_resources.push(ImportedResource {
                    type_name: request.type_name,
                    state,
                    private: vec![],
                });
            }
            Err(diag) => diagnostics.push(diag),
        }

        ImportResourceStateResponse {
            imported_resources,
            diagnostics,
            deferred: None,
        }
    }
}
