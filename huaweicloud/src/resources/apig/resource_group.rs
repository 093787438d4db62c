//! APIG API group resource

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

use crate::api::apig::{ApiGroupRequest, ApiGroupResponse};
use crate::api::ServiceClient;
use crate::resources::common::{
    api_error, check_deleted, format_rfc3339, get_str, id_attribute, not_configured,
    provider_data_from, region_attribute, set_opt_str,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_apig_group";

#[derive(Default)]
pub struct ApigGroupResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

impl ApigGroupResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self, state: &DynamicValue) -> Result<(ServiceClient, String), Diagnostic> {
        let provider_data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let config = &provider_data.config;
        let region = config.get_region(state);
        let client = config
            .service_client("apig", &region)
            .await
            .map_err(|e| api_error("Failed to create APIG client", e))?;
        Ok((client, region))
    }

    fn build_request(config: &DynamicValue) -> ApiGroupRequest {
        let description = get_str(config, "description");
        ApiGroupRequest {
            name: get_str(config, "name"),
            description: (!description.is_empty()).then_some(description),
        }
    }

    fn apply(state: &mut DynamicValue, region: String, group: ApiGroupResponse) {
        let _ = state.set_string(&AttributePath::new("id"), group.id);
        let _ = state.set_string(&AttributePath::new("region"), region);
        let _ = state.set_string(&AttributePath::new("name"), group.name);
        set_opt_str(state, "description", &group.description.unwrap_or_default());
        let _ = state.set_string(
            &AttributePath::new("registration_time"),
            format_rfc3339(&group.register_time.unwrap_or_default()),
        );
        let _ = state.set_string(
            &AttributePath::new("updated_at"),
            format_rfc3339(&group.update_time.unwrap_or_default()),
        );
    }
}

#[async_trait]
impl Resource for ApigGroupResource {
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
            .description("Manages an API group of an APIG dedicated instance")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .description("The ID of the dedicated instance the group belongs to")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The group name")
                    .required()
                    .validator(StringLengthBetween { min: 3, max: 64 })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .description("The group description")
                    .optional()
                    .validator(StringLengthBetween { min: 0, max: 255 })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("registration_time", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("updated_at", AttributeType::String)
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
        let mut new_state = DynamicValue::null();

        match self.client(&request.planned_state).await {
            Ok((client, region)) => {
                let instance_id = get_str(&request.planned_state, "instance_id");
                match client
                    .apig()
                    .instance(&instance_id)
                    .groups()
                    .create(&Self::build_request(&request.config))
                    .await
                {
                    Ok(group) => {
                        tracing::info!("Created APIG group {}", group.id);
                        let mut state = request.planned_state;
                        Self::apply(&mut state, region, group);
                        new_state = state;
                    }
                    Err(e) => diagnostics.push(api_error("Failed to create API group", e)),
                }
            }
            Err(diag) => diagnostics.push(diag),
        }

        CreateResourceResponse {
            new_state,
            private: vec![],
            diagnostics,
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let mut diagnostics = vec![];

        let (client, region) = match self.client(&request.current_state).await {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return ReadResourceResponse {
                    new_state: Some(request.current_state),
                    diagnostics,
                    private: request.private,
                    deferred: None,
                };
            }
        };

        let instance_id = get_str(&request.current_state, "instance_id");
        let id = get_str(&request.current_state, "id");
        let new_state = match client.apig().instance(&instance_id).groups().get(&id).await {
            Ok(group) => {
                let mut state = request.current_state;
                Self::apply(&mut state, region, group);
                Some(state)
            }
            Err(e) => match check_deleted(&e, "API group", &id) {
                Some(diag) => {
                    diagnostics.push(diag);
                    Some(request.current_state)
                }
                None => None,
            },
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

        let (client, region) = match self.client(&request.prior_state).await {
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

        let instance_id = get_str(&request.prior_state, "instance_id");
        let id = get_str(&request.prior_state, "id");
        match client
            .apig()
            .instance(&instance_id)
            .groups()
            .update(&id, &Self::build_request(&request.config))
            .await
        {
            Ok(group) => {
                let mut state = request.planned_state;
                Self::apply(&mut state, region, group);
                UpdateResourceResponse {
                    new_state: state,
                    private: vec![],
                    diagnostics,
                }
            }
            Err(e) => {
                diagnostics.push(api_error("Failed to update API group", e));
                UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                }
            }
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let mut diagnostics = vec![];

        match self.client(&request.prior_state).await {
            Ok((client, _)) => {
                let instance_id = get_str(&request.prior_state, "instance_id");
                let id = get_str(&request.prior_state, "id");
                if let Err(e) = client.apig().instance(&instance_id).groups().delete(&id).await {
                    if !e.is_not_found() {
                        diagnostics.push(api_error(format!("Failed to delete API group ({})", id), e));
                    }
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
impl ResourceWithConfigure for ApigGroupResource {
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
impl ResourceWithImportState for ApigGroupResource {
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

        match tfplug::parse_import_id(&request.id, &["instance_id", "id"]) {
            Ok(parts) => {
                let mut state = DynamicValue::object();
                let _ = state.set_string(&AttributePath::new("instance_id"), parts[0].clone());
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
