//! APIG request throttling policy, including its per-user and per-app
//! special throttles

use async_trait::async_trait;
use serde_json::{json, Value};
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
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOf;

use crate::api::{pathsearch, ApiError, ServiceClient};
use crate::resources::common::{
    api_error, attr_i64, attr_str, check_deleted, format_rfc3339, get_i64, get_list, get_str,
    has_changes, id_attribute, not_configured, object, provider_data_from, region_attribute,
    set_opt_i64, set_opt_list, set_opt_str,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_apig_throttling_policy";

const POLICY_TYPES: [(&str, i64); 2] = [("API-based", 1), ("API-shared", 2)];
const OBJECT_USER: &str = "USER";
const OBJECT_APP: &str = "APP";
const INCLUDES_SPECIAL_THROTTLES: i64 = 1;

#[derive(Default)]
pub struct ApigThrottlingPolicyResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

impl ApigThrottlingPolicyResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn special_throttles_block(name: &str, description: &str) -> NestedBlock {
        NestedBlockBuilder::new(name)
            .set()
            .max_items(30)
            .description(description)
            .attribute(
                AttributeBuilder::new("max_api_requests", AttributeType::Number)
                    .description("Maximum calls of an API by this object within the period")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("throttling_object_id", AttributeType::String)
                    .description("The ID of the user or app this throttle applies to")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("throttling_object_name", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The ID of the special throttle")
                    .computed()
                    .build(),
            )
            .build()
    }

    async fn client(&self, state: &DynamicValue) -> Result<ServiceClient, Diagnostic> {
        let provider_data = self.provider_data.as_ref().ok_or_else(not_configured)?;
        let config = &provider_data.config;
        config
            .service_client("apig", &config.get_region(state))
            .await
            .map_err(|e| api_error("Failed to create APIG client", e))
    }

    /// Request body from the planned state, which carries the schema
    /// defaults for `type` and `period_unit`
    fn build_body(planned: &DynamicValue) -> Value {
        let policy_type = get_str(planned, "type");
        let policy_type = POLICY_TYPES
            .iter()
            .find(|(name, _)| *name == policy_type)
            .map(|(_, code)| *code)
            .unwrap_or(1);

        json!({
            "name": get_str(planned, "name"),
            "time_interval": get_i64(planned, "period"),
            "time_unit": get_str(planned, "period_unit"),
            "api_call_limits": get_i64(planned, "max_api_requests"),
            "user_call_limits": get_i64(planned, "max_user_requests"),
            "app_call_limits": get_i64(planned, "max_app_requests"),
            "ip_call_limits": get_i64(planned, "max_ip_requests"),
            "remark": get_str(planned, "description"),
            "type": policy_type,
        })
    }

    async fn add_special_throttles(
        client: &ServiceClient,
        instance_id: &str,
        policy_id: &str,
        object_type: &str,
        items: &[Dynamic],
    ) -> Result<(), ApiError> {
        let api = client.apig().instance(instance_id).throttles();
        for item in items {
            api.create_special(
                policy_id,
                object_type,
                &attr_str(item, "throttling_object_id"),
                attr_i64(item, "max_api_requests"),
            )
            .await?;
        }
        Ok(())
    }

    /// Reconcile one special throttle set. Items whose object survives with a
    /// new limit are updated in place so they keep their id.
    async fn update_special_throttles(
        client: &ServiceClient,
        instance_id: &str,
        policy_id: &str,
        object_type: &str,
        old: &[Dynamic],
        new: &[Dynamic],
    ) -> Result<(), ApiError> {
        let mut removed: Vec<&Dynamic> = old
            .iter()
            .filter(|o| !new.iter().any(|n| special_key(n) == special_key(o)))
            .collect();
        let mut added: Vec<&Dynamic> = new
            .iter()
            .filter(|n| !old.iter().any(|o| special_key(o) == special_key(n)))
            .collect();

        let api = client.apig().instance(instance_id).throttles();

        let mut i = 0;
        while i < removed.len() {
            let object_id = attr_str(removed[i], "throttling_object_id");
            match added
                .iter()
                .position(|a| attr_str(a, "throttling_object_id") == object_id)
            {
                Some(j) => {
                    api.update_special(
                        policy_id,
                        &attr_str(removed[i], "id"),
                        attr_i64(added[j], "max_api_requests"),
                    )
                    .await?;
                    removed.remove(i);
                    added.remove(j);
                }
                None => i += 1,
            }
        }

        for item in removed {
            api.delete_special(policy_id, &attr_str(item, "id")).await?;
        }
        let added: Vec<Dynamic> = added.into_iter().cloned().collect();
        Self::add_special_throttles(client, instance_id, policy_id, object_type, &added).await
    }

    /// Refresh `state` from the remote policy
    async fn read_state(
        &self,
        client: &ServiceClient,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let instance_id = get_str(&state, "instance_id");
        let id = get_str(&state, "id");
        let api = client.apig().instance(&instance_id).throttles();
        let policy = api.get(&id).await?;

        let region = match &self.provider_data {
            Some(data) => data.config.get_region(&state),
            None => String::new(),
        };
        let policy_type = pathsearch::search_i64("type", &policy).unwrap_or_default();

        let _ = state.set_string(&AttributePath::new("region"), region);
        let _ = state.set_string(
            &AttributePath::new("name"),
            pathsearch::search_string("name", &policy).unwrap_or_default(),
        );
        if let Some((name, _)) = POLICY_TYPES.iter().find(|(_, code)| *code == policy_type) {
            let _ = state.set_string(&AttributePath::new("type"), name.to_string());
        }
        let _ = state.set(
            &AttributePath::new("period"),
            pathsearch::search_i64("time_interval", &policy).unwrap_or_default(),
        );
        let _ = state.set_string(
            &AttributePath::new("period_unit"),
            pathsearch::search_string("time_unit", &policy).unwrap_or_default(),
        );
        let _ = state.set(
            &AttributePath::new("max_api_requests"),
            pathsearch::search_i64("api_call_limits", &policy).unwrap_or_default(),
        );
        for (attr, field) in [
            ("max_user_requests", "user_call_limits"),
            ("max_app_requests", "app_call_limits"),
            ("max_ip_requests", "ip_call_limits"),
        ] {
            set_opt_i64(
                &mut state,
                attr,
                pathsearch::search_i64(field, &policy).unwrap_or_default(),
            );
        }
        set_opt_str(
            &mut state,
            "description",
            &pathsearch::search_string("remark", &policy).unwrap_or_default(),
        );
        let _ = state.set_string(
            &AttributePath::new("created_at"),
            format_rfc3339(&pathsearch::search_string("create_time", &policy).unwrap_or_default()),
        );

        let mut users = Vec::new();
        let mut apps = Vec::new();
        if pathsearch::search_i64("is_include_special_throttle", &policy)
            == Some(INCLUDES_SPECIAL_THROTTLES)
        {
            for special in api.list_specials(&id).await? {
                let item = object([
                    (
                        "max_api_requests",
                        Dynamic::from(pathsearch::search_i64("call_limits", &special).unwrap_or_default()),
                    ),
                    (
                        "throttling_object_id",
                        Dynamic::from(pathsearch::search_string("object_id", &special)),
                    ),
                    (
                        "throttling_object_name",
                        Dynamic::from(pathsearch::search_string("object_name", &special)),
                    ),
                    ("id", Dynamic::from(pathsearch::search_string("id", &special))),
                ]);
                match pathsearch::search_string("object_type", &special).as_deref() {
                    Some(OBJECT_USER) => users.push(item),
                    Some(OBJECT_APP) => apps.push(item),
                    other => {
                        return Err(ApiError::ParseError(format!(
                            "invalid special throttle object type {:?}, want '{}' or '{}'",
                            other, OBJECT_APP, OBJECT_USER
                        )))
                    }
                }
            }
        }
        set_opt_list(&mut state, "user_throttles", users);
        set_opt_list(&mut state, "app_throttles", apps);

        Ok(state)
    }
}

/// Set identity of a special throttle, ignoring its computed members
fn special_key(item: &Dynamic) -> (String, i64) {
    (
        attr_str(item, "throttling_object_id"),
        attr_i64(item, "max_api_requests"),
    )
}

#[async_trait]
impl Resource for ApigThrottlingPolicyResource {
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
            .description("Manages a request throttling policy of an APIG dedicated instance")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .description("The ID of the dedicated instance the policy belongs to")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The name of the throttling policy")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("period", AttributeType::Number)
                    .description("The period of time for limiting the number of API calls")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_api_requests", AttributeType::Number)
                    .description("Maximum number of times an API can be accessed within the period")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_app_requests", AttributeType::Number)
                    .description("Maximum number of times an app can access the API within the period")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_ip_requests", AttributeType::Number)
                    .description("Maximum number of times an IP address can access the API within the period")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_user_requests", AttributeType::Number)
                    .description("Maximum number of times a user can access the API within the period")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("The policy type, API-based or API-shared")
                    .optional()
                    .computed()
                    .default("API-based")
                    .validator(StringOneOf::new(POLICY_TYPES.iter().map(|(name, _)| *name)))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("period_unit", AttributeType::String)
                    .description("The time unit of the period")
                    .optional()
                    .computed()
                    .default("MINUTE")
                    .validator(StringOneOf::new(["SECOND", "MINUTE", "HOUR", "DAY"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::String)
                    .description("The creation time of the throttling policy")
                    .computed()
                    .build(),
            )
            .block(Self::special_throttles_block(
                "user_throttles",
                "Special throttles for IAM users",
            ))
            .block(Self::special_throttles_block(
                "app_throttles",
                "Special throttles for apps",
            ))
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

        let client = match self.client(&request.planned_state).await {
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

        let instance_id = get_str(&request.planned_state, "instance_id");
        let api = client.apig().instance(&instance_id).throttles();

        let created = match api.create(Self::build_body(&request.planned_state)).await {
            Ok(created) => created,
            Err(e) => {
                diagnostics.push(api_error("Failed to create throttling policy", e));
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics,
                };
            }
        };
        let id = pathsearch::search_string("id", &created).unwrap_or_default();
        tracing::info!("Created APIG throttling policy {}", id);

        let mut state = request.planned_state.clone();
        let _ = state.set_string(&AttributePath::new("id"), id.clone());

        for (attr, object_type) in [("user_throttles", OBJECT_USER), ("app_throttles", OBJECT_APP)] {
            let items = get_list(&request.planned_state, attr);
            if let Err(e) =
                Self::add_special_throttles(&client, &instance_id, &id, object_type, &items).await
            {
                diagnostics.push(api_error(
                    format!("Failed to create special {} throttles", object_type),
                    e,
                ));
                return CreateResourceResponse {
                    new_state: state,
                    private: vec![],
                    diagnostics,
                };
            }
        }

        let new_state = match self.read_state(&client, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read throttling policy", e));
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

        let client = match self.client(&request.current_state).await {
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

        let id = get_str(&request.current_state, "id");
        match self.read_state(&client, request.current_state.clone()).await {
            Ok(state) => ReadResourceResponse {
                new_state: Some(state),
                diagnostics,
                private: request.private,
                deferred: None,
            },
            Err(e) => {
                let new_state = match check_deleted(&e, "throttling policy", &id) {
                    Some(diag) => {
                        diagnostics.push(diag);
                        Some(request.current_state)
                    }
                    None => None,
                };
                ReadResourceResponse {
                    new_state,
                    diagnostics,
                    private: request.private,
                    deferred: None,
                }
            }
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let mut diagnostics = vec![];

        let client = match self.client(&request.prior_state).await {
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
        let (old, new) = (&request.prior_state, &request.planned_state);

        if has_changes(
            old,
            new,
            &[
                "name",
                "period",
                "period_unit",
                "max_api_requests",
                "max_user_requests",
                "max_app_requests",
                "max_ip_requests",
                "type",
                "description",
            ],
        ) {
            let api = client.apig().instance(&instance_id).throttles();
            if let Err(e) = api.update(&id, Self::build_body(&request.planned_state)).await {
                diagnostics.push(api_error("Failed to update throttling policy", e));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        }

        for (attr, object_type) in [("user_throttles", OBJECT_USER), ("app_throttles", OBJECT_APP)] {
            let (old_items, new_items) = (get_list(old, attr), get_list(new, attr));
            if old_items == new_items {
                continue;
            }
            if let Err(e) = Self::update_special_throttles(
                &client,
                &instance_id,
                &id,
                object_type,
                &old_items,
                &new_items,
            )
            .await
            {
                diagnostics.push(api_error(
                    format!("Failed to update special {} throttles", object_type),
                    e,
                ));
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics,
                };
            }
        }

        let new_state = match self.read_state(&client, request.planned_state.clone()).await {
            Ok(state) => state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read throttling policy", e));
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

        let client = match self.client(&request.prior_state).await {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        let instance_id = get_str(&request.prior_state, "instance_id");
        let id = get_str(&request.prior_state, "id");
        if let Err(e) = client.apig().instance(&instance_id).throttles().delete(&id).await {
            if !e.is_not_found() {
                diagnostics.push(api_error(
                    format!("Failed to delete throttling policy ({})", id),
                    e,
                ));
            }
        }

        DeleteResourceResponse { diagnostics }
    }

    fn import_handler(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ApigThrottlingPolicyResource {
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
impl ResourceWithImportState for ApigThrottlingPolicyResource {
    /// The policy id is not shown on the console, so import goes by
    /// `<instance_id>/<name>`
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

        let parts = match tfplug::parse_import_id(&request.id, &["instance_id", "name"]) {
            Ok(parts) => parts,
            Err(diag) => {
                response.diagnostics.push(diag);
                return response;
            }
        };

        let client = match self.client(&DynamicValue::object()).await {
            Ok(client) => client,
            Err(diag) => {
                response.diagnostics.push(diag);
                return response;
            }
        };

        match client
            .apig()
            .instance(&parts[0])
            .throttles()
            .find_by_name(&parts[1])
            .await
        {
            Ok(policy) => {
                let mut state = DynamicValue::object();
                let _ = state.set_string(
                    &AttributePath::new("id"),
                    pathsearch::search_string("id", &policy).unwrap_or_default(),
                );
                let _ = state.set_string(&AttributePath::new("instance_id"), parts[0].clone());
                response.imported_resources.push(ImportedResource {
                    type_name: request.type_name,
                    state,
                    private: vec![],
                });
            }
            Err(e) => response.diagnostics.push(api_error(
                format!("Unable to find the throttling policy ({})", parts[1]),
                e,
            )),
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{provider_data, value};
    use mockito::{Matcher, Server};
    use std::sync::Arc;
    use tfplug::types::ClientCapabilities;

    const POLICIES: &str = "/v2/p1/apigw/instances/inst-1/throttles";

    async fn configured(url: &str) -> ApigThrottlingPolicyResource {
        let mut resource = ApigThrottlingPolicyResource::new();
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new(provider_data(url))),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    fn planned() -> DynamicValue {
        value(json!({
            "id": null,
            "region": null,
            "instance_id": "inst-1",
            "name": "policy",
            "period": 10,
            "period_unit": "MINUTE",
            "max_api_requests": 100,
            "type": "API-shared",
            "user_throttles": [
                {"max_api_requests": 20, "throttling_object_id": "user-1", "throttling_object_name": null, "id": null}
            ]
        }))
    }

    fn policy_body() -> String {
        json!({
            "id": "tp-1",
            "name": "policy",
            "type": 2,
            "time_interval": 10,
            "time_unit": "MINUTE",
            "api_call_limits": 100,
            "user_call_limits": 0,
            "remark": "",
            "create_time": "2024-03-01T08:00:00Z",
            "is_include_special_throttle": 1
        })
        .to_string()
    }

    #[tokio::test]
    async fn schema_defaults_type_and_unit() {
        let resource = ApigThrottlingPolicyResource::new();
        let response = resource.schema(Context::new(), ResourceSchemaRequest).await;
        let attrs = &response.schema.block.attributes;
        assert!(attrs.iter().any(|a| a.name == "instance_id" && a.force_new));
        assert!(attrs.iter().any(|a| a.name == "type" && a.default.is_some()));
        assert!(response
            .schema
            .block
            .block_types
            .iter()
            .any(|b| b.type_name == "user_throttles" && b.max_items == 30));
    }

    #[tokio::test]
    async fn create_posts_policy_then_special_throttles() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", POLICIES)
            .match_body(Matcher::PartialJson(json!({
                "name": "policy", "type": 2, "time_interval": 10, "api_call_limits": 100
            })))
            .with_status(201)
            .with_body(r#"{"id": "tp-1"}"#)
            .create_async()
            .await;
        let special = server
            .mock("POST", format!("{}/tp-1/throttle-specials", POLICIES).as_str())
            .match_body(Matcher::Json(json!({
                "object_type": "USER", "object_id": "user-1", "call_limits": 20
            })))
            .with_status(201)
            .with_body(r#"{"id": "sp-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", format!("{}/tp-1", POLICIES).as_str())
            .with_status(200)
            .with_body(policy_body())
            .create_async()
            .await;
        server
            .mock("GET", format!("{}/tp-1/throttle-specials", POLICIES).as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"throttle_specials": [{
                    "id": "sp-1", "object_id": "user-1", "object_name": "alice",
                    "object_type": "USER", "call_limits": 20
                }]})
                .to_string(),
            )
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: planned(),
                    config: planned(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        create.assert_async().await;
        special.assert_async().await;

        let state = &response.new_state;
        assert_eq!(get_str(state, "id"), "tp-1");
        assert_eq!(get_str(state, "region"), "cn-north-4");
        assert_eq!(get_str(state, "type"), "API-shared");
        assert_eq!(get_str(state, "created_at"), "2024-03-01T08:00:00Z");
        assert!(state.get(&AttributePath::new("max_user_requests")).is_null());
        let users = get_list(state, "user_throttles");
        assert_eq!(attr_str(&users[0], "throttling_object_name"), "alice");
        assert_eq!(attr_str(&users[0], "id"), "sp-1");
    }

    #[tokio::test]
    async fn create_sends_defaults_left_out_of_config() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", POLICIES)
            .match_body(Matcher::PartialJson(json!({"type": 1, "time_unit": "MINUTE"})))
            .with_status(201)
            .with_body(r#"{"id": "tp-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", format!("{}/tp-1", POLICIES).as_str())
            .with_status(200)
            .with_body(
                json!({
                    "id": "tp-1", "name": "policy", "type": 1, "time_interval": 10,
                    "time_unit": "MINUTE", "api_call_limits": 100
                })
                .to_string(),
            )
            .create_async()
            .await;

        let config = value(json!({
            "id": null,
            "region": null,
            "instance_id": "inst-1",
            "name": "policy",
            "period": 10,
            "period_unit": null,
            "max_api_requests": 100,
            "type": null
        }));
        let mut planned = config.clone();
        planned
            .set_string(&AttributePath::new("period_unit"), "MINUTE".to_string())
            .unwrap();
        planned
            .set_string(&AttributePath::new("type"), "API-based".to_string())
            .unwrap();

        let resource = configured(&server.url()).await;
        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: planned,
                    config,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        create.assert_async().await;
        assert_eq!(get_str(&response.new_state, "period_unit"), "MINUTE");
        assert_eq!(get_str(&response.new_state, "type"), "API-based");
    }

    #[tokio::test]
    async fn update_changes_limit_in_place() {
        let mut server = Server::new_async().await;
        let update = server
            .mock("PUT", format!("{}/tp-1/throttle-specials/sp-1", POLICIES).as_str())
            .match_body(Matcher::Json(json!({"call_limits": 50})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        let recreate = server
            .mock("DELETE", Matcher::Regex(".*throttle-specials.*".to_string()))
            .expect(0)
            .create_async()
            .await;
        server
            .mock("GET", format!("{}/tp-1", POLICIES).as_str())
            .with_status(200)
            .with_body(policy_body())
            .create_async()
            .await;
        server
            .mock("GET", format!("{}/tp-1/throttle-specials", POLICIES).as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"throttle_specials": [{
                    "id": "sp-1", "object_id": "user-1", "object_name": "alice",
                    "object_type": "USER", "call_limits": 50
                }]})
                .to_string(),
            )
            .create_async()
            .await;

        let mut prior = planned();
        prior
            .set_list(
                &AttributePath::new("user_throttles"),
                vec![object([
                    ("max_api_requests", Dynamic::from(20i64)),
                    ("throttling_object_id", Dynamic::from("user-1")),
                    ("throttling_object_name", Dynamic::from("alice")),
                    ("id", Dynamic::from("sp-1")),
                ])],
            )
            .unwrap();
        prior.set_string(&AttributePath::new("id"), "tp-1".to_string()).unwrap();
        prior.set_string(&AttributePath::new("region"), "cn-north-4".to_string()).unwrap();

        let mut next = prior.clone();
        next.set_list(
            &AttributePath::new("user_throttles"),
            vec![object([
                ("max_api_requests", Dynamic::from(50i64)),
                ("throttling_object_id", Dynamic::from("user-1")),
                ("throttling_object_name", Dynamic::Unknown),
                ("id", Dynamic::Unknown),
            ])],
        )
        .unwrap();

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: prior,
                    planned_state: next.clone(),
                    config: next,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        update.assert_async().await;
        recreate.assert_async().await;
        let users = get_list(&response.new_state, "user_throttles");
        assert_eq!(attr_i64(&users[0], "max_api_requests"), 50);
    }

    #[tokio::test]
    async fn read_of_deleted_policy_drops_state() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", format!("{}/tp-1", POLICIES).as_str())
            .with_status(404)
            .with_body(r#"{"error_code": "APIG.3005", "error_msg": "throttle not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: value(json!({"id": "tp-1", "instance_id": "inst-1"})),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn import_looks_policy_up_by_name() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", POLICIES)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "policy".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"throttles": [{"id": "tp-1", "name": "policy"}]}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: "inst-1/policy".to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.imported_resources[0].state;
        assert_eq!(get_str(state, "id"), "tp-1");
        assert_eq!(get_str(state, "instance_id"), "inst-1");

        let bad = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: "inst-1".to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        assert_eq!(bad.diagnostics[0].summary, "Invalid import ID");
    }
}
