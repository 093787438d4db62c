//! APIG load balance (VPC) channel with its member groups, backend members,
//! health check and microservice configuration

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
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
use tfplug::validator::NumberBetween;

use crate::api::body::{remove_nil, value_ignore_empty};
use crate::api::{pathsearch, ApiError, ServiceClient};
use crate::resources::common::{
    api_error, attr_bool, attr_i64, attr_list, attr_single, attr_str, check_deleted,
    format_rfc3339, get_i64, get_list, get_str, id_attribute, not_configured, object,
    provider_data_from, region_attribute,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_apig_channel";

/// Channel blocks are optional but filled in by the service. They are only
/// written back when configured, or when nothing is known yet (import).
const SERVER_FILLED_BLOCKS: [&str; 4] = ["member_group", "member", "health_check", "microservice"];

#[derive(Default)]
pub struct ApigChannelResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

fn optional_computed(name: &str, type_: AttributeType) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, type_).optional().computed().build()
}

fn required(name: &str, type_: AttributeType) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, type_).required().build()
}

/// Integer as JSON, null when zero so that `remove_nil` omits it
fn non_zero(value: i64) -> Value {
    value_ignore_empty(json!(value))
}

fn non_empty(value: String) -> Value {
    value_ignore_empty(Value::String(value))
}

impl ApigChannelResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn member_group_block() -> NestedBlock {
        NestedBlockBuilder::new("member_group")
            .set()
            .description("The backend server groups of the channel")
            .attribute(required("name", AttributeType::String))
            .attribute(optional_computed("description", AttributeType::String))
            .attribute(optional_computed("weight", AttributeType::Number))
            .attribute(optional_computed("microservice_version", AttributeType::String))
            .attribute(optional_computed("microservice_port", AttributeType::Number))
            .attribute(optional_computed(
                "microservice_labels",
                AttributeType::map(AttributeType::String),
            ))
            .attribute(optional_computed("reference_vpc_channel_id", AttributeType::String))
            .build()
    }

    fn member_block() -> NestedBlock {
        NestedBlockBuilder::new("member")
            .set()
            .description("The backend servers of the channel")
            .attribute(optional_computed("host", AttributeType::String))
            .attribute(optional_computed("id", AttributeType::String))
            .attribute(optional_computed("name", AttributeType::String))
            .attribute(optional_computed("weight", AttributeType::Number))
            .attribute(optional_computed("is_backup", AttributeType::Bool))
            .attribute(optional_computed("group_name", AttributeType::String))
            .attribute(optional_computed("status", AttributeType::Number))
            .attribute(optional_computed("port", AttributeType::Number))
            .build()
    }

    fn health_check_block() -> NestedBlock {
        NestedBlockBuilder::new("health_check")
            .max_items(1)
            .description("Health check of the backend servers")
            .attribute(required("protocol", AttributeType::String))
            .attribute(required("threshold_normal", AttributeType::Number))
            .attribute(required("threshold_abnormal", AttributeType::Number))
            .attribute(required("interval", AttributeType::Number))
            .attribute(required("timeout", AttributeType::Number))
            .attribute(optional_computed("path", AttributeType::String))
            .attribute(optional_computed("method", AttributeType::String))
            .attribute(optional_computed("port", AttributeType::Number))
            .attribute(optional_computed("http_codes", AttributeType::String))
            .attribute(optional_computed("enable_client_ssl", AttributeType::Bool))
            .attribute(optional_computed("status", AttributeType::Number))
            .build()
    }

    fn microservice_block() -> NestedBlock {
        NestedBlockBuilder::new("microservice")
            .max_items(1)
            .description("The microservice backing the channel, CCE or CSE")
            .block(
                NestedBlockBuilder::new("cce_config")
                    .max_items(1)
                    .attribute(required("cluster_id", AttributeType::String))
                    .attribute(required("namespace", AttributeType::String))
                    .attribute(required("workload_type", AttributeType::String))
                    .attribute(
                        AttributeBuilder::new("workload_name", AttributeType::String)
                            .optional()
                            .deprecated()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("label_key", AttributeType::String)
                            .optional()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("label_value", AttributeType::String)
                            .optional()
                            .build(),
                    )
                    .build(),
            )
            .block(
                NestedBlockBuilder::new("cse_config")
                    .max_items(1)
                    .attribute(required("engine_id", AttributeType::String))
                    .attribute(required("service_id", AttributeType::String))
                    .build(),
            )
            .build()
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

    fn build_member_groups(groups: &[Dynamic]) -> Value {
        Value::Array(
            groups
                .iter()
                .map(|group| {
                    let labels: Vec<Value> = group
                        .attr("microservice_labels")
                        .as_map()
                        .map(|labels| {
                            labels
                                .iter()
                                .map(|(k, v)| {
                                    json!({"label_name": k, "label_value": v.as_str().unwrap_or_default()})
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    json!({
                        "member_group_name": attr_str(group, "name"),
                        "member_group_remark": non_empty(attr_str(group, "description")),
                        "member_group_weight": non_zero(attr_i64(group, "weight")),
                        "microservice_version": non_empty(attr_str(group, "microservice_version")),
                        "microservice_port": non_zero(attr_i64(group, "microservice_port")),
                        "microservice_labels": labels,
                        "reference_vpc_channel_id": non_empty(attr_str(group, "reference_vpc_channel_id")),
                    })
                })
                .collect(),
        )
    }

    fn build_members(members: &[Dynamic]) -> Value {
        Value::Array(
            members
                .iter()
                .map(|member| {
                    json!({
                        "host": non_empty(attr_str(member, "host")),
                        "ecs_id": non_empty(attr_str(member, "id")),
                        "ecs_name": non_empty(attr_str(member, "name")),
                        "weight": attr_i64(member, "weight"),
                        "is_backup": attr_bool(member, "is_backup"),
                        "member_group_name": non_empty(attr_str(member, "group_name")),
                        "status": non_zero(attr_i64(member, "status")),
                        "port": attr_i64(member, "port"),
                    })
                })
                .collect(),
        )
    }

    /// An unset protocol means the block was never configured and must not
    /// be sent
    fn build_health_check(config: &Dynamic) -> Value {
        let protocol = attr_str(config, "protocol");
        if protocol.is_empty() {
            return Value::Null;
        }
        json!({
            "protocol": protocol,
            "threshold_normal": attr_i64(config, "threshold_normal"),
            "threshold_abnormal": attr_i64(config, "threshold_abnormal"),
            "time_interval": attr_i64(config, "interval"),
            "timeout": attr_i64(config, "timeout"),
            "path": non_empty(attr_str(config, "path")),
            "method": non_empty(attr_str(config, "method")),
            "port": non_zero(attr_i64(config, "port")),
            "http_code": non_empty(attr_str(config, "http_codes")),
            "enable_client_ssl": attr_bool(config, "enable_client_ssl"),
            "status": non_zero(attr_i64(config, "status")),
        })
    }

    fn build_microservice(config: &Dynamic) -> Value {
        let cce = attr_single(config, "cce_config");
        if !cce.is_null() {
            tracing::debug!("CCE microservice configuration: {:?}", cce);
            return json!({
                "service_type": "CCE",
                "cce_info": {
                    "cluster_id": attr_str(&cce, "cluster_id"),
                    "namespace": attr_str(&cce, "namespace"),
                    "workload_type": attr_str(&cce, "workload_type"),
                    "app_name": non_empty(attr_str(&cce, "workload_name")),
                    "label_key": non_empty(attr_str(&cce, "label_key")),
                    "label_value": non_empty(attr_str(&cce, "label_value")),
                },
            });
        }
        let cse = attr_single(config, "cse_config");
        if !cse.is_null() {
            tracing::debug!("CSE microservice configuration: {:?}", cse);
            return json!({
                "service_type": "CSE",
                "cse_info": {
                    "engine_id": attr_str(&cse, "engine_id"),
                    "service_id": attr_str(&cse, "service_id"),
                },
            });
        }
        Value::Null
    }

    /// Create and update share one body; the service replaces the channel
    pub(crate) fn build_body(config: &DynamicValue) -> Value {
        let root = &config.value;
        let mut body = json!({
            "name": get_str(config, "name"),
            "port": get_i64(config, "port"),
            "balance_strategy": get_i64(config, "balance_strategy"),
            "member_type": non_empty(get_str(config, "member_type")),
            "member_groups": Self::build_member_groups(&get_list(config, "member_group")),
            "members": Self::build_members(&get_list(config, "member")),
            "vpc_health_config": Self::build_health_check(&attr_single(root, "health_check")),
            "microservice_info": Self::build_microservice(&attr_single(root, "microservice")),
        });

        // numeric types go to `type`, named ones to `vpc_channel_type`
        let channel_type = get_str(config, "type");
        match channel_type.as_str() {
            "2" => body["type"] = json!(2),
            "3" => body["type"] = json!(3),
            "" => {}
            _ => body["vpc_channel_type"] = Value::String(channel_type),
        }

        remove_nil(body)
    }

    fn flatten_member_groups(channel: &Value) -> Vec<Dynamic> {
        pathsearch::search_array("member_groups", channel)
            .iter()
            .map(|group| {
                let labels: HashMap<String, Dynamic> = pathsearch::search_array("microservice_labels", group)
                    .iter()
                    .filter_map(|label| {
                        Some((
                            pathsearch::search_string("label_name", label)?,
                            Dynamic::from(pathsearch::search_string("label_value", label).unwrap_or_default()),
                        ))
                    })
                    .collect();
                object([
                    ("name", Dynamic::from(pathsearch::search_string("member_group_name", group))),
                    (
                        "description",
                        Dynamic::from(pathsearch::search_string("member_group_remark", group).unwrap_or_default()),
                    ),
                    (
                        "weight",
                        Dynamic::from(pathsearch::search_i64("member_group_weight", group).unwrap_or_default()),
                    ),
                    (
                        "microservice_version",
                        Dynamic::from(pathsearch::search_string("microservice_version", group).unwrap_or_default()),
                    ),
                    (
                        "microservice_port",
                        Dynamic::from(pathsearch::search_i64("microservice_port", group).unwrap_or_default()),
                    ),
                    ("microservice_labels", Dynamic::Map(labels)),
                    (
                        "reference_vpc_channel_id",
                        Dynamic::from(pathsearch::search_string("reference_vpc_channel_id", group).unwrap_or_default()),
                    ),
                ])
            })
            .collect()
    }

    fn flatten_members(channel: &Value) -> Vec<Dynamic> {
        let text = |expr: &str, member: &Value| {
            Dynamic::from(pathsearch::search_string(expr, member).unwrap_or_default())
        };
        let number = |expr: &str, member: &Value| {
            Dynamic::from(pathsearch::search_i64(expr, member).unwrap_or_default())
        };
        pathsearch::search_array("members", channel)
            .iter()
            .map(|member| {
                object([
                    ("host", text("host", member)),
                    ("id", text("ecs_id", member)),
                    ("name", text("ecs_name", member)),
                    ("weight", number("weight", member)),
                    (
                        "is_backup",
                        Dynamic::from(pathsearch::search_bool("is_backup", member).unwrap_or_default()),
                    ),
                    ("group_name", text("member_group_name", member)),
                    ("status", number("status", member)),
                    ("port", number("port", member)),
                ])
            })
            .collect()
    }

    fn flatten_health_check(channel: &Value) -> Vec<Dynamic> {
        let health = pathsearch::search("vpc_health_config", channel);
        if !health.is_object() {
            return vec![];
        }
        let number = |expr: &str| Dynamic::from(pathsearch::search_i64(expr, &health).unwrap_or_default());
        let text = |expr: &str| Dynamic::from(pathsearch::search_string(expr, &health).unwrap_or_default());
        vec![object([
            (
                "protocol",
                Dynamic::from(
                    pathsearch::search_string("protocol", &health)
                        .unwrap_or_default()
                        .to_uppercase(),
                ),
            ),
            ("threshold_normal", number("threshold_normal")),
            ("threshold_abnormal", number("threshold_abnormal")),
            ("interval", number("time_interval")),
            ("timeout", number("timeout")),
            ("path", text("path")),
            ("method", text("method")),
            ("port", number("port")),
            ("http_codes", text("http_code")),
            (
                "enable_client_ssl",
                Dynamic::from(pathsearch::search_bool("enable_client_ssl", &health).unwrap_or_default()),
            ),
            ("status", number("status")),
        ])]
    }

    fn flatten_microservice(channel: &Value) -> Vec<Dynamic> {
        let info = pathsearch::search("microservice_info", channel);
        let service_type = pathsearch::search_string("service_type", &info).unwrap_or_default();
        let text = |expr: &str| Dynamic::from(pathsearch::search_string(expr, &info).unwrap_or_default());
        match service_type.as_str() {
            "CCE" => vec![object([
                (
                    "cce_config",
                    Dynamic::List(vec![object([
                        ("cluster_id", text("cce_info.cluster_id")),
                        ("namespace", text("cce_info.namespace")),
                        ("workload_type", text("cce_info.workload_type")),
                        ("workload_name", text("cce_info.app_name")),
                        ("label_key", text("cce_info.label_key")),
                        ("label_value", text("cce_info.label_value")),
                    ])]),
                ),
                ("cse_config", Dynamic::List(vec![])),
            ])],
            "CSE" => vec![object([
                ("cce_config", Dynamic::List(vec![])),
                (
                    "cse_config",
                    Dynamic::List(vec![object([
                        ("engine_id", text("cse_info.engine_id")),
                        ("service_id", text("cse_info.service_id")),
                    ])]),
                ),
            ])],
            _ => vec![],
        }
    }

    /// `type` reads back as the named channel type when the service reports
    /// one. Numeric 2 and 3 are the legacy spellings of builtin and
    /// microservice, so a configured number is kept when they agree.
    fn channel_type(channel: &Value, current: &str) -> String {
        let named = pathsearch::search_string("vpc_channel_type", channel).unwrap_or_default();
        if named.is_empty() {
            return pathsearch::search_i64("type", channel)
                .unwrap_or_default()
                .to_string();
        }
        match (current, named.as_str()) {
            ("2", "builtin") | ("3", "microservice") => current.to_string(),
            _ => named,
        }
    }

    async fn read_state(
        client: &ServiceClient,
        region: String,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let instance_id = get_str(&state, "instance_id");
        let id = get_str(&state, "id");
        let channel = client.apig().instance(&instance_id).channels().get(&id).await?;

        let imported = get_str(&state, "name").is_empty();
        let channel_type = Self::channel_type(&channel, &get_str(&state, "type"));

        let _ = state.set_string(&AttributePath::new("region"), region);
        let _ = state.set_string(
            &AttributePath::new("name"),
            pathsearch::search_string("name", &channel).unwrap_or_default(),
        );
        for field in ["port", "balance_strategy", "status"] {
            let _ = state.set(
                &AttributePath::new(field),
                pathsearch::search_i64(field, &channel).unwrap_or_default(),
            );
        }
        let _ = state.set_string(
            &AttributePath::new("member_type"),
            pathsearch::search_string("member_type", &channel).unwrap_or_default(),
        );
        let _ = state.set_string(&AttributePath::new("type"), channel_type);
        let _ = state.set_string(
            &AttributePath::new("created_at"),
            format_rfc3339(&pathsearch::search_string("create_time", &channel).unwrap_or_default()),
        );

        let flattened = [
            Self::flatten_member_groups(&channel),
            Self::flatten_members(&channel),
            Self::flatten_health_check(&channel),
            Self::flatten_microservice(&channel),
        ];
        for (name, items) in SERVER_FILLED_BLOCKS.iter().zip(flattened) {
            if imported || !attr_list(&state.value, name).is_empty() {
                let _ = state.set_list(&AttributePath::new(name), items);
            }
        }

        Ok(state)
    }
}

#[async_trait]
impl Resource for ApigChannelResource {
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
            .description("Manages a load balance channel of an APIG dedicated instance")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .description("The ID of the dedicated instance the channel belongs to")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("The channel name")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("port", AttributeType::Number)
                    .description("The default port for health check in channel")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("balance_strategy", AttributeType::Number)
                    .description("The distribution algorithm: 1 WRR, 2 WLC, 3 SH, 4 URI hashing")
                    .required()
                    .validator(NumberBetween { min: 1.0, max: 4.0 })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("member_type", AttributeType::String)
                    .description("The member type of the channel, ecs or ip")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("The channel type, builtin or microservice")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("created_at", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::Number)
                    .description("The current status of the channel")
                    .computed()
                    .build(),
            )
            .block(Self::member_group_block())
            .block(Self::member_block())
            .block(Self::health_check_block())
            .block(Self::microservice_block())
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
        if let Some(microservice) = attr_list(&request.config.value, "microservice").first() {
            let cce = attr_list(microservice, "cce_config").len();
            let cse = attr_list(microservice, "cse_config").len();
            if cce + cse != 1 {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid microservice configuration",
                        "Exactly one of cce_config or cse_config must be specified",
                    )
                    .with_attribute(AttributePath::new("microservice")),
                );
            }
        }
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let mut diagnostics = vec![];

        let (client, region) = match self.client(&request.planned_state).await {
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
        let created = client
            .apig()
            .instance(&instance_id)
            .channels()
            .create(Self::build_body(&request.config))
            .await;
        let id = match created {
            Ok(channel) => pathsearch::search_string("id", &channel).unwrap_or_default(),
            Err(e) => {
                diagnostics.push(api_error("Failed to create channel", e));
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics,
                };
            }
        };
        tracing::info!("Created APIG channel {}", id);

        let mut state = request.planned_state;
        let _ = state.set_string(&AttributePath::new("id"), id);
        let new_state = match Self::read_state(&client, region, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read channel", e));
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
            Ok((client, region)) => {
                match Self::read_state(&client, region, request.current_state.clone()).await {
                    Ok(state) => Some(state),
                    Err(e) => {
                        let id = get_str(&request.current_state, "id");
                        match check_deleted(&e, "channel", &id) {
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
        if let Err(e) = client
            .apig()
            .instance(&instance_id)
            .channels()
            .update(&id, Self::build_body(&request.config))
            .await
        {
            diagnostics.push(api_error(format!("Failed to update channel ({})", id), e));
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics,
            };
        }

        let new_state = match Self::read_state(&client, region, request.planned_state.clone()).await {
            Ok(state) => state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read channel", e));
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

        match self.client(&request.prior_state).await {
            Ok((client, _)) => {
                let instance_id = get_str(&request.prior_state, "instance_id");
                let id = get_str(&request.prior_state, "id");
                if let Err(e) = client.apig().instance(&instance_id).channels().delete(&id).await {
                    if !e.is_not_found() {
                        diagnostics
                            .push(api_error(format!("Failed to delete channel ({})", id), e));
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
impl ResourceWithConfigure for ApigChannelResource {
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
impl ResourceWithImportState for ApigChannelResource {
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

#[cfg(test)]
#[path = "./resource_channel_test.rs"]
mod resource_channel_test;
