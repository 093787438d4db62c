//! APIG API: the frontend request definition, one default backend (mock,
//! FunctionGraph or web) and the backend policies that can take over from it

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
use tfplug::schema::{
    Attribute, AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, SchemaBuilder,
};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringOneOf;

use crate::api::body::{remove_nil, value_ignore_empty};
use crate::api::{pathsearch, ApiError, ServiceClient};
use crate::data_sources::data_source_apig_api::flatten_api;
use crate::resources::common::{
    api_error, attr_bool, attr_i64, attr_list, attr_single, attr_str, check_deleted, get_str,
    id_attribute, not_configured, provider_data_from, region_attribute,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_apig_api";

const API_TYPES: [(&str, i64); 2] = [("Public", 1), ("Private", 2)];
const MATCH_MODES: [(&str, &str); 2] = [("Prefix", "SWA"), ("Exact", "NORMAL")];
const CONDITION_TYPES: [(&str, &str); 3] =
    [("Equal", "exact"), ("Enumerated", "enum"), ("Matching", "pattern")];
const REQUEST_METHODS: [&str; 8] = ["GET", "POST", "PUT", "DELETE", "HEAD", "PATCH", "OPTIONS", "ANY"];
const PARAM_LOCATIONS: [&str; 3] = ["PATH", "HEADER", "QUERY"];

/// Default backend blocks with the backend type they select and the policy
/// block that goes with them
const BACKENDS: [(&str, &str, &str); 3] = [
    ("mock", "MOCK", "mock_policy"),
    ("func_graph", "FUNCTION", "func_graph_policy"),
    ("web", "HTTP", "web_policy"),
];

const ENABLED: i64 = 1;
const DISABLED: i64 = 2;

const AUTH_APP: &str = "APP";
const ORIGIN_REQUEST: &str = "REQUEST";
const ORIGIN_SYSTEM: &str = "SYSTEM";

/// System parameters the gateway resolves itself, sent as `$context.<name>`
const INTERNAL_PARAMS: [&str; 9] = [
    "sourceIp",
    "stage",
    "apiId",
    "appId",
    "requestId",
    "serverAddr",
    "serverName",
    "handleTime",
    "providerAppId",
];

/// Top-level optional attributes the service echoes back as empty values
const ECHOED_OPTIONALS: [&str; 7] = [
    "authorizer_id",
    "tags",
    "body_description",
    "description",
    "response_id",
    "success_response",
    "failure_response",
];

#[derive(Default)]
pub struct ApigApiResource {
    provider_data: Option<HuaweiCloudProviderData>,
}

fn optional(name: &str, type_: AttributeType) -> Attribute {
    AttributeBuilder::new(name, type_).optional().build()
}

fn optional_computed(name: &str, type_: AttributeType) -> Attribute {
    AttributeBuilder::new(name, type_).optional().computed().build()
}

fn required(name: &str, type_: AttributeType) -> Attribute {
    AttributeBuilder::new(name, type_).required().build()
}

fn one_of(name: &str, values: &[&str]) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .optional()
        .validator(StringOneOf::new(values.iter().copied()))
        .build()
}

fn defaulted(name: &str, value: impl Into<Dynamic>, type_: AttributeType) -> Attribute {
    AttributeBuilder::new(name, type_).default(value).build()
}

fn defaulted_one_of(name: &str, value: &str, values: &[&str]) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .default(value)
        .validator(StringOneOf::new(values.iter().copied()))
        .build()
}

fn replacing(mut attr: Attribute) -> Attribute {
    attr.force_new = true;
    attr
}

fn text(value: &Dynamic, name: &str) -> Value {
    value_ignore_empty(json!(attr_str(value, name)))
}

fn flag(enabled: bool) -> i64 {
    if enabled {
        ENABLED
    } else {
        DISABLED
    }
}

impl ApigApiResource {
    pub fn new() -> Self {
        Self::default()
    }

    fn request_params_block() -> NestedBlock {
        NestedBlockBuilder::new("request_params")
            .set()
            .max_items(50)
            .description("The frontend request parameters")
            .attribute(required("name", AttributeType::String))
            .attribute(optional_computed("required", AttributeType::Bool))
            .attribute(optional_computed("passthrough", AttributeType::Bool))
            .attribute(optional_computed("enumeration", AttributeType::String))
            .attribute(defaulted_one_of("location", "PATH", &PARAM_LOCATIONS))
            .attribute(defaulted_one_of("type", "STRING", &["STRING", "NUMBER"]))
            .attribute(optional_computed("maximum", AttributeType::Number))
            .attribute(optional_computed("minimum", AttributeType::Number))
            .attribute(optional_computed("example", AttributeType::String))
            .attribute(optional_computed("default", AttributeType::String))
            .attribute(optional_computed("description", AttributeType::String))
            .attribute(optional_computed("valid_enable", AttributeType::Number))
            .build()
    }

    fn backend_params_block(max_items: i64) -> NestedBlock {
        NestedBlockBuilder::new("backend_params")
            .set()
            .max_items(max_items)
            .description("Parameters passed to the backend")
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .required()
                    .validator(StringOneOf::new([ORIGIN_REQUEST, "CONSTANT", ORIGIN_SYSTEM]))
                    .build(),
            )
            .attribute(required("name", AttributeType::String))
            .attribute(
                AttributeBuilder::new("location", AttributeType::String)
                    .required()
                    .validator(StringOneOf::new(PARAM_LOCATIONS))
                    .build(),
            )
            .attribute(required("value", AttributeType::String))
            .attribute(optional("description", AttributeType::String))
            .attribute(one_of("system_param_type", &["internal", "frontend", "backend"]))
            .build()
    }

    fn conditions_block() -> NestedBlock {
        NestedBlockBuilder::new("conditions")
            .set()
            .min_items(1)
            .max_items(5)
            .description("When the policy applies")
            .attribute(required("value", AttributeType::String))
            .attribute(optional("param_name", AttributeType::String))
            .attribute(optional("sys_name", AttributeType::String))
            .attribute(optional("cookie_name", AttributeType::String))
            .attribute(optional("frontend_authorizer_name", AttributeType::String))
            .attribute(defaulted_one_of(
                "source",
                "param",
                &["param", "source", "system", "cookie", "frontend_authorizer"],
            ))
            .attribute(defaulted_one_of(
                "type",
                "Equal",
                &CONDITION_TYPES.map(|(name, _)| name),
            ))
            .build()
    }

    /// A changed default backend replaces the API
    fn mock_block() -> NestedBlock {
        NestedBlockBuilder::new("mock")
            .max_items(1)
            .description("The mock backend")
            .attribute(replacing(optional_computed("status_code", AttributeType::Number)))
            .attribute(replacing(optional("response", AttributeType::String)))
            .attribute(replacing(optional("authorizer_id", AttributeType::String)))
            .build()
    }

    fn func_graph_block() -> NestedBlock {
        NestedBlockBuilder::new("func_graph")
            .max_items(1)
            .description("The FunctionGraph backend")
            .attribute(replacing(required("function_urn", AttributeType::String)))
            .attribute(replacing(optional("version", AttributeType::String)))
            .attribute(replacing(optional("function_alias_urn", AttributeType::String)))
            .attribute(replacing(optional("network_type", AttributeType::String)))
            .attribute(replacing(optional("request_protocol", AttributeType::String)))
            .attribute(replacing(defaulted("timeout", 5000i64, AttributeType::Number)))
            .attribute(replacing(defaulted_one_of("invocation_type", "sync", &["async", "sync"])))
            .attribute(replacing(optional("authorizer_id", AttributeType::String)))
            .build()
    }

    fn web_block() -> NestedBlock {
        NestedBlockBuilder::new("web")
            .max_items(1)
            .description("The web (HTTP) backend")
            .attribute(replacing(required("path", AttributeType::String)))
            .attribute(replacing(optional("host_header", AttributeType::String)))
            .attribute(replacing(optional("vpc_channel_id", AttributeType::String)))
            .attribute(replacing(optional("backend_address", AttributeType::String)))
            .attribute(replacing(one_of("request_method", &REQUEST_METHODS)))
            .attribute(replacing(defaulted_one_of(
                "request_protocol",
                "HTTPS",
                &["HTTP", "HTTPS"],
            )))
            .attribute(replacing(defaulted("timeout", 5000i64, AttributeType::Number)))
            .attribute(replacing(defaulted("retry_count", -1i64, AttributeType::Number)))
            .attribute(replacing(defaulted("ssl_enable", false, AttributeType::Bool)))
            .attribute(replacing(optional("authorizer_id", AttributeType::String)))
            .build()
    }

    fn policy_block(name: &str, description: &str) -> NestedBlockBuilder {
        NestedBlockBuilder::new(name)
            .set()
            .max_items(5)
            .description(description)
            .attribute(required("name", AttributeType::String))
            .attribute(defaulted_one_of("effective_mode", "ANY", &["ALL", "ANY"]))
            .attribute(optional("authorizer_id", AttributeType::String))
            .block(Self::conditions_block())
            .block(Self::backend_params_block(0))
    }

    fn mock_policy_block() -> NestedBlock {
        Self::policy_block("mock_policy", "Mock backend policies")
            .attribute(optional_computed("status_code", AttributeType::Number))
            .attribute(optional("response", AttributeType::String))
            .build()
    }

    fn func_graph_policy_block() -> NestedBlock {
        Self::policy_block("func_graph_policy", "FunctionGraph backend policies")
            .attribute(required("function_urn", AttributeType::String))
            .attribute(optional("version", AttributeType::String))
            .attribute(optional("function_alias_urn", AttributeType::String))
            .attribute(optional("network_type", AttributeType::String))
            .attribute(optional("request_protocol", AttributeType::String))
            .attribute(defaulted_one_of("invocation_type", "sync", &["async", "sync"]))
            .attribute(defaulted("timeout", 5000i64, AttributeType::Number))
            .build()
    }

    fn web_policy_block() -> NestedBlock {
        Self::policy_block("web_policy", "Web backend policies")
            .attribute(required("path", AttributeType::String))
            .attribute(
                AttributeBuilder::new("request_method", AttributeType::String)
                    .required()
                    .validator(StringOneOf::new(REQUEST_METHODS))
                    .build(),
            )
            .attribute(optional("host_header", AttributeType::String))
            .attribute(optional("vpc_channel_id", AttributeType::String))
            .attribute(optional("backend_address", AttributeType::String))
            .attribute(one_of("request_protocol", &["HTTP", "HTTPS"]))
            .attribute(defaulted("timeout", 5000i64, AttributeType::Number))
            .attribute(defaulted("retry_count", -1i64, AttributeType::Number))
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
    /// defaults. Create and update send the same document.
    fn build_body(planned: &DynamicValue) -> Result<Value, String> {
        let root = &planned.value;

        let api_type = API_TYPES
            .iter()
            .find(|(name, _)| *name == attr_str(root, "type"))
            .map_or(2, |(_, code)| *code);
        let matching = attr_str(root, "matching");
        let match_mode = MATCH_MODES
            .iter()
            .find(|(name, _)| *name == matching)
            .map(|(_, mode)| *mode)
            .ok_or_else(|| format!("invalid match mode: '{}'", matching))?;

        let auth_type = attr_str(root, "security_authentication");
        let simple_auth = attr_bool(root, "simple_authentication");
        let auth_opt = if auth_type == AUTH_APP {
            json!({"app_code_auth_type": if simple_auth { "HEADER" } else { "DISABLE" }})
        } else if simple_auth {
            return Err(
                "the security authentication must be 'APP' if simple authentication is true"
                    .to_string(),
            );
        } else {
            Value::Null
        };

        let tags: Vec<String> = attr_list(root, "tags")
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect();

        let mut body = json!({
            "group_id": attr_str(root, "group_id"),
            "name": attr_str(root, "name"),
            "type": api_type,
            "req_protocol": attr_str(root, "request_protocol"),
            "req_method": attr_str(root, "request_method"),
            "req_uri": attr_str(root, "request_path"),
            "auth_type": auth_type,
            "auth_opt": auth_opt,
            "authorizer_id": text(root, "authorizer_id"),
            "cors": attr_bool(root, "cors"),
            "match_mode": match_mode,
            "remark": text(root, "description"),
            "body_remark": text(root, "body_description"),
            "result_normal_sample": text(root, "success_response"),
            "result_failure_sample": text(root, "failure_response"),
            "response_id": text(root, "response_id"),
            "tags": tags,
            "req_params": attr_list(root, "request_params")
                .iter()
                .map(build_request_param)
                .collect::<Vec<_>>(),
            "backend_params": build_backend_params(&attr_list(root, "backend_params"))?,
        });

        let backend = BACKENDS
            .iter()
            .find(|(block, _, _)| !attr_list(root, block).is_empty())
            .map_or(BACKENDS[2], |b| *b);
        body["backend_type"] = json!(backend.1);
        let default_backend = attr_single(root, backend.0);
        let policies = attr_list(root, backend.2);
        match backend.0 {
            "mock" => {
                body["mock_info"] = build_mock(&default_backend);
                body["policy_mocks"] = json!(policies
                    .iter()
                    .map(|p| build_policy(p, build_mock))
                    .collect::<Result<Vec<_>, _>>()?);
            }
            "func_graph" => {
                body["func_info"] = build_func_graph(&default_backend);
                body["policy_functions"] = json!(policies
                    .iter()
                    .map(|p| build_policy(p, build_func_graph))
                    .collect::<Result<Vec<_>, _>>()?);
            }
            _ => {
                body["backend_api"] = build_web(&default_backend);
                body["policy_https"] = json!(policies
                    .iter()
                    .map(|p| build_policy(p, build_web))
                    .collect::<Result<Vec<_>, _>>()?);
            }
        }

        Ok(remove_nil(body))
    }

    async fn read_state(
        &self,
        client: &ServiceClient,
        mut state: DynamicValue,
    ) -> Result<DynamicValue, ApiError> {
        let instance_id = get_str(&state, "instance_id");
        let api = client
            .apig()
            .instance(&instance_id)
            .apis()
            .get(&get_str(&state, "id"))
            .await?;

        let prior = state.clone();
        let region = match &self.provider_data {
            Some(data) => data.config.get_region(&state),
            None => String::new(),
        };
        let _ = state.set_string(&AttributePath::new("region"), region);
        flatten_api(&mut state, &api);

        for name in ECHOED_OPTIONALS {
            let path = AttributePath::new(name);
            if prior.get(&path).is_null() && state.get(&path).is_empty() {
                let _ = state.set(&path, Dynamic::Null);
            }
        }
        // two-way TLS is write-only
        if !attr_list(&state.value, "web").is_empty() {
            let ssl_enable = attr_bool(&attr_single(&prior.value, "web"), "ssl_enable");
            let _ = state.set(
                &AttributePath::new("web").index(0).attribute("ssl_enable"),
                ssl_enable,
            );
        }

        Ok(state)
    }
}

fn build_request_param(param: &Dynamic) -> Value {
    let (max_key, min_key) = match attr_str(param, "type").as_str() {
        "NUMBER" => ("max_num", "min_num"),
        _ => ("max_size", "min_size"),
    };
    let mut body = json!({
        "name": attr_str(param, "name"),
        "type": attr_str(param, "type"),
        "location": attr_str(param, "location"),
        "required": flag(attr_bool(param, "required")),
        "pass_through": flag(attr_bool(param, "passthrough")),
        "enumerations": text(param, "enumeration"),
        "default_value": text(param, "default"),
        "sample_value": text(param, "example"),
        "remark": text(param, "description"),
        "valid_enable": value_ignore_empty(json!(attr_i64(param, "valid_enable"))),
    });
    body[max_key] = value_ignore_empty(json!(attr_i64(param, "maximum")));
    body[min_key] = value_ignore_empty(json!(attr_i64(param, "minimum")));
    body
}

/// System values are written as `$context.authorizer.<kind>.<name>` for
/// authorizer parameters and `$context.<name>` for the gateway's own
fn backend_param_value(origin: &str, value: &str, system_type: &str) -> String {
    if origin != ORIGIN_SYSTEM {
        return value.to_string();
    }
    match system_type {
        "frontend" | "backend" => format!("$context.authorizer.{}.{}", system_type, value),
        _ if INTERNAL_PARAMS.contains(&value) => format!("$context.{}", value),
        _ => value.to_string(),
    }
}

fn build_backend_params(params: &[Dynamic]) -> Result<Vec<Value>, String> {
    params
        .iter()
        .map(|param| {
            let origin = attr_str(param, "type");
            let system_type = attr_str(param, "system_param_type");
            if origin == ORIGIN_SYSTEM && system_type.is_empty() {
                return Err("system_param_type must be set for SYSTEM backend parameters".to_string());
            }
            let description = if origin == ORIGIN_REQUEST {
                Value::Null
            } else {
                text(param, "description")
            };
            Ok(json!({
                "origin": origin,
                "name": attr_str(param, "name"),
                "location": attr_str(param, "location"),
                "value": backend_param_value(&origin, &attr_str(param, "value"), &system_type),
                "remark": description,
            }))
        })
        .collect()
}

fn build_conditions(policy: &Dynamic) -> Vec<Value> {
    attr_list(policy, "conditions")
        .iter()
        .map(|condition| {
            // unknown types are left out and rejected by the service
            let kind = attr_str(condition, "type");
            let condition_type = CONDITION_TYPES
                .iter()
                .find(|(name, _)| *name == kind)
                .map(|(_, wire)| json!(wire))
                .unwrap_or(Value::Null);
            json!({
                "req_param_name": text(condition, "param_name"),
                "sys_param_name": text(condition, "sys_name"),
                "cookie_param_name": text(condition, "cookie_name"),
                "frontend_authorizer_param_name": text(condition, "frontend_authorizer_name"),
                "condition_origin": attr_str(condition, "source"),
                "condition_value": attr_str(condition, "value"),
                "condition_type": condition_type,
            })
        })
        .collect()
}

fn build_mock(mock: &Dynamic) -> Value {
    if mock.is_null() {
        return Value::Null;
    }
    json!({
        "status_code": value_ignore_empty(json!(attr_i64(mock, "status_code"))),
        "result_content": text(mock, "response"),
        "authorizer_id": text(mock, "authorizer_id"),
    })
}

fn build_func_graph(func: &Dynamic) -> Value {
    if func.is_null() {
        return Value::Null;
    }
    json!({
        "function_urn": attr_str(func, "function_urn"),
        "alias_urn": text(func, "function_alias_urn"),
        "network_type": text(func, "network_type"),
        "req_protocol": text(func, "request_protocol"),
        "timeout": attr_i64(func, "timeout"),
        "invocation_type": attr_str(func, "invocation_type"),
        "version": text(func, "version"),
        "authorizer_id": text(func, "authorizer_id"),
    })
}

/// A VPC channel replaces the backend address
fn build_web(web: &Dynamic) -> Value {
    if web.is_null() {
        return Value::Null;
    }
    let vpc_channel_id = attr_str(web, "vpc_channel_id");
    let mut body = json!({
        "req_uri": attr_str(web, "path"),
        "req_method": text(web, "request_method"),
        "req_protocol": text(web, "request_protocol"),
        "timeout": attr_i64(web, "timeout"),
        "retry_count": attr_i64(web, "retry_count").to_string(),
        "authorizer_id": text(web, "authorizer_id"),
    });
    if web.attr("ssl_enable").as_bool().is_some() {
        body["enable_client_ssl"] = json!(attr_bool(web, "ssl_enable"));
    }
    if vpc_channel_id.is_empty() {
        body["vpc_channel_status"] = json!(DISABLED);
        body["url_domain"] = text(web, "backend_address");
    } else {
        body["vpc_channel_status"] = json!(ENABLED);
        body["vpc_channel_info"] = json!({
            "vpc_channel_id": vpc_channel_id,
            "vpc_channel_proxy_host": text(web, "host_header"),
        });
    }
    body
}

/// A policy is its backend document plus name, mode, conditions and
/// backend parameters
fn build_policy(policy: &Dynamic, backend: fn(&Dynamic) -> Value) -> Result<Value, String> {
    let mut body = backend(policy);
    body["name"] = json!(attr_str(policy, "name"));
    body["effect_mode"] = json!(attr_str(policy, "effective_mode"));
    body["authorizer_id"] = text(policy, "authorizer_id");
    body["conditions"] = json!(build_conditions(policy));
    body["backend_params"] = json!(build_backend_params(&attr_list(policy, "backend_params"))?);
    Ok(body)
}

#[async_trait]
impl Resource for ApigApiResource {
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
            .description("Manages an API of an APIG dedicated instance")
            .attribute(id_attribute())
            .attribute(region_attribute())
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .description("The ID of the dedicated instance the API belongs to")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("group_id", AttributeType::String)
                    .description("The ID of the API group")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("The API type, Public or Private")
                    .required()
                    .validator(StringOneOf::new(API_TYPES.map(|(name, _)| name)))
                    .build(),
            )
            .attribute(required("name", AttributeType::String))
            .attribute(
                AttributeBuilder::new("request_method", AttributeType::String)
                    .required()
                    .validator(StringOneOf::new(REQUEST_METHODS))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("request_path", AttributeType::String)
                    .description("The request address")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("request_protocol", AttributeType::String)
                    .required()
                    .validator(StringOneOf::new(["HTTP", "HTTPS", "BOTH", "GRPCS"]))
                    .build(),
            )
            .attribute(defaulted_one_of(
                "security_authentication",
                "NONE",
                &["NONE", AUTH_APP, "IAM", "AUTHORIZER"],
            ))
            .attribute(
                AttributeBuilder::new("simple_authentication", AttributeType::Bool)
                    .description("Whether AppCode authentication is enabled; needs APP authentication")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(optional("authorizer_id", AttributeType::String))
            .attribute(optional("tags", AttributeType::set(AttributeType::String)))
            .attribute(optional("body_description", AttributeType::String))
            .attribute(defaulted("cors", false, AttributeType::Bool))
            .attribute(optional("description", AttributeType::String))
            .attribute(defaulted_one_of(
                "matching",
                "Exact",
                &MATCH_MODES.map(|(name, _)| name),
            ))
            .attribute(optional("response_id", AttributeType::String))
            .attribute(optional("success_response", AttributeType::String))
            .attribute(optional("failure_response", AttributeType::String))
            .attribute(
                AttributeBuilder::new("registered_at", AttributeType::String)
                    .description("The registration time, in RFC3339 format")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("updated_at", AttributeType::String)
                    .description("The latest update time, in RFC3339 format")
                    .computed()
                    .build(),
            )
            .block(Self::request_params_block())
            .block(Self::backend_params_block(50))
            .block(Self::mock_block())
            .block(Self::func_graph_block())
            .block(Self::web_block())
            .block(Self::mock_policy_block())
            .block(Self::func_graph_policy_block())
            .block(Self::web_policy_block())
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

        let configured: Vec<&str> = BACKENDS
            .iter()
            .filter(|(block, _, _)| !attr_list(root, block).is_empty())
            .map(|(block, _, _)| *block)
            .collect();
        let pending = BACKENDS
            .iter()
            .any(|(block, _, _)| root.attr(block).is_unknown());
        if !pending && configured.len() != 1 {
            diagnostics.push(Diagnostic::error(
                "Invalid backend",
                "Exactly one of mock, func_graph or web must be specified",
            ));
        }
        for (block, _, policy) in BACKENDS {
            if !attr_list(root, policy).is_empty() && !configured.contains(&block) {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid backend policy",
                        format!("{} can only be used together with {}", policy, block),
                    )
                    .with_attribute(AttributePath::new(policy)),
                );
            }
        }

        let auth = root.attr("security_authentication");
        if root.attr("simple_authentication").as_bool() == Some(true)
            && !auth.is_unknown()
            && auth.as_str() != Some(AUTH_APP)
        {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid simple_authentication",
                    "simple_authentication requires security_authentication to be APP",
                )
                .with_attribute(AttributePath::new("simple_authentication")),
            );
        }

        for (i, param) in attr_list(root, "backend_params").iter().enumerate() {
            let origin = param.attr("type");
            if origin.as_str() == Some(ORIGIN_SYSTEM) && param.attr("system_param_type").is_null() {
                diagnostics.push(
                    Diagnostic::error(
                        "Missing system_param_type",
                        "system_param_type must be set for SYSTEM backend parameters",
                    )
                    .with_attribute(
                        AttributePath::new("backend_params")
                            .index(i as i64)
                            .attribute("system_param_type"),
                    ),
                );
            }
        }

        ValidateResourceConfigResponse { diagnostics }
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

        let created = match Self::build_body(&request.planned_state) {
            Ok(body) => {
                let instance_id = get_str(&request.planned_state, "instance_id");
                client
                    .apig()
                    .instance(&instance_id)
                    .apis()
                    .create(body)
                    .await
                    .map_err(|e| api_error("Failed to create API", e))
            }
            Err(e) => Err(Diagnostic::error("Invalid API", e)),
        };
        let id = match created {
            Ok(created) => pathsearch::search_string("id", &created).unwrap_or_default(),
            Err(diag) => {
                diagnostics.push(diag);
                return CreateResourceResponse {
                    new_state: DynamicValue::null(),
                    private: vec![],
                    diagnostics,
                };
            }
        };
        tracing::info!("Created APIG API {}", id);

        let mut state = request.planned_state;
        let _ = state.set_string(&AttributePath::new("id"), id);

        let new_state = match self.read_state(&client, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read API", e));
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
            Ok(client) => match self.read_state(&client, request.current_state.clone()).await {
                Ok(state) => Some(state),
                Err(e) => {
                    let id = get_str(&request.current_state, "id");
                    match check_deleted(&e, "API", &id) {
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
        let updated = match Self::build_body(&request.planned_state) {
            Ok(body) => client
                .apig()
                .instance(&instance_id)
                .apis()
                .update(&id, body)
                .await
                .map_err(|e| api_error(format!("Failed to update API ({})", id), e)),
            Err(e) => Err(Diagnostic::error("Invalid API", e)),
        };
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
        let new_state = match self.read_state(&client, state.clone()).await {
            Ok(new_state) => new_state,
            Err(e) => {
                diagnostics.push(api_error("Failed to read API", e));
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

        let client = match self.client(&request.prior_state).await {
            Ok(client) => client,
            Err(diag) => {
                diagnostics.push(diag);
                return DeleteResourceResponse { diagnostics };
            }
        };

        let instance_id = get_str(&request.prior_state, "instance_id");
        let id = get_str(&request.prior_state, "id");
        if let Err(e) = client.apig().instance(&instance_id).apis().delete(&id).await {
            if !e.is_not_found() {
                diagnostics.push(api_error(format!("Failed to delete API ({})", id), e));
            }
        }

        DeleteResourceResponse { diagnostics }
    }

    fn import_handler(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for ApigApiResource {
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
impl ResourceWithImportState for ApigApiResource {
    /// Imported by `<instance_id>/<name>`
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
            .apis()
            .find_by_name(&parts[1])
            .await
        {
            Ok(api) => {
                let mut state = DynamicValue::object();
                let _ = state.set_string(
                    &AttributePath::new("id"),
                    pathsearch::search_string("id", &api).unwrap_or_default(),
                );
                let _ = state.set_string(&AttributePath::new("instance_id"), parts[0].clone());
                response.imported_resources.push(ImportedResource {
                    type_name: request.type_name,
                    state,
                    private: vec![],
                });
            }
            Err(e) => response
                .diagnostics
                .push(api_error(format!("Unable to find the API ({})", parts[1]), e)),
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::common::get_list;
    use crate::test_helpers::{provider_data, value};
    use mockito::{Matcher, Server};
    use std::sync::Arc;
    use tfplug::types::ClientCapabilities;

    const APIS: &str = "/v2/p1/apigw/instances/inst-1/apis";

    async fn configured(url: &str) -> ApigApiResource {
        let mut resource = ApigApiResource::new();
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

    /// A web backend behind a VPC channel with one canary policy, defaults
    /// already filled in by the plan
    fn planned() -> DynamicValue {
        value(json!({
            "id": null,
            "region": null,
            "instance_id": "inst-1",
            "group_id": "g-1",
            "type": "Public",
            "name": "orders",
            "request_method": "GET",
            "request_path": "/orders/{id}",
            "request_protocol": "HTTPS",
            "security_authentication": "APP",
            "simple_authentication": true,
            "authorizer_id": null,
            "tags": ["v1"],
            "body_description": null,
            "cors": false,
            "description": null,
            "matching": "Exact",
            "response_id": null,
            "success_response": null,
            "failure_response": null,
            "registered_at": null,
            "updated_at": null,
            "request_params": [{
                "name": "id", "required": true, "passthrough": null, "enumeration": null,
                "location": "PATH", "type": "STRING", "maximum": 32, "minimum": 1,
                "example": null, "default": null, "description": null, "valid_enable": null
            }],
            "backend_params": [{
                "type": "SYSTEM", "name": "X-Source", "location": "HEADER",
                "value": "sourceIp", "description": null, "system_param_type": "internal"
            }],
            "mock": [],
            "func_graph": [],
            "web": [{
                "path": "/backend/{id}", "host_header": null, "vpc_channel_id": "vpc-1",
                "backend_address": null, "request_method": "GET", "request_protocol": "HTTPS",
                "timeout": 5000, "retry_count": -1, "ssl_enable": false, "authorizer_id": null
            }],
            "mock_policy": [],
            "func_graph_policy": [],
            "web_policy": [{
                "name": "canary", "effective_mode": "ANY", "authorizer_id": null,
                "path": "/v2", "request_method": "GET", "host_header": null,
                "vpc_channel_id": null, "backend_address": "10.0.0.1:8080",
                "request_protocol": "HTTP", "timeout": 5000, "retry_count": -1,
                "conditions": [{
                    "value": "beta", "param_name": "id", "sys_name": null, "cookie_name": null,
                    "frontend_authorizer_name": null, "source": "param", "type": "Equal"
                }],
                "backend_params": []
            }]
        }))
    }

    fn api_body() -> String {
        json!({
            "id": "api-1",
            "name": "orders",
            "type": 1,
            "group_id": "g-1",
            "req_method": "GET",
            "req_uri": "/orders/{id}",
            "req_protocol": "HTTPS",
            "auth_type": "APP",
            "auth_opt": {"app_code_auth_type": "HEADER"},
            "authorizer_id": "",
            "tags": ["v1"],
            "cors": false,
            "match_mode": "NORMAL",
            "remark": "",
            "backend_type": "HTTP",
            "register_time": "2024-03-01T08:00:00Z",
            "update_time": "2024-03-02T08:00:00Z",
            "req_params": [{
                "id": "rp-1", "name": "id", "type": "STRING", "location": "PATH",
                "required": 1, "pass_through": 2, "max_size": 32, "min_size": 1
            }],
            "backend_params": [{
                "id": "bp-1", "origin": "SYSTEM", "name": "X-Source", "location": "HEADER",
                "value": "$context.sourceIp"
            }],
            "backend_api": {
                "id": "be-1", "req_uri": "/backend/{id}", "req_method": "GET",
                "req_protocol": "HTTPS", "timeout": 5000, "retry_count": "-1",
                "vpc_channel_status": 1,
                "vpc_channel_info": {"vpc_channel_id": "vpc-1", "vpc_channel_proxy_host": ""}
            },
            "policy_https": [{
                "id": "pol-1", "name": "canary", "effect_mode": "ANY", "req_uri": "/v2",
                "req_method": "GET", "req_protocol": "HTTP", "timeout": 5000,
                "retry_count": "-1", "url_domain": "10.0.0.1:8080", "vpc_channel_status": 2,
                "conditions": [{
                    "id": "c-1", "condition_origin": "param", "req_param_name": "id",
                    "condition_type": "exact", "condition_value": "beta"
                }]
            }]
        })
        .to_string()
    }

    fn validate_request(config: DynamicValue) -> ValidateResourceConfigRequest {
        ValidateResourceConfigRequest {
            type_name: TYPE_NAME.to_string(),
            config,
            client_capabilities: ClientCapabilities::default(),
        }
    }

    #[test]
    fn body_carries_backend_policies_and_system_params() {
        let body = ApigApiResource::build_body(&planned()).unwrap();

        assert_eq!(body["type"], 1);
        assert_eq!(body["match_mode"], "NORMAL");
        assert_eq!(body["backend_type"], "HTTP");
        assert_eq!(body["auth_opt"], json!({"app_code_auth_type": "HEADER"}));
        assert_eq!(body["tags"], json!(["v1"]));
        assert!(body.get("remark").is_none());
        assert!(body.get("mock_info").is_none());
        assert_eq!(
            body["req_params"],
            json!([{
                "name": "id", "type": "STRING", "location": "PATH",
                "required": 1, "pass_through": 2, "max_size": 32, "min_size": 1
            }])
        );
        assert_eq!(
            body["backend_params"],
            json!([{
                "origin": "SYSTEM", "name": "X-Source", "location": "HEADER",
                "value": "$context.sourceIp"
            }])
        );
        assert_eq!(
            body["backend_api"],
            json!({
                "req_uri": "/backend/{id}", "req_method": "GET", "req_protocol": "HTTPS",
                "timeout": 5000, "retry_count": "-1", "enable_client_ssl": false,
                "vpc_channel_status": 1, "vpc_channel_info": {"vpc_channel_id": "vpc-1"}
            })
        );
        assert_eq!(
            body["policy_https"],
            json!([{
                "name": "canary", "effect_mode": "ANY", "req_uri": "/v2", "req_method": "GET",
                "req_protocol": "HTTP", "timeout": 5000, "retry_count": "-1",
                "vpc_channel_status": 2, "url_domain": "10.0.0.1:8080",
                "conditions": [{
                    "req_param_name": "id", "condition_origin": "param",
                    "condition_value": "beta", "condition_type": "exact"
                }]
            }])
        );
    }

    #[test]
    fn authorizer_system_params_keep_their_kind() {
        assert_eq!(
            backend_param_value("SYSTEM", "userId", "frontend"),
            "$context.authorizer.frontend.userId"
        );
        assert_eq!(backend_param_value("SYSTEM", "stage", "internal"), "$context.stage");
        assert_eq!(backend_param_value("REQUEST", "id", ""), "id");
    }

    #[test]
    fn simple_authentication_needs_app() {
        let mut state = planned();
        state
            .set(&AttributePath::new("security_authentication"), "NONE")
            .unwrap();
        let err = ApigApiResource::build_body(&state).unwrap_err();
        assert!(err.contains("must be 'APP'"), "{}", err);
    }

    #[tokio::test]
    async fn validate_wants_exactly_one_backend() {
        let resource = ApigApiResource::new();

        let mut both = planned();
        both.set(
            &AttributePath::new("mock"),
            Dynamic::from(&json!([{"status_code": 200, "response": "ok", "authorizer_id": null}])),
        )
        .unwrap();
        let response = resource
            .validate(Context::new(), validate_request(both))
            .await;
        assert_eq!(response.diagnostics.len(), 1, "{:?}", response.diagnostics);
        assert_eq!(response.diagnostics[0].summary, "Invalid backend");

        let mut orphan_policy = planned();
        orphan_policy
            .set(&AttributePath::new("web"), Dynamic::List(vec![]))
            .unwrap();
        orphan_policy
            .set(&AttributePath::new("func_graph"), Dynamic::from(&json!([{"function_urn": "urn:fss:1"}])))
            .unwrap();
        let response = resource
            .validate(Context::new(), validate_request(orphan_policy))
            .await;
        let summaries: Vec<_> = response.diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Invalid backend policy"]);
        assert_eq!(
            response.diagnostics[0].attribute,
            Some(AttributePath::new("web_policy"))
        );

        let response = resource
            .validate(Context::new(), validate_request(planned()))
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    }

    #[tokio::test]
    async fn validate_reports_system_param_without_kind() {
        let mut config = planned();
        config
            .set(
                &AttributePath::new("backend_params").index(0).attribute("system_param_type"),
                Dynamic::Null,
            )
            .unwrap();

        let response = ApigApiResource::new()
            .validate(Context::new(), validate_request(config))
            .await;

        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].attribute,
            Some(
                AttributePath::new("backend_params")
                    .index(0)
                    .attribute("system_param_type")
            )
        );
    }

    #[tokio::test]
    async fn create_posts_api_then_reads_it_back() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", APIS)
            .match_body(Matcher::PartialJson(json!({
                "group_id": "g-1", "name": "orders", "type": 1, "req_method": "GET",
                "req_uri": "/orders/{id}", "auth_type": "APP", "match_mode": "NORMAL",
                "backend_type": "HTTP"
            })))
            .with_status(201)
            .with_body(r#"{"id": "api-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", format!("{}/api-1", APIS).as_str())
            .with_status(200)
            .with_body(api_body())
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

        let state = &response.new_state;
        assert_eq!(get_str(state, "id"), "api-1");
        assert_eq!(get_str(state, "region"), "cn-north-4");
        assert_eq!(get_str(state, "type"), "Public");
        assert_eq!(get_str(state, "matching"), "Exact");
        assert_eq!(get_str(state, "registered_at"), "2024-03-01T08:00:00Z");
        assert_eq!(
            state.get(&AttributePath::new("simple_authentication")).as_bool(),
            Some(true)
        );
        assert!(state.get(&AttributePath::new("description")).is_null());
        assert!(state.get(&AttributePath::new("authorizer_id")).is_null());

        let backend_params = get_list(state, "backend_params");
        assert_eq!(attr_str(&backend_params[0], "value"), "sourceIp");
        assert_eq!(attr_str(&backend_params[0], "system_param_type"), "internal");

        let web = get_list(state, "web");
        assert_eq!(attr_str(&web[0], "vpc_channel_id"), "vpc-1");
        assert_eq!(attr_i64(&web[0], "retry_count"), -1);
        assert_eq!(web[0].attr("ssl_enable").as_bool(), Some(false));

        let policies = get_list(state, "web_policy");
        assert_eq!(attr_str(&policies[0], "backend_address"), "10.0.0.1:8080");
        let conditions = attr_list(&policies[0], "conditions");
        assert_eq!(attr_str(&conditions[0], "type"), "Equal");
    }

    #[tokio::test]
    async fn update_puts_the_whole_definition() {
        let mut server = Server::new_async().await;
        let update = server
            .mock("PUT", format!("{}/api-1", APIS).as_str())
            .match_body(Matcher::PartialJson(json!({
                "name": "orders", "cors": true, "backend_type": "HTTP"
            })))
            .with_status(200)
            .with_body(r#"{"id": "api-1"}"#)
            .create_async()
            .await;
        server
            .mock("GET", format!("{}/api-1", APIS).as_str())
            .with_status(200)
            .with_body(api_body())
            .create_async()
            .await;

        let mut prior = planned();
        prior.set_string(&AttributePath::new("id"), "api-1".to_string()).unwrap();
        let mut planned_state = prior.clone();
        planned_state.set(&AttributePath::new("cors"), true).unwrap();

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: prior,
                    planned_state: planned_state.clone(),
                    config: planned_state,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        update.assert_async().await;
        assert_eq!(get_str(&response.new_state, "id"), "api-1");
    }

    #[tokio::test]
    async fn read_of_deleted_api_drops_state() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", format!("{}/api-1", APIS).as_str())
            .with_status(404)
            .with_body(r#"{"error_code": "APIG.3002", "error_msg": "api not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: value(json!({"id": "api-1", "instance_id": "inst-1"})),
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
    async fn delete_ignores_missing_api() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("DELETE", format!("{}/api-1", APIS).as_str())
            .with_status(404)
            .with_body(r#"{"error_code": "APIG.3002", "error_msg": "api not found"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: value(json!({"id": "api-1", "instance_id": "inst-1"})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn import_looks_api_up_by_name() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", APIS)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "orders".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"apis": [{"id": "api-0", "name": "orders-v2"}, {"id": "api-1", "name": "orders"}]}"#,
            )
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: "inst-1/orders".to_string(),
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.imported_resources[0].state;
        assert_eq!(get_str(state, "id"), "api-1");
        assert_eq!(get_str(state, "instance_id"), "inst-1");
    }
}
