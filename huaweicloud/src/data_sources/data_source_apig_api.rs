//! Details of one API on an APIG dedicated instance, including its backends
//! and backend policies

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use uuid::Uuid;

use crate::api::pathsearch;
use crate::resources::common::{
    api_error, format_rfc3339, get_str, not_configured, object, provider_data_from,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_apig_api";

const PARAM_ORIGIN_SYSTEM: &str = "SYSTEM";
const SYSTEM_PARAM_INTERNAL: &str = "internal";

#[derive(Default)]
pub struct ApigApiDataSource {
    provider_data: Option<HuaweiCloudProviderData>,
}

impl ApigApiDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

fn object_type(fields: &[(&str, AttributeType)]) -> AttributeType {
    AttributeType::Object(
        fields
            .iter()
            .map(|(name, t)| (name.to_string(), t.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn computed(name: &str, t: AttributeType, description: &str) -> tfplug::schema::Attribute {
    AttributeBuilder::new(name, t)
        .description(description)
        .computed()
        .build()
}

fn condition_type() -> AttributeType {
    use AttributeType::String as S;
    object_type(&[
        ("id", S),
        ("source", S),
        ("param_name", S),
        ("sys_name", S),
        ("cookie_name", S),
        ("frontend_authorizer_name", S),
        ("type", S),
        ("value", S),
        ("request_id", S),
        ("request_location", S),
    ])
}

fn backend_param_type() -> AttributeType {
    use AttributeType::String as S;
    object_type(&[
        ("id", S),
        ("request_id", S),
        ("type", S),
        ("name", S),
        ("location", S),
        ("value", S),
        ("description", S),
        ("system_param_type", S),
    ])
}

fn request_param_type() -> AttributeType {
    use AttributeType::{Bool as B, Number as N, String as S};
    object_type(&[
        ("id", S),
        ("name", S),
        ("required", B),
        ("passthrough", B),
        ("enumeration", S),
        ("location", S),
        ("type", S),
        ("maximum", N),
        ("minimum", N),
        ("example", S),
        ("default", S),
        ("description", S),
        ("valid_enable", N),
    ])
}

fn mock_type() -> AttributeType {
    use AttributeType::{Number as N, String as S};
    object_type(&[
        ("id", S),
        ("status_code", N),
        ("response", S),
        ("authorizer_id", S),
    ])
}

fn mock_policy_type() -> AttributeType {
    use AttributeType::{Number as N, String as S};
    object_type(&[
        ("id", S),
        ("name", S),
        ("status_code", N),
        ("response", S),
        ("effective_mode", S),
        ("authorizer_id", S),
        ("conditions", AttributeType::list(condition_type())),
        ("backend_params", AttributeType::list(backend_param_type())),
    ])
}

fn func_graph_fields() -> Vec<(&'static str, AttributeType)> {
    use AttributeType::{Number as N, String as S};
    vec![
        ("id", S),
        ("function_urn", S),
        ("version", S),
        ("function_alias_urn", S),
        ("network_type", S),
        ("request_protocol", S),
        ("timeout", N),
        ("invocation_type", S),
        ("authorizer_id", S),
    ]
}

fn func_graph_policy_type() -> AttributeType {
    let mut fields = func_graph_fields();
    fields.extend([
        ("name", AttributeType::String),
        ("effective_mode", AttributeType::String),
        ("conditions", AttributeType::list(condition_type())),
        ("backend_params", AttributeType::list(backend_param_type())),
    ]);
    object_type(&fields)
}

fn web_fields() -> Vec<(&'static str, AttributeType)> {
    use AttributeType::{Number as N, String as S};
    vec![
        ("id", S),
        ("path", S),
        ("host_header", S),
        ("vpc_channel_id", S),
        ("backend_address", S),
        ("request_method", S),
        ("request_protocol", S),
        ("timeout", N),
        ("retry_count", N),
        ("authorizer_id", S),
    ]
}

fn web_policy_type() -> AttributeType {
    let mut fields = web_fields();
    fields.extend([
        ("name", AttributeType::String),
        ("effective_mode", AttributeType::String),
        ("conditions", AttributeType::list(condition_type())),
        ("backend_params", AttributeType::list(backend_param_type())),
    ]);
    object_type(&fields)
}

fn get(value: &Value, name: &str) -> Dynamic {
    Dynamic::from(&value[name])
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().map_or(true, |m| m.is_empty())
}

/// `1` means yes, anything else no
fn enabled(value: &Value, name: &str) -> Dynamic {
    Dynamic::Bool(value[name].as_i64() == Some(1))
}

fn api_type(raw: i64) -> &'static str {
    match raw {
        1 => "Public",
        2 => "Private",
        _ => "",
    }
}

fn match_mode(raw: &str) -> &'static str {
    match raw {
        "SWA" => "Prefix",
        "NORMAL" => "Exact",
        _ => "",
    }
}

fn condition_kind(raw: &str) -> &'static str {
    match raw {
        "exact" => "Equal",
        "enum" => "Enumerated",
        "pattern" => "Matching",
        _ => "",
    }
}

fn system_param_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$context\.(?:authorizer\.(frontend|backend)\.)?([\w-]+)").ok())
        .as_ref()
}

/// Split a backend parameter value into its system parameter type and name.
/// System values look like `$context.name` (internal) or
/// `$context.authorizer.{frontend|backend}.name`; other origins pass
/// through untouched.
pub(crate) fn parse_backend_param_value(origin: &str, value: &str) -> (String, String) {
    if origin != PARAM_ORIGIN_SYSTEM {
        return (String::new(), value.to_string());
    }
    match system_param_pattern().and_then(|re| re.captures(value)) {
        Some(caps) => {
            let kind = caps
                .get(1)
                .map_or(SYSTEM_PARAM_INTERNAL, |m| m.as_str())
                .to_string();
            let name = caps.get(2).map_or("", |m| m.as_str()).to_string();
            (kind, name)
        }
        None => {
            tracing::warn!(
                "Unexpected system parameter {:?}, want $context.xxx or $context.authorizer.frontend|backend.xxx",
                value
            );
            (String::new(), String::new())
        }
    }
}

fn flatten_backend_params(params: &[Value]) -> Dynamic {
    Dynamic::List(
        params
            .iter()
            .map(|param| {
                let origin = param["origin"].as_str().unwrap_or_default();
                let (kind, value) =
                    parse_backend_param_value(origin, param["value"].as_str().unwrap_or_default());
                object([
                    ("id", get(param, "id")),
                    ("request_id", get(param, "req_param_id")),
                    ("type", Dynamic::from(origin)),
                    ("name", get(param, "name")),
                    ("location", get(param, "location")),
                    ("value", Dynamic::from(value)),
                    ("description", get(param, "remark")),
                    ("system_param_type", Dynamic::from((!kind.is_empty()).then_some(kind))),
                ])
            })
            .collect(),
    )
}

fn flatten_conditions(policy: &Value) -> Dynamic {
    Dynamic::List(
        pathsearch::search_array("conditions", policy)
            .iter()
            .map(|condition| {
                let kind = condition["condition_type"].as_str().unwrap_or_default();
                object([
                    ("id", get(condition, "id")),
                    ("source", get(condition, "condition_origin")),
                    ("param_name", get(condition, "req_param_name")),
                    ("sys_name", get(condition, "sys_param_name")),
                    ("cookie_name", get(condition, "cookie_param_name")),
                    (
                        "frontend_authorizer_name",
                        get(condition, "frontend_authorizer_param_name"),
                    ),
                    ("type", Dynamic::from(condition_kind(kind))),
                    ("value", get(condition, "condition_value")),
                    ("request_id", get(condition, "req_param_id")),
                    ("request_location", get(condition, "req_param_location")),
                ])
            })
            .collect(),
    )
}

/// String params carry their limits as sizes, number params as values
fn flatten_request_params(api: &Value) -> Dynamic {
    Dynamic::List(
        pathsearch::search_array("req_params", api)
            .iter()
            .map(|param| {
                let (maximum, minimum) = match param["type"].as_str() {
                    Some("NUMBER") => (get(param, "max_num"), get(param, "min_num")),
                    Some("STRING") => (get(param, "max_size"), get(param, "min_size")),
                    _ => (Dynamic::Null, Dynamic::Null),
                };
                object([
                    ("id", get(param, "id")),
                    ("name", get(param, "name")),
                    ("required", enabled(param, "required")),
                    ("passthrough", enabled(param, "pass_through")),
                    ("enumeration", get(param, "enumerations")),
                    ("location", get(param, "location")),
                    ("type", get(param, "type")),
                    ("maximum", maximum),
                    ("minimum", minimum),
                    ("example", get(param, "sample_value")),
                    ("default", get(param, "default_value")),
                    ("description", get(param, "remark")),
                    ("valid_enable", get(param, "valid_enable")),
                ])
            })
            .collect(),
    )
}

fn retry_count(value: &Value) -> Dynamic {
    match &value["retry_count"] {
        Value::String(s) => s.parse::<i64>().map(Dynamic::from).unwrap_or(Dynamic::Null),
        other => Dynamic::from(other),
    }
}

/// Web backend fields shared by the default backend and its policies.
/// A VPC channel backend has no address and vice versa.
fn web_backend(web: &Value) -> Vec<(&'static str, Dynamic)> {
    let vpc_channel_id = pathsearch::search_string("vpc_channel_info.vpc_channel_id", web)
        .unwrap_or_default();
    let (host_header, vpc_channel, address) = if vpc_channel_id.is_empty() {
        (Dynamic::Null, Dynamic::Null, get(web, "url_domain"))
    } else {
        (
            Dynamic::from(&pathsearch::search("vpc_channel_info.vpc_channel_proxy_host", web)),
            Dynamic::from(vpc_channel_id),
            Dynamic::Null,
        )
    };
    vec![
        ("id", get(web, "id")),
        ("path", get(web, "req_uri")),
        ("host_header", host_header),
        ("vpc_channel_id", vpc_channel),
        ("backend_address", address),
        ("request_method", get(web, "req_method")),
        ("request_protocol", get(web, "req_protocol")),
        ("timeout", get(web, "timeout")),
        ("retry_count", retry_count(web)),
        ("authorizer_id", get(web, "authorizer_id")),
    ]
}

fn func_graph_backend(func: &Value) -> Vec<(&'static str, Dynamic)> {
    vec![
        ("id", get(func, "id")),
        ("function_urn", get(func, "function_urn")),
        ("version", get(func, "version")),
        ("function_alias_urn", get(func, "alias_urn")),
        ("network_type", get(func, "network_type")),
        ("request_protocol", get(func, "req_protocol")),
        ("timeout", get(func, "timeout")),
        ("invocation_type", get(func, "invocation_type")),
        ("authorizer_id", get(func, "authorizer_id")),
    ]
}

fn mock_backend(mock: &Value) -> Vec<(&'static str, Dynamic)> {
    vec![
        ("id", get(mock, "id")),
        ("status_code", get(mock, "status_code")),
        ("response", get(mock, "result_content")),
        ("authorizer_id", get(mock, "authorizer_id")),
    ]
}

fn policy_fields(policy: &Value) -> [(&'static str, Dynamic); 4] {
    [
        ("name", get(policy, "name")),
        ("effective_mode", get(policy, "effect_mode")),
        ("conditions", flatten_conditions(policy)),
        (
            "backend_params",
            flatten_backend_params(&pathsearch::search_array("backend_params", policy)),
        ),
    ]
}

type Fields = fn(&Value) -> Vec<(&'static str, Dynamic)>;

fn single(value: &Value, fields: Fields) -> Dynamic {
    if is_empty_object(value) {
        return Dynamic::List(vec![]);
    }
    Dynamic::List(vec![object(fields(value))])
}

/// Backend policies: the backend fields plus name, mode and conditions
fn policies(api: &Value, expr: &str, fields: Fields) -> Dynamic {
    Dynamic::List(
        pathsearch::search_array(expr, api)
            .iter()
            .map(|policy| {
                let mut all = fields(policy);
                all.extend(policy_fields(policy));
                object(all)
            })
            .collect(),
    )
}

pub(crate) fn flatten_api(state: &mut DynamicValue, api: &Value) {
    let text = |name: &str| api[name].as_str().unwrap_or_default().to_string();
    let mut set = |name: &str, value: Dynamic| {
        let _ = state.set(&AttributePath::new(name), value);
    };

    set("name", get(api, "name"));
    set("type", Dynamic::from(api_type(api["type"].as_i64().unwrap_or_default())));
    set("request_method", get(api, "req_method"));
    set("request_path", get(api, "req_uri"));
    set("request_protocol", get(api, "req_protocol"));
    set("security_authentication", get(api, "auth_type"));
    set(
        "simple_authentication",
        Dynamic::Bool(
            pathsearch::search_string("auth_opt.app_code_auth_type", api).as_deref()
                == Some("HEADER"),
        ),
    );
    set("authorizer_id", get(api, "authorizer_id"));
    set("tags", get(api, "tags"));
    set("group_id", get(api, "group_id"));
    set("group_name", get(api, "group_name"));
    set("group_version", get(api, "group_version"));
    set("env_id", get(api, "run_env_id"));
    set("env_name", get(api, "run_env_name"));
    set("publish_id", get(api, "publish_id"));
    set("backend_type", get(api, "backend_type"));
    set("cors", get(api, "cors"));
    set("body_description", get(api, "body_remark"));
    set("description", get(api, "remark"));
    set("matching", Dynamic::from(match_mode(&text("match_mode"))));
    set("response_id", get(api, "response_id"));
    set("success_response", get(api, "result_normal_sample"));
    set("failure_response", get(api, "result_failure_sample"));
    set("registered_at", Dynamic::from(format_rfc3339(&text("register_time"))));
    set("updated_at", Dynamic::from(format_rfc3339(&text("update_time"))));
    set("published_at", Dynamic::from(format_rfc3339(&text("publish_time"))));

    set("request_params", flatten_request_params(api));
    set(
        "backend_params",
        flatten_backend_params(&pathsearch::search_array("backend_params", api)),
    );

    set("mock", single(&api["mock_info"], mock_backend));
    set("func_graph", single(&api["func_info"], func_graph_backend));
    set("web", single(&api["backend_api"], web_backend));
    set("mock_policy", policies(api, "policy_mocks", mock_backend));
    set("func_graph_policy", policies(api, "policy_functions", func_graph_backend));
    set("web_policy", policies(api, "policy_https", web_backend));
}

#[async_trait]
impl DataSource for ApigApiDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: DataSourceMetadataRequest,
    ) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        use AttributeType::{Bool as B, String as S};

        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Gets the details of an API on an APIG dedicated instance")
            .attribute(computed("id", S, "The data source ID"))
            .attribute(
                AttributeBuilder::new("region", S)
                    .description("The region of the instance; defaults to the provider region")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("instance_id", S)
                    .description("The ID of the dedicated instance the API belongs to")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("api_id", S)
                    .description("The ID of the API")
                    .required()
                    .build(),
            );

        for (name, description) in [
            ("name", "The API name"),
            ("type", "The API type, Public or Private"),
            ("request_method", "The request method"),
            ("request_path", "The request address"),
            ("request_protocol", "The request protocol"),
            ("security_authentication", "The security authentication mode"),
            ("authorizer_id", "The ID of the frontend custom authorizer"),
            ("group_id", "The ID of the API group"),
            ("group_name", "The name of the API group"),
            ("group_version", "The version of the API group"),
            ("body_description", "The description of the request body"),
            ("description", "The API description"),
            ("matching", "The route matching mode, Prefix or Exact"),
            ("response_id", "The ID of the custom response"),
            ("success_response", "The example response for a successful request"),
            ("failure_response", "The example response for a failed request"),
            ("env_id", "The ID of the environment the API is published in"),
            ("env_name", "The name of the environment the API is published in"),
            ("publish_id", "The publish record ID"),
            ("backend_type", "The backend type"),
            ("registered_at", "The registration time, in RFC3339 format"),
            ("updated_at", "The latest update time, in RFC3339 format"),
            ("published_at", "The publish time, in RFC3339 format"),
        ] {
            builder = builder.attribute(computed(name, S, description));
        }

        let schema = builder
            .attribute(computed(
                "simple_authentication",
                B,
                "Whether AppCode authentication is enabled",
            ))
            .attribute(computed("cors", B, "Whether CORS is supported"))
            .attribute(computed("tags", AttributeType::list(S), "The API tags"))
            .attribute(computed(
                "request_params",
                AttributeType::list(request_param_type()),
                "The request parameters",
            ))
            .attribute(computed(
                "backend_params",
                AttributeType::list(backend_param_type()),
                "The backend parameters",
            ))
            .attribute(computed("mock", AttributeType::list(mock_type()), "The mock backend"))
            .attribute(computed(
                "mock_policy",
                AttributeType::list(mock_policy_type()),
                "The mock backend policies",
            ))
            .attribute(computed(
                "func_graph",
                AttributeType::list(object_type(&func_graph_fields())),
                "The FunctionGraph backend",
            ))
            .attribute(computed(
                "func_graph_policy",
                AttributeType::list(func_graph_policy_type()),
                "The FunctionGraph backend policies",
            ))
            .attribute(computed(
                "web",
                AttributeType::list(object_type(&web_fields())),
                "The web backend",
            ))
            .attribute(computed(
                "web_policy",
                AttributeType::list(web_policy_type()),
                "The web backend policies",
            ))
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let mut diagnostics = vec![];

        let config = match &self.provider_data {
            Some(data) => &data.config,
            None => {
                diagnostics.push(not_configured());
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                    deferred: None,
                };
            }
        };

        let region = config.get_region(&request.config);
        let instance_id = get_str(&request.config, "instance_id");
        let api_id = get_str(&request.config, "api_id");
        tracing::debug!("Reading APIG API {} of instance {}", api_id, instance_id);

        let result = match config.service_client("apig", &region).await {
            Ok(client) => client.apig().instance(&instance_id).apis().get(&api_id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(api) => {
                let mut state = request.config;
                let _ = state.set_string(&AttributePath::new("id"), Uuid::new_v4().to_string());
                let _ = state.set_string(&AttributePath::new("region"), region);
                flatten_api(&mut state, &api);
                ReadDataSourceResponse {
                    state,
                    diagnostics,
                    deferred: None,
                }
            }
            Err(e) => {
                diagnostics.push(api_error(format!("Failed to read API ({})", api_id), e));
                ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                    deferred: None,
                }
            }
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ApigApiDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        let mut diagnostics = vec![];
        self.provider_data = provider_data_from(request.provider_data, &mut diagnostics);
        ConfigureDataSourceResponse { diagnostics }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{provider_data, value};
    use mockito::Server;
    use serde_json::json;
    use std::sync::Arc;
    use tfplug::types::ClientCapabilities;

    #[test]
    fn system_backend_params_are_split() {
        assert_eq!(
            parse_backend_param_value("SYSTEM", "$context.authorizer.frontend.user_id"),
            ("frontend".to_string(), "user_id".to_string())
        );
        assert_eq!(
            parse_backend_param_value("SYSTEM", "$context.sourceIp"),
            ("internal".to_string(), "sourceIp".to_string())
        );
        assert_eq!(
            parse_backend_param_value("SYSTEM", "sourceIp"),
            (String::new(), String::new())
        );
        assert_eq!(
            parse_backend_param_value("CONSTANT", "$context.sourceIp"),
            (String::new(), "$context.sourceIp".to_string())
        );
    }

    #[tokio::test]
    async fn read_flattens_backends_and_policies() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v2/p1/apigw/instances/i1/apis/a1")
            .with_status(200)
            .with_body(
                json!({
                    "id": "a1",
                    "name": "orders",
                    "type": 1,
                    "req_method": "GET",
                    "req_uri": "/orders",
                    "req_protocol": "HTTPS",
                    "auth_type": "APP",
                    "auth_opt": {"app_code_auth_type": "HEADER"},
                    "match_mode": "SWA",
                    "cors": false,
                    "tags": ["shop"],
                    "register_time": "2024-03-01T08:00:00Z",
                    "req_params": [
                        {"id": "r1", "name": "limit", "type": "NUMBER", "location": "QUERY",
                         "required": 1, "pass_through": 2, "max_num": 100, "min_num": 1}
                    ],
                    "backend_params": [
                        {"id": "b1", "origin": "SYSTEM", "name": "uid", "location": "HEADER",
                         "value": "$context.authorizer.backend.uid"}
                    ],
                    "backend_api": {
                        "id": "w1", "req_uri": "/backend/orders", "req_method": "GET",
                        "req_protocol": "HTTP", "timeout": 5000, "retry_count": "-1",
                        "url_domain": "10.0.0.1:8080"
                    },
                    "policy_https": [{
                        "id": "p1", "name": "beta", "effect_mode": "ANY",
                        "req_uri": "/beta/orders", "req_method": "GET", "req_protocol": "HTTP",
                        "timeout": 5000, "retry_count": "1",
                        "vpc_channel_info": {"vpc_channel_id": "vpc-1", "vpc_channel_proxy_host": "beta.local"},
                        "conditions": [{"id": "c1", "condition_origin": "param",
                                        "req_param_name": "limit", "condition_type": "exact",
                                        "condition_value": "10"}]
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let mut data_source = ApigApiDataSource::new();
        data_source
            .configure(
                Context::new(),
                ConfigureDataSourceRequest {
                    provider_data: Some(Arc::new(provider_data(&server.url()))),
                },
            )
            .await;
        let response = data_source
            .read(
                Context::new(),
                ReadDataSourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    config: value(json!({"instance_id": "i1", "api_id": "a1"})),
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let state = &response.state;
        assert!(Uuid::parse_str(&get_str(state, "id")).is_ok());
        assert_eq!(get_str(state, "type"), "Public");
        assert_eq!(get_str(state, "matching"), "Prefix");
        assert_eq!(get_str(state, "registered_at"), "2024-03-01T08:00:00Z");
        assert_eq!(
            state.get(&AttributePath::new("simple_authentication")).as_bool(),
            Some(true)
        );

        let param = &state.get(&AttributePath::new("request_params")).as_list().unwrap()[0];
        assert_eq!(param.attr("required").as_bool(), Some(true));
        assert_eq!(param.attr("passthrough").as_bool(), Some(false));
        assert_eq!(param.attr("maximum").as_i64(), Some(100));

        let backend = &state.get(&AttributePath::new("backend_params")).as_list().unwrap()[0];
        assert_eq!(backend.attr("system_param_type").as_str(), Some("backend"));
        assert_eq!(backend.attr("value").as_str(), Some("uid"));

        let web = &state.get(&AttributePath::new("web")).as_list().unwrap()[0];
        assert_eq!(web.attr("backend_address").as_str(), Some("10.0.0.1:8080"));
        assert_eq!(web.attr("retry_count").as_i64(), Some(-1));
        assert!(state.get(&AttributePath::new("mock")).as_list().unwrap().is_empty());

        let policy = &state.get(&AttributePath::new("web_policy")).as_list().unwrap()[0];
        assert_eq!(policy.attr("vpc_channel_id").as_str(), Some("vpc-1"));
        assert!(policy.attr("backend_address").is_null());
        let condition = &policy.attr("conditions").as_list().unwrap()[0];
        assert_eq!(condition.attr("type").as_str(), Some("Equal"));
    }
}
