#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource,
    DataSourceMetadataRequest, DataSourceMetadataResponse, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse, ValidateDataSourceConfigRequest, ValidateDataSourceConfigResponse,
};
use tfplug::grpc::GrpcProviderServer;
use tfplug::proto::{self, ProviderService};
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceMetadataRequest, ResourceMetadataResponse,
    ResourceSchemaRequest, ResourceSchemaResponse, ResourceWithConfigure,
    ResourceWithImportState, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::import_state_passthrough_id;
use tonic::Request;

type Store = Arc<Mutex<HashMap<String, String>>>;

struct TestProvider {
    store: Store,
}

#[async_trait]
impl Provider for TestProvider {
    fn type_name(&self) -> &str {
        "test"
    }

    async fn metadata(&self, _ctx: Context, _request: ProviderMetadataRequest) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: "test".to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(
                    AttributeBuilder::new("region", AttributeType::String)
                        .optional()
                        .build(),
                )
                .build(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        _request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(Arc::new(self.store.clone()) as Arc<dyn Any + Send + Sync>),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "test_widget".to_string(),
            Box::new(|| Box::new(Widget { store: None }) as Box<dyn ResourceWithConfigure>),
        );
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
        data_sources.insert(
            "test_widgets".to_string(),
            Box::new(|| Box::new(WidgetCount { store: None }) as Box<dyn DataSourceWithConfigure>),
        );
        data_sources
    }
}

struct Widget {
    store: Option<Store>,
}

fn widget_schema() -> tfplug::Schema {
    SchemaBuilder::new()
        .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
        .attribute(AttributeBuilder::new("name", AttributeType::String).required().build())
        .attribute(
            AttributeBuilder::new("size", AttributeType::String)
                .default("small")
                .build(),
        )
        .attribute(
            AttributeBuilder::new("zone", AttributeType::String)
                .optional()
                .force_new()
                .build(),
        )
        .build()
}

#[async_trait]
impl Resource for Widget {
    fn type_name(&self) -> &str {
        "test_widget"
    }

    async fn metadata(&self, _ctx: Context, _request: ResourceMetadataRequest) -> ResourceMetadataResponse {
        ResourceMetadataResponse {
            type_name: "test_widget".to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: widget_schema(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];
        if request.config.get(&AttributePath::new("name")).as_str() == Some("forbidden") {
            diagnostics.push(Diagnostic::error("Invalid name", "forbidden is reserved"));
        }
        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let store = self.store.as_ref().unwrap();
        let name = request
            .planned_state
            .get_string(&AttributePath::new("name"))
            .unwrap();
        let id = format!("w-{}", name);
        store.lock().unwrap().insert(id.clone(), name);

        let mut state = request.planned_state;
        state.set_string(&AttributePath::new("id"), id).unwrap();
        CreateResourceResponse {
            new_state: state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let store = self.store.as_ref().unwrap();
        let id = request
            .current_state
            .get_string(&AttributePath::new("id"))
            .unwrap();

        let new_state = store.lock().unwrap().get(&id).cloned().map(|name| {
            let mut state = request.current_state.clone();
            state.set_string(&AttributePath::new("name"), name).unwrap();
            state
        });
        ReadResourceResponse {
            new_state,
            diagnostics: vec![],
            private: vec![],
            deferred: None,
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        UpdateResourceResponse {
            new_state: request.planned_state,
            private: vec![],
            diagnostics: vec![],
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let id = request
            .prior_state
            .get_string(&AttributePath::new("id"))
            .unwrap();
        self.store.as_ref().unwrap().lock().unwrap().remove(&id);
        DeleteResourceResponse { diagnostics: vec![] }
    }

    fn import_handler(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithConfigure for Widget {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        self.store = request
            .provider_data
            .and_then(|data| data.downcast_ref::<Store>().cloned());
        ConfigureResourceResponse { diagnostics: vec![] }
    }
}

#[async_trait]
impl ResourceWithImportState for Widget {
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
        import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

struct WidgetCount {
    store: Option<Store>,
}

#[async_trait]
impl DataSource for WidgetCount {
    fn type_name(&self) -> &str {
        "test_widgets"
    }

    async fn metadata(&self, _ctx: Context, _request: DataSourceMetadataRequest) -> DataSourceMetadataResponse {
        DataSourceMetadataResponse {
            type_name: "test_widgets".to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: DataSourceSchemaRequest) -> DataSourceSchemaResponse {
        DataSourceSchemaResponse {
            schema: SchemaBuilder::new()
                .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
                .attribute(AttributeBuilder::new("count", AttributeType::Number).computed().build())
                .build(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        _request: ValidateDataSourceConfigRequest,
    ) -> ValidateDataSourceConfigResponse {
        ValidateDataSourceConfigResponse { diagnostics: vec![] }
    }

    async fn read(&self, _ctx: Context, _request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let count = self.store.as_ref().unwrap().lock().unwrap().len();
        let mut state = DynamicValue::object();
        state.set_string(&AttributePath::new("id"), "widgets".to_string()).unwrap();
        state.set_number(&AttributePath::new("count"), count as f64).unwrap();
        ReadDataSourceResponse {
            state,
            diagnostics: vec![],
            deferred: None,
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for WidgetCount {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        self.store = request
            .provider_data
            .and_then(|data| data.downcast_ref::<Store>().cloned());
        ConfigureDataSourceResponse { diagnostics: vec![] }
    }
}

fn obj(pairs: Vec<(&str, Dynamic)>) -> DynamicValue {
    DynamicValue::new(Dynamic::Map(
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    ))
}

fn wire(value: &DynamicValue) -> Option<proto::DynamicValue> {
    Some(proto::DynamicValue {
        msgpack: value.encode_msgpack().unwrap(),
        json: vec![],
    })
}

fn unwire(value: Option<proto::DynamicValue>) -> DynamicValue {
    DynamicValue::decode_msgpack(&value.unwrap().msgpack).unwrap()
}

async fn configured_server() -> (GrpcProviderServer<TestProvider>, Store) {
    let store: Store = Arc::new(Mutex::new(HashMap::new()));
    let server = GrpcProviderServer::new(TestProvider { store: store.clone() }, Context::new()).await;
    let response = server
        .configure_provider(Request::new(proto::configure_provider::Request {
            terraform_version: "1.9.0".to_string(),
            config: wire(&obj(vec![("region", Dynamic::Null)])),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty());
    (server, store)
}

#[tokio::test]
async fn schema_lists_resources_and_data_sources() {
    let (server, _) = configured_server().await;

    let response = server
        .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
        .await
        .unwrap()
        .into_inner();

    assert!(response.resource_schemas.contains_key("test_widget"));
    assert!(response.data_source_schemas.contains_key("test_widgets"));
    let widget = response.resource_schemas["test_widget"].block.as_ref().unwrap();
    let id = widget.attributes.iter().find(|a| a.name == "id").unwrap();
    assert!(id.computed);
    assert_eq!(id.r#type, b"\"string\"".to_vec());

    let metadata = server
        .get_metadata(Request::new(proto::get_metadata::Request {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(metadata.resources.len(), 1);
    assert!(!metadata.server_capabilities.unwrap().plan_destroy);
}

#[tokio::test]
async fn validate_reports_schema_and_resource_errors() {
    let (server, _) = configured_server().await;

    let missing = server
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "test_widget".to_string(),
            config: wire(&obj(vec![])),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(missing.diagnostics.len(), 1);
    assert_eq!(missing.diagnostics[0].summary, "Missing required argument");

    let forbidden = server
        .validate_resource_config(Request::new(proto::validate_resource_config::Request {
            type_name: "test_widget".to_string(),
            config: wire(&obj(vec![("name", Dynamic::from("forbidden"))])),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(forbidden.diagnostics[0].summary, "Invalid name");
}

#[tokio::test]
async fn create_read_and_destroy_lifecycle() {
    let (server, store) = configured_server().await;
    let config = obj(vec![("name", Dynamic::from("alpha"))]);

    let plan = server
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: wire(&DynamicValue::null()),
            proposed_new_state: wire(&config),
            config: wire(&config),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(plan.diagnostics.is_empty());
    assert!(plan.legacy_type_system);
    let planned = unwire(plan.planned_state.clone());
    assert!(planned.get(&AttributePath::new("id")).is_unknown());
    assert_eq!(planned.get_string(&AttributePath::new("size")).unwrap(), "small");

    let applied = server
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: wire(&DynamicValue::null()),
            planned_state: plan.planned_state,
            config: wire(&config),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(applied.diagnostics.is_empty());
    let state = unwire(applied.new_state);
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "w-alpha");
    // members the resource never set are present as null
    assert!(state.get(&AttributePath::new("zone")).is_null());
    assert_eq!(store.lock().unwrap().len(), 1);

    let read = server
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "test_widget".to_string(),
            current_state: wire(&state),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(unwire(read.new_state), state);

    let destroyed = server
        .apply_resource_change(Request::new(proto::apply_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: wire(&state),
            planned_state: wire(&DynamicValue::null()),
            config: wire(&DynamicValue::null()),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(destroyed.new_state.unwrap().msgpack, vec![0xc0]);
    assert!(store.lock().unwrap().is_empty());

    let gone = server
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "test_widget".to_string(),
            current_state: wire(&state),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(unwire(gone.new_state).is_null());
}

#[tokio::test]
async fn changing_force_new_attribute_plans_replacement() {
    let (server, _) = configured_server().await;
    let prior = obj(vec![
        ("id", Dynamic::from("w-alpha")),
        ("name", Dynamic::from("alpha")),
        ("size", Dynamic::from("small")),
        ("zone", Dynamic::from("a")),
    ]);
    let config = obj(vec![("name", Dynamic::from("alpha")), ("zone", Dynamic::from("b"))]);
    let proposed = obj(vec![
        ("id", Dynamic::from("w-alpha")),
        ("name", Dynamic::from("alpha")),
        ("size", Dynamic::Null),
        ("zone", Dynamic::from("b")),
    ]);

    let plan = server
        .plan_resource_change(Request::new(proto::plan_resource_change::Request {
            type_name: "test_widget".to_string(),
            prior_state: wire(&prior),
            proposed_new_state: wire(&proposed),
            config: wire(&config),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(plan.requires_replace.len(), 1);
    let planned = unwire(plan.planned_state);
    assert!(planned.get(&AttributePath::new("id")).is_unknown());
}

#[tokio::test]
async fn import_passes_id_through() {
    let (server, _) = configured_server().await;

    let response = server
        .import_resource_state(Request::new(proto::import_resource_state::Request {
            type_name: "test_widget".to_string(),
            id: "w-beta".to_string(),
            client_capabilities: None,
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.imported_resources.len(), 1);
    let state = unwire(response.imported_resources[0].state.clone());
    assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "w-beta");
    assert!(state.get(&AttributePath::new("name")).is_null());
}

#[tokio::test]
async fn data_source_reads_with_provider_data() {
    let (server, store) = configured_server().await;
    store
        .lock()
        .unwrap()
        .insert("w-a".to_string(), "a".to_string());

    let response = server
        .read_data_source(Request::new(proto::read_data_source::Request {
            type_name: "test_widgets".to_string(),
            config: wire(&obj(vec![])),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();

    let state = unwire(response.state);
    assert_eq!(state.get_number(&AttributePath::new("count")).unwrap(), 1.0);
}

#[tokio::test]
async fn unknown_resource_type_is_a_diagnostic() {
    let (server, _) = configured_server().await;

    let response = server
        .read_resource(Request::new(proto::read_resource::Request {
            type_name: "test_missing".to_string(),
            current_state: wire(&obj(vec![])),
            ..Default::default()
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.diagnostics.len(), 1);
    assert!(response.diagnostics[0].summary.contains("Unknown resource"));
}

#[tokio::test]
async fn stop_provider_cancels_root_context() {
    let stop = Context::new();
    let server = GrpcProviderServer::new(
        TestProvider {
            store: Arc::new(Mutex::new(HashMap::new())),
        },
        stop.clone(),
    )
    .await;

    server
        .stop_provider(Request::new(proto::stop_provider::Request {}))
        .await
        .unwrap();

    assert!(stop.is_cancelled());
}
