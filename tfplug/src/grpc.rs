//! gRPC service implementation
//!
//! Implements the tfplugin6 Provider service on top of the factory-based
//! Provider trait. Schemas are collected once at startup; every resource or
//! data source call builds a fresh instance from its factory and, for calls
//! that reach the remote API, configures it with the provider data stored by
//! ConfigureProvider.

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::plan::plan_resource_change;
use crate::proto;
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderSchemaRequest, ResourceFactory,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{Attribute, Block, NestedBlock, NestingMode, Schema, StringKind};
use crate::types::{
    has_errors, AttributePath, AttributePathStep, ClientCapabilities, Deferred, DeferredReason,
    Diagnostic, DiagnosticSeverity, DynamicValue, RawState,
};
use crate::validate::validate_config;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;
type ImportResult = Result<
    (
        Vec<proto::import_resource_state::ImportedResource>,
        Vec<Diagnostic>,
        Option<Deferred>,
    ),
    Vec<Diagnostic>,
>;
type DataSourceReadResult =
    Result<(Option<proto::DynamicValue>, Vec<Diagnostic>, Option<Deferred>), Vec<Diagnostic>>;

pub struct GrpcProviderServer<P: Provider> {
    provider: RwLock<P>,
    provider_data: RwLock<ProviderData>,
    provider_schema: Schema,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    resource_schemas: HashMap<String, Schema>,
    data_source_schemas: HashMap<String, Schema>,
    /// Cancelled by StopProvider; every request context derives from it
    stop: Context,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub async fn new(provider: P, stop: Context) -> Self {
        let provider_schema = provider
            .schema(stop.clone(), ProviderSchemaRequest)
            .await
            .schema;
        let resources = provider.resources();
        let data_sources = provider.data_sources();

        let mut resource_schemas = HashMap::new();
        for (name, factory) in &resources {
            let response = factory().schema(stop.clone(), ResourceSchemaRequest).await;
            for diag in &response.diagnostics {
                warn!(resource = %name, summary = %diag.summary, "schema diagnostic");
            }
            resource_schemas.insert(name.clone(), response.schema);
        }

        let mut data_source_schemas = HashMap::new();
        for (name, factory) in &data_sources {
            let response = factory().schema(stop.clone(), DataSourceSchemaRequest).await;
            for diag in &response.diagnostics {
                warn!(data_source = %name, summary = %diag.summary, "schema diagnostic");
            }
            data_source_schemas.insert(name.clone(), response.schema);
        }

        info!(
            resources = resource_schemas.len(),
            data_sources = data_source_schemas.len(),
            "provider schemas loaded"
        );

        Self {
            provider: RwLock::new(provider),
            provider_data: RwLock::new(None),
            provider_schema,
            resources,
            data_sources,
            resource_schemas,
            data_source_schemas,
            stop,
        }
    }

    fn resource_schema(&self, type_name: &str) -> Result<&Schema, Vec<Diagnostic>> {
        self.resource_schemas
            .get(type_name)
            .ok_or_else(|| vec![unknown_type("resource", type_name)])
    }

    fn data_source_schema(&self, type_name: &str) -> Result<&Schema, Vec<Diagnostic>> {
        self.data_source_schemas
            .get(type_name)
            .ok_or_else(|| vec![unknown_type("data source", type_name)])
    }

    async fn resource(
        &self,
        type_name: &str,
        configure: bool,
    ) -> Result<Box<dyn ResourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .resources
            .get(type_name)
            .ok_or_else(|| vec![unknown_type("resource", type_name)])?;
        let mut resource = factory();

        if configure {
            let provider_data = self.provider_data.read().await.clone();
            let response = resource
                .configure(self.stop.clone(), ConfigureResourceRequest { provider_data })
                .await;
            if has_errors(&response.diagnostics) {
                return Err(response.diagnostics);
            }
        }
        Ok(resource)
    }

    async fn data_source(
        &self,
        type_name: &str,
        configure: bool,
    ) -> Result<Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>> {
        let factory = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| vec![unknown_type("data source", type_name)])?;
        let mut data_source = factory();

        if configure {
            let provider_data = self.provider_data.read().await.clone();
            let response = data_source
                .configure(self.stop.clone(), ConfigureDataSourceRequest { provider_data })
                .await;
            if has_errors(&response.diagnostics) {
                return Err(response.diagnostics);
            }
        }
        Ok(data_source)
    }

    async fn read_resource_inner(
        &self,
        request: proto::read_resource::Request,
    ) -> Result<(DynamicValue, Vec<u8>, Vec<Diagnostic>), Vec<Diagnostic>> {
        let schema = self.resource_schema(&request.type_name)?;
        let current_state = decode_value(request.current_state)?;
        let resource = self.resource(&request.type_name, true).await?;

        let response = resource
            .read(
                self.stop.clone(),
                ReadResourceRequest {
                    type_name: request.type_name.clone(),
                    current_state: current_state.clone(),
                    private: request.private,
                    provider_meta: provider_meta(request.provider_meta),
                    client_capabilities: client_capabilities(request.client_capabilities),
                },
            )
            .await;

        let new_state = match response.new_state {
            Some(state) => normalize(schema, state),
            // keep the stored state when the read itself failed
            None if has_errors(&response.diagnostics) => current_state,
            None => {
                debug!(type_name = %request.type_name, "resource gone, removing from state");
                DynamicValue::null()
            }
        };
        Ok((new_state, response.private, response.diagnostics))
    }

    async fn apply_inner(
        &self,
        request: proto::apply_resource_change::Request,
    ) -> Result<(DynamicValue, Vec<u8>, Vec<Diagnostic>), Vec<Diagnostic>> {
        let schema = self.resource_schema(&request.type_name)?;
        let prior_state = decode_value(request.prior_state)?;
        let planned_state = decode_value(request.planned_state)?;
        let config = decode_value(request.config)?;
        let meta = provider_meta(request.provider_meta);
        let resource = self.resource(&request.type_name, true).await?;
        let ctx = self.stop.clone();

        if planned_state.is_null() {
            info!(type_name = %request.type_name, "deleting resource");
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: request.type_name,
                        prior_state: prior_state.clone(),
                        planned_private: request.planned_private.clone(),
                        provider_meta: meta,
                    },
                )
                .await;
            let state = if has_errors(&response.diagnostics) {
                prior_state
            } else {
                DynamicValue::null()
            };
            return Ok((state, request.planned_private, response.diagnostics));
        }

        if prior_state.is_null() {
            info!(type_name = %request.type_name, "creating resource");
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: request.type_name,
                        planned_state,
                        config,
                        planned_private: request.planned_private,
                        provider_meta: meta,
                    },
                )
                .await;
            return Ok((
                normalize(schema, response.new_state),
                response.private,
                response.diagnostics,
            ));
        }

        info!(type_name = %request.type_name, "updating resource");
        let response = resource
            .update(
                ctx,
                UpdateResourceRequest {
                    type_name: request.type_name,
                    prior_state: prior_state.clone(),
                    planned_state,
                    config,
                    planned_private: request.planned_private,
                    provider_meta: meta,
                },
            )
            .await;
        let state = if response.new_state.is_null() {
            prior_state
        } else {
            normalize(schema, response.new_state)
        };
        Ok((state, response.private, response.diagnostics))
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> proto::ProviderService for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> Result<Response<proto::get_metadata::Response>, Status> {
        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities()),
            diagnostics: vec![],
            data_sources: self
                .data_sources
                .keys()
                .map(|name| proto::get_metadata::DataSourceMetadata {
                    type_name: name.clone(),
                })
                .collect(),
            resources: self
                .resources
                .keys()
                .map(|name| proto::get_metadata::ResourceMetadata {
                    type_name: name.clone(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> Result<Response<proto::get_provider_schema::Response>, Status> {
        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&self.provider_schema)),
            resource_schemas: self
                .resource_schemas
                .iter()
                .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
                .collect(),
            data_source_schemas: self
                .data_source_schemas
                .iter()
                .map(|(name, schema)| (name.clone(), schema_to_proto(schema)))
                .collect(),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(server_capabilities()),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> Result<Response<proto::validate_provider_config::Response>, Status> {
        let diagnostics = match decode_value(request.into_inner().config) {
            Ok(config) => validate_config(&self.provider_schema.block, &config.value),
            Err(diags) => diags,
        };
        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> Result<Response<proto::validate_resource_config::Response>, Status> {
        let request = request.into_inner();
        let result: Result<Vec<Diagnostic>, Vec<Diagnostic>> = async {
            let schema = self.resource_schema(&request.type_name)?;
            let config = decode_value(request.config)?;
            let mut diagnostics = validate_config(&schema.block, &config.value);
            if has_errors(&diagnostics) {
                return Ok(diagnostics);
            }

            let resource = self.resource(&request.type_name, false).await?;
            let response = resource
                .validate(
                    self.stop.clone(),
                    ValidateResourceConfigRequest {
                        type_name: request.type_name.clone(),
                        config,
                        client_capabilities: client_capabilities(request.client_capabilities),
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
            Ok::<_, Vec<Diagnostic>>(diagnostics)
        }
        .await;

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(result.unwrap_or_else(|d| d)),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let request = request.into_inner();
        let result: Result<Vec<Diagnostic>, Vec<Diagnostic>> = async {
            let schema = self.data_source_schema(&request.type_name)?;
            let config = decode_value(request.config)?;
            let mut diagnostics = validate_config(&schema.block, &config.value);
            if has_errors(&diagnostics) {
                return Ok(diagnostics);
            }

            let data_source = self.data_source(&request.type_name, false).await?;
            let response = data_source
                .validate(
                    self.stop.clone(),
                    ValidateDataSourceConfigRequest {
                        type_name: request.type_name.clone(),
                        config,
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
            Ok::<_, Vec<Diagnostic>>(diagnostics)
        }
        .await;

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(result.unwrap_or_else(|d| d)),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let request = request.into_inner();
        let raw = request.raw_state.unwrap_or_default();
        let raw_state = RawState {
            json: (!raw.json.is_empty()).then_some(raw.json),
            flatmap: (!raw.flatmap.is_empty()).then_some(raw.flatmap),
        };

        let result = self
            .resource_schema(&request.type_name)
            .and_then(|schema| {
                upgrade_raw_state(schema, request.version, raw_state).map_err(|d| vec![d])
            })
            .and_then(|state| encode_value(&state));

        let response = match result {
            Ok(upgraded_state) => proto::upgrade_resource_state::Response {
                upgraded_state,
                diagnostics: vec![],
            },
            Err(diags) => proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: diagnostics_to_proto(diags),
            },
        };
        Ok(Response::new(response))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> Result<Response<proto::configure_provider::Response>, Status> {
        let request = request.into_inner();
        let config = match decode_value(request.config) {
            Ok(config) => config,
            Err(diags) => {
                return Ok(Response::new(proto::configure_provider::Response {
                    diagnostics: diagnostics_to_proto(diags),
                }))
            }
        };

        info!(terraform_version = %request.terraform_version, "configuring provider");
        let response = self
            .provider
            .write()
            .await
            .configure(
                self.stop.clone(),
                ConfigureProviderRequest {
                    terraform_version: request.terraform_version,
                    config,
                    client_capabilities: client_capabilities(request.client_capabilities),
                },
            )
            .await;

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> Result<Response<proto::read_resource::Response>, Status> {
        let request = request.into_inner();
        let fallback_state = request.current_state.clone();
        let fallback_private = request.private.clone();

        let response = match self.read_resource_inner(request).await {
            Ok((state, private, diagnostics)) => match encode_value(&state) {
                Ok(new_state) => proto::read_resource::Response {
                    new_state,
                    diagnostics: diagnostics_to_proto(diagnostics),
                    private,
                    deferred: None,
                },
                Err(diags) => proto::read_resource::Response {
                    new_state: fallback_state,
                    diagnostics: diagnostics_to_proto(diags),
                    private: fallback_private,
                    deferred: None,
                },
            },
            Err(diags) => proto::read_resource::Response {
                new_state: fallback_state,
                diagnostics: diagnostics_to_proto(diags),
                private: fallback_private,
                deferred: None,
            },
        };
        Ok(Response::new(response))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> Result<Response<proto::plan_resource_change::Response>, Status> {
        let request = request.into_inner();
        let result = (|| {
            let schema = self.resource_schema(&request.type_name)?;
            let prior = decode_value(request.prior_state.clone())?;
            let proposed = decode_value(request.proposed_new_state.clone())?;
            let config = decode_value(request.config.clone())?;

            let planned = plan_resource_change(&schema.block, &prior, &proposed, &config);
            if !planned.requires_replace.is_empty() {
                debug!(
                    type_name = %request.type_name,
                    paths = ?planned.requires_replace.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "replacement planned"
                );
            }
            Ok::<_, Vec<Diagnostic>>((encode_value(&planned.planned_state)?, planned.requires_replace))
        })();

        let response = match result {
            Ok((planned_state, requires_replace)) => proto::plan_resource_change::Response {
                planned_state,
                requires_replace: requires_replace.iter().map(path_to_proto).collect(),
                planned_private: request.prior_private,
                diagnostics: vec![],
                legacy_type_system: true,
                deferred: None,
            },
            Err(diags) => proto::plan_resource_change::Response {
                diagnostics: diagnostics_to_proto(diags),
                legacy_type_system: true,
                ..Default::default()
            },
        };
        Ok(Response::new(response))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> Result<Response<proto::apply_resource_change::Response>, Status> {
        let request = request.into_inner();
        let fallback_state = request.prior_state.clone();

        let response = match self.apply_inner(request).await {
            Ok((state, private, mut diagnostics)) => {
                let new_state = encode_value(&state).unwrap_or_else(|diags| {
                    diagnostics.extend(diags);
                    fallback_state
                });
                proto::apply_resource_change::Response {
                    new_state,
                    private,
                    diagnostics: diagnostics_to_proto(diagnostics),
                    legacy_type_system: true,
                }
            }
            Err(diags) => proto::apply_resource_change::Response {
                new_state: fallback_state,
                private: vec![],
                diagnostics: diagnostics_to_proto(diags),
                legacy_type_system: true,
            },
        };
        Ok(Response::new(response))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> Result<Response<proto::import_resource_state::Response>, Status> {
        let request = request.into_inner();
        let result: ImportResult = async {
            let schema = self.resource_schema(&request.type_name)?;
            let resource = self.resource(&request.type_name, true).await?;
            let Some(importer) = resource.import_handler() else {
                return Err(vec![Diagnostic::error(
                    "Resource Import Not Implemented",
                    format!("{} does not support import", request.type_name),
                )]);
            };

            info!(type_name = %request.type_name, id = %request.id, "importing resource");
            let response = importer
                .import_state(
                    self.stop.clone(),
                    ImportResourceStateRequest {
                        type_name: request.type_name.clone(),
                        id: request.id.clone(),
                        client_capabilities: client_capabilities(request.client_capabilities),
                    },
                )
                .await;

            let mut imported = Vec::with_capacity(response.imported_resources.len());
            for resource in response.imported_resources {
                let state = normalize(schema, resource.state);
                imported.push(proto::import_resource_state::ImportedResource {
                    type_name: resource.type_name,
                    state: encode_value(&state)?,
                    private: resource.private,
                });
            }
            Ok((imported, response.diagnostics, response.deferred))
        }
        .await;

        let response = match result {
            Ok((imported_resources, diagnostics, deferred)) => {
                proto::import_resource_state::Response {
                    imported_resources,
                    diagnostics: diagnostics_to_proto(diagnostics),
                    deferred: deferred.map(deferred_to_proto),
                }
            }
            Err(diags) => proto::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: diagnostics_to_proto(diags),
                deferred: None,
            },
        };
        Ok(Response::new(response))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> Result<Response<proto::read_data_source::Response>, Status> {
        let request = request.into_inner();
        let result: DataSourceReadResult = async {
            let schema = self.data_source_schema(&request.type_name)?;
            let config = decode_value(request.config)?;
            let data_source = self.data_source(&request.type_name, true).await?;

            let response = data_source
                .read(
                    self.stop.clone(),
                    ReadDataSourceRequest {
                        type_name: request.type_name.clone(),
                        config,
                        provider_meta: provider_meta(request.provider_meta),
                        client_capabilities: client_capabilities(request.client_capabilities),
                    },
                )
                .await;
            let state = encode_value(&normalize(schema, response.state))?;
            Ok::<_, Vec<Diagnostic>>((state, response.diagnostics, response.deferred))
        }
        .await;

        let response = match result {
            Ok((state, diagnostics, deferred)) => proto::read_data_source::Response {
                state,
                diagnostics: diagnostics_to_proto(diagnostics),
                deferred: deferred.map(deferred_to_proto),
            },
            Err(diags) => proto::read_data_source::Response {
                state: None,
                diagnostics: diagnostics_to_proto(diags),
                deferred: None,
            },
        };
        Ok(Response::new(response))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> Result<Response<proto::stop_provider::Response>, Status> {
        info!("stop requested, cancelling in-flight operations");
        self.stop.cancel();
        Ok(Response::new(proto::stop_provider::Response {
            error: String::new(),
        }))
    }
}

/// go-plugin controller; Terraform calls Shutdown when it is done with the plugin
pub struct GrpcControllerService {
    shutdown: Context,
}

impl GrpcControllerService {
    pub fn new(shutdown: Context) -> Self {
        Self { shutdown }
    }
}

#[tonic::async_trait]
impl proto::plugin::grpc_controller_server::GrpcController for GrpcControllerService {
    async fn shutdown(
        &self,
        _request: Request<proto::plugin::Empty>,
    ) -> Result<Response<proto::plugin::Empty>, Status> {
        info!("shutdown requested by terraform");
        self.shutdown.cancel();
        Ok(Response::new(proto::plugin::Empty {}))
    }
}

fn server_capabilities() -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: false,
        get_provider_schema_optional: false,
        move_resource_state: false,
    }
}

fn unknown_type(kind: &str, type_name: &str) -> Diagnostic {
    Diagnostic::error(
        format!("Unknown {} type", kind),
        format!("The {} type {:?} is not supported by this provider.", kind, type_name),
    )
}

/// Stored and returned states always carry every schema member and never
/// contain unknown values
fn normalize(schema: &Schema, state: DynamicValue) -> DynamicValue {
    if state.is_null() {
        return state;
    }
    DynamicValue::new(schema.block.conform(state.value).unknown_as_null())
}

fn upgrade_raw_state(
    schema: &Schema,
    version: i64,
    raw_state: RawState,
) -> Result<DynamicValue, Diagnostic> {
    if version > schema.version {
        return Err(Diagnostic::error(
            "Unsupported state version",
            format!(
                "The stored state has schema version {}, newer than the provider's version {}. Upgrade the provider.",
                version, schema.version
            ),
        ));
    }

    match (raw_state.json, raw_state.flatmap) {
        (Some(json), _) => {
            let state = DynamicValue::decode_json(&json)
                .map_err(|e| Diagnostic::error("Invalid stored state", e.to_string()))?;
            Ok(DynamicValue::new(schema.block.conform(state.value)))
        }
        (None, Some(_)) => Err(Diagnostic::error(
            "Unsupported state format",
            "Flatmap state from Terraform 0.11 and earlier cannot be upgraded by this provider.",
        )),
        (None, None) => Ok(DynamicValue::null()),
    }
}

fn decode_value(value: Option<proto::DynamicValue>) -> Result<DynamicValue, Vec<Diagnostic>> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };

    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)
    } else if !value.json.is_empty() {
        DynamicValue::decode_json(&value.json)
    } else {
        Ok(DynamicValue::null())
    };
    decoded.map_err(|e| vec![Diagnostic::error("Failed to decode value", e.to_string())])
}

fn encode_value(value: &DynamicValue) -> Result<Option<proto::DynamicValue>, Vec<Diagnostic>> {
    let msgpack = value
        .encode_msgpack()
        .map_err(|e| vec![Diagnostic::error("Failed to encode value", e.to_string())])?;
    Ok(Some(proto::DynamicValue {
        msgpack,
        json: vec![],
    }))
}

fn provider_meta(value: Option<proto::DynamicValue>) -> Option<DynamicValue> {
    decode_value(value).ok().filter(|v| !v.is_null())
}

fn client_capabilities(caps: Option<proto::ClientCapabilities>) -> ClientCapabilities {
    caps.map(|c| ClientCapabilities {
        deferral_allowed: c.deferral_allowed,
        write_only_attributes_allowed: c.write_only_attributes_allowed,
    })
    .unwrap_or_default()
}

fn deferred_to_proto(deferred: Deferred) -> proto::Deferred {
    let reason = match deferred.reason {
        DeferredReason::Unknown => proto::deferred::Reason::Unknown,
        DeferredReason::ResourceConfigUnknown => proto::deferred::Reason::ResourceConfigUnknown,
        DeferredReason::ProviderConfigUnknown => proto::deferred::Reason::ProviderConfigUnknown,
        DeferredReason::AbsentPrereq => proto::deferred::Reason::AbsentPrereq,
    };
    proto::Deferred {
        reason: reason as i32,
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
            } as i32,
            summary: d.summary,
            detail: d.detail,
            attribute: d.attribute.as_ref().map(path_to_proto),
        })
        .collect()
}

fn path_to_proto(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn string_kind(kind: StringKind) -> i32 {
    match kind {
        StringKind::Plain => proto::StringKind::Plain as i32,
        StringKind::Markdown => proto::StringKind::Markdown as i32,
    }
}

fn block_to_proto(block: &Block) -> proto::schema::Block {
    proto::schema::Block {
        version: block.version,
        attributes: block.attributes.iter().map(attribute_to_proto).collect(),
        block_types: block.block_types.iter().map(nested_block_to_proto).collect(),
        description: block.description.clone(),
        description_kind: string_kind(block.description_kind),
        deprecated: block.deprecated,
    }
}

fn attribute_to_proto(attr: &Attribute) -> proto::schema::Attribute {
    proto::schema::Attribute {
        name: attr.name.clone(),
        r#type: attr.r#type.type_bytes(),
        description: attr.description.clone(),
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        sensitive: attr.sensitive,
        description_kind: string_kind(StringKind::Plain),
        deprecated: attr.deprecated,
    }
}

fn nested_block_to_proto(nested: &NestedBlock) -> proto::schema::NestedBlock {
    use proto::schema::nested_block::NestingMode as ProtoNesting;

    let nesting = match nested.nesting {
        NestingMode::Single => ProtoNesting::Single,
        NestingMode::List => ProtoNesting::List,
        NestingMode::Set => ProtoNesting::Set,
    };
    proto::schema::NestedBlock {
        type_name: nested.type_name.clone(),
        block: Some(block_to_proto(&nested.block)),
        nesting: nesting as i32,
        min_items: nested.min_items,
        max_items: nested.max_items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
    use crate::types::Dynamic;
    use std::collections::HashMap as Map;

    fn schema() -> Schema {
        SchemaBuilder::new()
            .attribute(AttributeBuilder::new("id", AttributeType::String).computed().build())
            .attribute(AttributeBuilder::new("name", AttributeType::String).required().build())
            .build()
    }

    #[test]
    fn upgrade_drops_unknown_attributes() {
        let raw = RawState {
            json: Some(br#"{"id":"abc","name":"demo","legacy_field":true}"#.to_vec()),
            flatmap: None,
        };

        let upgraded = upgrade_raw_state(&schema(), 0, raw).unwrap();
        let members = upgraded.value.as_map().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members["id"], Dynamic::from("abc"));
    }

    #[test]
    fn upgrade_rejects_flatmap_and_newer_versions() {
        let flatmap = RawState {
            json: None,
            flatmap: Some(Map::from([("id".to_string(), "abc".to_string())])),
        };
        assert!(upgrade_raw_state(&schema(), 0, flatmap).is_err());

        let newer = RawState {
            json: Some(b"{}".to_vec()),
            flatmap: None,
        };
        assert!(upgrade_raw_state(&schema(), 3, newer).is_err());
    }

    #[test]
    fn normalize_fills_members_and_clears_unknowns() {
        let state = DynamicValue::new(Dynamic::Map(Map::from([(
            "id".to_string(),
            Dynamic::Unknown,
        )])));

        let normalized = normalize(&schema(), state);
        assert!(normalized.get(&AttributePath::new("id")).is_null());
        assert!(normalized.get(&AttributePath::new("name")).is_null());
        assert!(normalize(&schema(), DynamicValue::null()).is_null());
    }

    #[test]
    fn diagnostic_attribute_path_converts() {
        let diags = diagnostics_to_proto(vec![Diagnostic::warning("w", "d")
            .with_attribute(AttributePath::new("member").index(0).attribute("host"))]);

        assert_eq!(diags[0].severity, proto::diagnostic::Severity::Warning as i32);
        assert_eq!(diags[0].attribute.as_ref().unwrap().steps.len(), 3);
    }

    #[test]
    fn decode_prefers_msgpack_and_treats_empty_as_null() {
        assert!(decode_value(None).unwrap().is_null());
        assert!(decode_value(Some(proto::DynamicValue::default()))
            .unwrap()
            .is_null());

        let json = proto::DynamicValue {
            msgpack: vec![],
            json: br#"{"name":"x"}"#.to_vec(),
        };
        let decoded = decode_value(Some(json)).unwrap();
        assert_eq!(decoded.get_string(&AttributePath::new("name")).unwrap(), "x");
    }
}
