//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building Terraform providers in Rust, implementing the
//! Terraform Plugin Protocol v6 for providers that expose resources and data
//! sources.

// Core modules
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod data_source;
pub mod provider;
pub mod resource;

// Helper modules
pub mod import;
pub mod plan;
pub mod validate;
pub mod validator;

// Framework implementation modules
pub mod grpc;
pub mod proto;
pub mod server;

// Re-exports for convenience
pub use context::Context;
pub use data_source::{DataSource, DataSourceWithConfigure};
pub use error::{Result, TfplugError};
pub use import::{import_state_passthrough_id, parse_import_id};
pub use provider::{
    DataSourceFactory, Provider, ProviderMetadataRequest, ProviderMetadataResponse,
    ResourceFactory,
};
pub use resource::{Resource, ResourceWithConfigure, ResourceWithImportState};
pub use schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, Schema, SchemaBuilder};
pub use server::{serve, serve_default, LogLevel, ServerConfig};
pub use types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

