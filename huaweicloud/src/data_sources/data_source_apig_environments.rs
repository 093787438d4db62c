//! Environments of an APIG dedicated instance

use async_trait::async_trait;
use std::collections::BTreeMap;
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceMetadataRequest,
    DataSourceMetadataResponse, DataSourceSchemaRequest, DataSourceSchemaResponse,
    DataSourceWithConfigure, ReadDataSourceRequest, ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Dynamic, DynamicValue};
use uuid::Uuid;

use crate::resources::common::{
    api_error, format_rfc3339, get_str, not_configured, object, provider_data_from,
};
use crate::HuaweiCloudProviderData;

const TYPE_NAME: &str = "huaweicloud_apig_environments";

#[derive(Default)]
pub struct ApigEnvironmentsDataSource {
    provider_data: Option<HuaweiCloudProviderData>,
}

impl ApigEnvironmentsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataSource for ApigEnvironmentsDataSource {
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
        let environment = AttributeType::Object(BTreeMap::from([
            ("id".to_string(), AttributeType::String),
            ("name".to_string(), AttributeType::String),
            ("description".to_string(), AttributeType::String),
            ("created_at".to_string(), AttributeType::String),
        ]));

        let schema = SchemaBuilder::new()
            .version(0)
            .description("Lists the environments of an APIG dedicated instance")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("The data source ID")
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("region", AttributeType::String)
                    .description("The region of the instance; defaults to the provider region")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("instance_id", AttributeType::String)
                    .description("The ID of the dedicated instance")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Only return environments with this name")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("environments", AttributeType::list(environment))
                    .description("The matching environments")
                    .computed()
                    .build(),
            )
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
        let name = get_str(&request.config, "name");

        let result = match config.service_client("apig", &region).await {
            Ok(client) => client.apig().instance(&instance_id).envs().list(Some(&name)).await,
            Err(e) => Err(e),
        };

        let environments = match result {
            Ok(environments) => environments,
            Err(e) => {
                diagnostics.push(api_error("Failed to list APIG environments", e));
                return ReadDataSourceResponse {
                    state: DynamicValue::null(),
                    diagnostics,
                    deferred: None,
                };
            }
        };

        // the name query is a fuzzy match
        let environments: Vec<Dynamic> = environments
            .into_iter()
            .filter(|env| name.is_empty() || env.name == name)
            .map(|env| {
                object([
                    ("id", Dynamic::from(env.id)),
                    ("name", Dynamic::from(env.name)),
                    ("description", Dynamic::from(env.description)),
                    (
                        "created_at",
                        Dynamic::from(format_rfc3339(&env.create_time.unwrap_or_default())),
                    ),
                ])
            })
            .collect();
        tracing::debug!(
            "Found {} environments on instance {}",
            environments.len(),
            instance_id
        );

        let mut state = request.config;
        let _ = state.set_string(&AttributePath::new("id"), Uuid::new_v4().to_string());
        let _ = state.set_string(&AttributePath::new("region"), region);
        let _ = state.set_list(&AttributePath::new("environments"), environments);

        ReadDataSourceResponse {
            state,
            diagnostics,
            deferred: None,
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for ApigEnvironmentsDataSource {
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
