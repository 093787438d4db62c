#![recursion_limit = "256"]

pub mod api;
pub mod config;
pub mod data_sources;
pub mod provider_data;
pub mod resources;

#[cfg(test)]
pub mod test_helpers;

pub use provider_data::HuaweiCloudProviderData;

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::data_source::DataSourceWithConfigure;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::Diagnostic;

use config::{Config, Settings};

#[derive(Default)]
pub struct HuaweiCloudProvider;

impl HuaweiCloudProvider {
    pub fn new() -> Self {
        Self
    }
}

fn resource<R>() -> ResourceFactory
where
    R: ResourceWithConfigure + Default + 'static,
{
    Box::new(|| Box::new(R::default()) as Box<dyn ResourceWithConfigure>)
}

fn data_source<D>() -> DataSourceFactory
where
    D: DataSourceWithConfigure + Default + 'static,
{
    Box::new(|| Box::new(D::default()) as Box<dyn DataSourceWithConfigure>)
}

#[async_trait]
impl Provider for HuaweiCloudProvider {
    fn type_name(&self) -> &str {
        "huaweicloud"
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: self.type_name().to_string(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let optional = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .build()
        };
        let secret = |name: &str, description: &str| {
            AttributeBuilder::new(name, AttributeType::String)
                .description(description)
                .optional()
                .sensitive()
                .build()
        };

        let schema = SchemaBuilder::new()
            .version(0)
            .description("HuaweiCloud provider")
            .attribute(optional(
                "region",
                "The region to manage resources in. Can also be set with HW_REGION_NAME",
            ))
            .attribute(secret(
                "access_key",
                "The access key (AK). Can also be set with HW_ACCESS_KEY",
            ))
            .attribute(secret(
                "secret_key",
                "The secret key (SK). Can also be set with HW_SECRET_KEY",
            ))
            .attribute(secret(
                "security_token",
                "The security token of temporary credentials. Can also be set with HW_SECURITY_TOKEN",
            ))
            .attribute(optional(
                "project_id",
                "The project ID; looked up from the region when unset",
            ))
            .attribute(optional(
                "domain_id",
                "The account (domain) ID; looked up from the credentials when unset",
            ))
            .attribute(optional(
                "enterprise_project_id",
                "The default enterprise project ID",
            ))
            .attribute(optional(
                "cloud",
                "The endpoint suffix, defaults to myhuaweicloud.com",
            ))
            .attribute(
                AttributeBuilder::new("endpoints", AttributeType::map(AttributeType::String))
                    .description("Custom endpoints keyed by service name, e.g. apig or rms")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("insecure", AttributeType::Bool)
                    .description("Skip TLS certificate verification")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_retries", AttributeType::Number)
                    .description("How often throttled or failed requests are retried, default 5")
                    .optional()
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let settings = match Settings::from_config(&request.config) {
            Ok(settings) => settings,
            Err(diagnostics) => {
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                };
            }
        };
        let region = settings.region.clone();

        let mut config = match Config::new(settings) {
            Ok(config) => config,
            Err(e) => {
                return ConfigureProviderResponse {
                    diagnostics: vec![Diagnostic::error(
                        "Failed to create API client",
                        e.to_string(),
                    )],
                    provider_data: None,
                };
            }
        };
        let diagnostics = config.resolve_ids().await;
        tracing::info!("Configured HuaweiCloud provider for region {}", region);

        ConfigureProviderResponse {
            diagnostics,
            provider_data: Some(
                Arc::new(HuaweiCloudProviderData::new(config)) as Arc<dyn Any + Send + Sync>
            ),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        use resources::*;

        HashMap::from([
            (
                "huaweicloud_apig_throttling_policy".to_string(),
                resource::<ApigThrottlingPolicyResource>(),
            ),
            (
                "huaweicloud_apig_api".to_string(),
                resource::<ApigApiResource>(),
            ),
            (
                "huaweicloud_apig_channel".to_string(),
                resource::<ApigChannelResource>(),
            ),
            (
                "huaweicloud_apig_group".to_string(),
                resource::<ApigGroupResource>(),
            ),
            (
                "huaweicloud_apig_environment".to_string(),
                resource::<ApigEnvironmentResource>(),
            ),
            (
                "huaweicloud_rms_policy_assignment".to_string(),
                resource::<RmsPolicyAssignmentResource>(),
            ),
            (
                "huaweicloud_rms_organizational_policy_assignment".to_string(),
                resource::<RmsOrganizationalPolicyAssignmentResource>(),
            ),
            (
                "huaweicloud_rms_organizational_assignment_package".to_string(),
                resource::<RmsOrganizationalAssignmentPackageResource>(),
            ),
            (
                "huaweicloud_aomv4_alarm_rule".to_string(),
                resource::<AomAlarmRuleResource>(),
            ),
            (
                "huaweicloud_aom_alarm_rules_template".to_string(),
                resource::<AomAlarmRulesTemplateResource>(),
            ),
        ])
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        use data_sources::*;

        HashMap::from([
            (
                "huaweicloud_apig_api".to_string(),
                data_source::<ApigApiDataSource>(),
            ),
            (
                "huaweicloud_apig_environments".to_string(),
                data_source::<ApigEnvironmentsDataSource>(),
            ),
            (
                "huaweicloud_rms_policy_assignments".to_string(),
                data_source::<RmsPolicyAssignmentsDataSource>(),
            ),
        ])
    }
}
