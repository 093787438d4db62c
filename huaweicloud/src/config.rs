//! Provider configuration: credentials, region, endpoints and the IAM
//! lookups that fill in project and domain ids.

use std::collections::HashMap;
use std::time::Duration;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tokio::sync::RwLock;

use crate::api::{ApiError, Client, RetryConfig, ServiceClient};

pub const DEFAULT_CLOUD: &str = "myhuaweicloud.com";
pub const DEFAULT_MAX_RETRIES: i64 = 5;

/// Services served from a single global endpoint rather than per region
const GLOBAL_SERVICES: [&str; 2] = ["rms", "iam"];

/// Settings as written in the provider block, with environment fallbacks
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub security_token: Option<String>,
    pub project_id: String,
    pub domain_id: String,
    pub enterprise_project_id: String,
    pub cloud: String,
    pub endpoints: HashMap<String, String>,
    pub insecure: bool,
    pub max_retries: u32,
}

impl Settings {
    pub fn from_config(config: &DynamicValue) -> Result<Self, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();

        let region = string_setting(config, "region", "HW_REGION_NAME");
        let access_key = string_setting(config, "access_key", "HW_ACCESS_KEY");
        let secret_key = string_setting(config, "secret_key", "HW_SECRET_KEY");

        if region.is_none() {
            diagnostics.push(
                Diagnostic::error(
                    "region is required",
                    "Set region in the provider configuration or the HW_REGION_NAME environment variable",
                )
                .with_attribute(AttributePath::new("region")),
            );
        }
        if access_key.is_none() {
            diagnostics.push(
                Diagnostic::error(
                    "access_key is required",
                    "Set access_key in the provider configuration or the HW_ACCESS_KEY environment variable",
                )
                .with_attribute(AttributePath::new("access_key")),
            );
        }
        if secret_key.is_none() {
            diagnostics.push(
                Diagnostic::error(
                    "secret_key is required",
                    "Set secret_key in the provider configuration or the HW_SECRET_KEY environment variable",
                )
                .with_attribute(AttributePath::new("secret_key")),
            );
        }

        let max_retries = match config.get(&AttributePath::new("max_retries")).as_i64() {
            Some(n) => n,
            None => std::env::var("HW_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
        };
        let max_retries = u32::try_from(max_retries).unwrap_or_else(|_| {
            diagnostics.push(
                Diagnostic::error(
                    "Invalid max_retries",
                    format!(
                        "max_retries should be between 0 and {}, got {}",
                        u32::MAX,
                        max_retries
                    ),
                )
                .with_attribute(AttributePath::new("max_retries")),
            );
            0
        });

        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let endpoints = config
            .get(&AttributePath::new("endpoints"))
            .as_map()
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                    .filter(|(_, v)| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let insecure = config
            .get(&AttributePath::new("insecure"))
            .as_bool()
            .or_else(|| {
                std::env::var("HW_INSECURE")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok())
            })
            .unwrap_or(false);

        Ok(Self {
            region: region.unwrap_or_default(),
            access_key: access_key.unwrap_or_default(),
            secret_key: secret_key.unwrap_or_default(),
            security_token: string_setting(config, "security_token", "HW_SECURITY_TOKEN"),
            project_id: string_setting(config, "project_id", "HW_PROJECT_ID").unwrap_or_default(),
            domain_id: string_setting(config, "domain_id", "HW_DOMAIN_ID").unwrap_or_default(),
            enterprise_project_id: string_setting(
                config,
                "enterprise_project_id",
                "HW_ENTERPRISE_PROJECT_ID",
            )
            .unwrap_or_default(),
            cloud: string_setting(config, "cloud", "HW_CLOUD")
                .unwrap_or_else(|| DEFAULT_CLOUD.to_string()),
            endpoints,
            insecure,
            max_retries,
        })
    }
}

fn string_setting(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    config
        .get(&AttributePath::new(name))
        .as_str()
        .map(str::to_string)
        .or_else(|| std::env::var(env).ok())
        .filter(|v| !v.is_empty())
}

/// The configured provider, shared by every resource through provider data
pub struct Config {
    pub region: String,
    pub project_id: String,
    pub domain_id: String,
    pub enterprise_project_id: String,
    pub cloud: String,
    pub endpoints: HashMap<String, String>,
    /// Interval between status polls while waiting on remote operations
    pub poll_interval: Duration,
    client: Client,
    region_projects: RwLock<HashMap<String, String>>,
}

impl Config {
    pub fn new(settings: Settings) -> Result<Self, ApiError> {
        let retry = RetryConfig {
            max_retries: settings.max_retries,
            ..RetryConfig::default()
        };
        let client = Client::with_config(
            &settings.access_key,
            &settings.secret_key,
            settings.security_token.clone(),
            settings.insecure,
            retry,
        )?;

        let mut endpoints = HashMap::new();
        for (service, url) in settings.endpoints {
            let url = if url.ends_with('/') { url } else { format!("{}/", url) };
            endpoints.insert(service, url);
        }

        Ok(Self {
            region: settings.region,
            project_id: settings.project_id,
            domain_id: settings.domain_id,
            enterprise_project_id: settings.enterprise_project_id,
            cloud: settings.cloud,
            endpoints,
            poll_interval: Duration::from_secs(10),
            client,
            region_projects: RwLock::new(HashMap::new()),
        })
    }

    /// Look up the project and domain ids the user left unset. Failures are
    /// reported as warnings and leave the value empty.
    pub async fn resolve_ids(&mut self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let iam = self.global_client("iam");

        if self.project_id.is_empty() {
            match iam.iam().project_id(&self.region).await {
                Ok(Some(id)) => {
                    tracing::info!("Resolved project {} for region {}", id, self.region);
                    self.project_id = id;
                }
                Ok(None) => diagnostics.push(Diagnostic::warning(
                    "Unable to resolve project ID",
                    format!("No IAM project is named after region {}", self.region),
                )),
                Err(e) => diagnostics.push(Diagnostic::warning(
                    "Unable to resolve project ID",
                    format!("API error: {}", e),
                )),
            }
        }

        if self.domain_id.is_empty() {
            match iam.iam().domain_id().await {
                Ok(Some(id)) => self.domain_id = id,
                Ok(None) => diagnostics.push(Diagnostic::warning(
                    "Unable to resolve domain ID",
                    "IAM returned no domain for these credentials",
                )),
                Err(e) => diagnostics.push(Diagnostic::warning(
                    "Unable to resolve domain ID",
                    format!("API error: {}", e),
                )),
            }
        }

        for warning in &diagnostics {
            tracing::warn!("{}: {}", warning.summary, warning.detail);
        }
        diagnostics
    }

    /// Custom endpoint when configured, otherwise the public one
    pub fn endpoint(&self, service: &str, region: &str) -> String {
        if let Some(url) = self.endpoints.get(service) {
            return url.clone();
        }
        if GLOBAL_SERVICES.contains(&service) {
            format!("https://{}.{}/", service, self.cloud)
        } else {
            format!("https://{}.{}.{}/", service, region, self.cloud)
        }
    }

    /// Client for a regional, project scoped service
    pub async fn service_client(
        &self,
        service: &str,
        region: &str,
    ) -> Result<ServiceClient, ApiError> {
        let project_id = self.project_id_for(region).await?;
        Ok(ServiceClient::new(
            self.client.clone(),
            &self.endpoint(service, region),
            &project_id,
            &self.domain_id,
        )
        .project_scoped())
    }

    /// Client for a global, domain scoped service such as RMS
    pub fn domain_client(&self, service: &str) -> ServiceClient {
        self.global_client(service)
    }

    fn global_client(&self, service: &str) -> ServiceClient {
        ServiceClient::new(
            self.client.clone(),
            &self.endpoint(service, &self.region),
            &self.project_id,
            &self.domain_id,
        )
    }

    async fn project_id_for(&self, region: &str) -> Result<String, ApiError> {
        if region == self.region && !self.project_id.is_empty() {
            return Ok(self.project_id.clone());
        }
        if let Some(id) = self.region_projects.read().await.get(region) {
            return Ok(id.clone());
        }

        let id = self
            .global_client("iam")
            .iam()
            .project_id(region)
            .await?
            .ok_or_else(|| {
                ApiError::ParseError(format!("no IAM project found for region {}", region))
            })?;
        self.region_projects
            .write()
            .await
            .insert(region.to_string(), id.clone());
        Ok(id)
    }

    /// The resource's own `region`, falling back to the provider region
    pub fn get_region(&self, state: &DynamicValue) -> String {
        non_empty(state.get(&AttributePath::new("region")))
            .unwrap_or_else(|| self.region.clone())
    }

    /// The resource's `enterprise_project_id`, falling back to the provider default
    pub fn get_enterprise_project_id(&self, state: &DynamicValue) -> String {
        non_empty(state.get(&AttributePath::new("enterprise_project_id")))
            .unwrap_or_else(|| self.enterprise_project_id.clone())
    }
}

fn non_empty(value: &Dynamic) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn settings() -> Settings {
        Settings {
            region: "cn-north-4".to_string(),
            access_key: "AK".to_string(),
            secret_key: "SK".to_string(),
            cloud: DEFAULT_CLOUD.to_string(),
            max_retries: 0,
            ..Settings::default()
        }
    }

    #[test]
    fn endpoints_follow_region_and_cloud() {
        let mut s = settings();
        s.endpoints
            .insert("aom".to_string(), "https://aom.example.com".to_string());
        let config = Config::new(s).unwrap();

        assert_eq!(
            config.endpoint("apig", "cn-north-4"),
            "https://apig.cn-north-4.myhuaweicloud.com/"
        );
        assert_eq!(config.endpoint("rms", "cn-north-4"), "https://rms.myhuaweicloud.com/");
        assert_eq!(config.endpoint("aom", "cn-north-4"), "https://aom.example.com/");
    }

    #[test]
    fn resource_region_overrides_provider_region() {
        let config = Config::new(settings()).unwrap();

        let mut state = DynamicValue::object();
        assert_eq!(config.get_region(&state), "cn-north-4");

        state
            .set_string(&AttributePath::new("region"), "ap-southeast-1".to_string())
            .unwrap();
        assert_eq!(config.get_region(&state), "ap-southeast-1");
    }

    #[test]
    fn settings_reject_negative_retries() {
        let mut config = DynamicValue::object();
        for (k, v) in [("region", "r"), ("access_key", "a"), ("secret_key", "s")] {
            config.set_string(&AttributePath::new(k), v.to_string()).unwrap();
        }
        config.set_number(&AttributePath::new("max_retries"), -1.0).unwrap();

        let diags = Settings::from_config(&config).unwrap_err();
        assert_eq!(diags[0].summary, "Invalid max_retries");

        config
            .set_number(&AttributePath::new("max_retries"), 5_000_000_000.0)
            .unwrap();
        let diags = Settings::from_config(&config).unwrap_err();
        assert_eq!(diags[0].summary, "Invalid max_retries");
        assert_eq!(diags[0].attribute, Some(AttributePath::new("max_retries")));

        config.set_number(&AttributePath::new("max_retries"), 100.0).unwrap();
        assert_eq!(Settings::from_config(&config).unwrap().max_retries, 100);
    }

    #[tokio::test]
    async fn other_regions_resolve_their_project_once() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/v3/projects")
            .match_query(Matcher::UrlEncoded("name".into(), "ap-southeast-1".into()))
            .with_status(200)
            .with_body(r#"{"projects": [{"id": "p-ap"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let mut s = settings();
        s.project_id = "p-cn".to_string();
        s.endpoints.insert("iam".to_string(), server.url());
        let config = Config::new(s).unwrap();

        let home = config.service_client("apig", "cn-north-4").await.unwrap();
        assert_eq!(home.project_id(), "p-cn");

        for _ in 0..2 {
            let other = config.service_client("apig", "ap-southeast-1").await.unwrap();
            assert_eq!(other.project_id(), "p-ap");
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_lookups_become_warnings() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/v3/projects")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error_code": "IAM.0001", "error_msg": "forbidden"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/v3/auth/domains")
            .with_status(200)
            .with_body(r#"{"domains": [{"id": "d-1"}]}"#)
            .create_async()
            .await;

        let mut s = settings();
        s.endpoints.insert("iam".to_string(), server.url());
        let mut config = Config::new(s).unwrap();

        let warnings = config.resolve_ids().await;
        assert_eq!(warnings.len(), 1);
        assert!(!warnings[0].is_error());
        assert_eq!(config.project_id, "");
        assert_eq!(config.domain_id, "d-1");
    }
}
