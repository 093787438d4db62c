//! Shared fixtures for resource and data source tests

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tfplug::types::{Dynamic, DynamicValue};

use crate::config::{Config, Settings, DEFAULT_CLOUD};
use crate::HuaweiCloudProviderData;

pub const PROJECT_ID: &str = "p1";
pub const DOMAIN_ID: &str = "d1";

/// Provider data whose every service endpoint points at `url`, with
/// polling fast enough for tests
pub fn provider_data(url: &str) -> HuaweiCloudProviderData {
    let endpoints: HashMap<String, String> = ["apig", "rms", "aom", "iam"]
        .iter()
        .map(|s| (s.to_string(), url.to_string()))
        .collect();
    let settings = Settings {
        region: "cn-north-4".to_string(),
        access_key: "AK".to_string(),
        secret_key: "SK".to_string(),
        project_id: PROJECT_ID.to_string(),
        domain_id: DOMAIN_ID.to_string(),
        cloud: DEFAULT_CLOUD.to_string(),
        endpoints,
        max_retries: 0,
        ..Settings::default()
    };
    let mut config = Config::new(settings).unwrap();
    config.poll_interval = Duration::from_millis(10);
    HuaweiCloudProviderData::new(config)
}

pub fn value(json: Value) -> DynamicValue {
    DynamicValue::new(Dynamic::from(&json))
}
