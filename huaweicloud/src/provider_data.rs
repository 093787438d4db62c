//! Provider data structure passed to resources and data sources

use crate::config::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct HuaweiCloudProviderData {
    pub config: Arc<Config>,
}

impl HuaweiCloudProviderData {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}
