//! API Gateway resources

pub mod resource_api;
pub mod resource_channel;
pub mod resource_environment;
pub mod resource_group;
pub mod resource_throttling_policy;

pub use resource_api::ApigApiResource;
pub use resource_channel::ApigChannelResource;
pub use resource_environment::ApigEnvironmentResource;
pub use resource_group::ApigGroupResource;
pub use resource_throttling_policy::ApigThrottlingPolicyResource;
