//! Resource implementations

pub mod aom;
pub mod apig;
pub mod common;
pub mod rms;

pub use aom::{AomAlarmRuleResource, AomAlarmRulesTemplateResource};
pub use apig::{
    ApigApiResource, ApigChannelResource, ApigEnvironmentResource, ApigGroupResource,
    ApigThrottlingPolicyResource,
};
pub use rms::{
    RmsOrganizationalAssignmentPackageResource, RmsOrganizationalPolicyAssignmentResource,
    RmsPolicyAssignmentResource,
};
