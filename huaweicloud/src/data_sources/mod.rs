//! Data source implementations

pub mod data_source_apig_api;
pub mod data_source_apig_environments;
pub mod data_source_rms_policy_assignments;

pub use data_source_apig_api::ApigApiDataSource;
pub use data_source_apig_environments::ApigEnvironmentsDataSource;
pub use data_source_rms_policy_assignments::RmsPolicyAssignmentsDataSource;
