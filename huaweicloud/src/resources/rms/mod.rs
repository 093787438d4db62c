//! Resource Management Service resources. RMS is global, so none of these
//! carry a region.

pub mod resource_organizational_assignment_package;
pub mod resource_organizational_policy_assignment;
pub mod resource_policy_assignment;

pub use resource_organizational_assignment_package::RmsOrganizationalAssignmentPackageResource;
pub use resource_organizational_policy_assignment::RmsOrganizationalPolicyAssignmentResource;
pub use resource_policy_assignment::RmsPolicyAssignmentResource;
