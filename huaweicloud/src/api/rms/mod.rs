//! Resource Management Service (RMS) policy and compliance endpoints.
//! RMS is a global service; paths are scoped by domain or organization.

pub mod org_conformance_packs;
pub mod org_policy_assignments;
pub mod policy_assignments;

pub use org_conformance_packs::OrgConformancePacksApi;
pub use org_policy_assignments::OrgPolicyAssignmentsApi;
pub use policy_assignments::PolicyAssignmentsApi;

use crate::api::client::ServiceClient;

pub struct RmsApi<'a> {
    client: &'a ServiceClient,
}

impl<'a> RmsApi<'a> {
    pub fn new(client: &'a ServiceClient) -> Self {
        Self { client }
    }

    pub fn policy_assignments(&self) -> PolicyAssignmentsApi<'a> {
        PolicyAssignmentsApi::new(self.client)
    }

    pub fn organization(&self, organization_id: &str) -> OrganizationApi<'a> {
        OrganizationApi {
            client: self.client,
            base: format!("v1/resource-manager/organizations/{}", organization_id),
        }
    }
}

pub struct OrganizationApi<'a> {
    client: &'a ServiceClient,
    base: String,
}

impl<'a> OrganizationApi<'a> {
    pub fn policy_assignments(&self) -> OrgPolicyAssignmentsApi<'a> {
        OrgPolicyAssignmentsApi::new(self.client, self.base.clone())
    }

    pub fn conformance_packs(&self) -> OrgConformancePacksApi<'a> {
        OrgConformancePacksApi::new(self.client, self.base.clone())
    }
}
