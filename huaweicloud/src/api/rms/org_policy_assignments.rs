//! Policy assignments deployed across an organization. Create and update
//! share one PUT; progress is tracked through a separate status endpoint.

use serde_json::Value;

use crate::api::client::ServiceClient;
use crate::api::common::QueryParams;
use crate::api::error::ApiError;
use crate::api::pathsearch;

pub const CREATE_SUCCESSFUL: &str = "CREATE_SUCCESSFUL";
pub const CREATE_IN_PROGRESS: &str = "CREATE_IN_PROGRESS";
pub const UPDATE_SUCCESSFUL: &str = "UPDATE_SUCCESSFUL";
pub const UPDATE_IN_PROGRESS: &str = "UPDATE_IN_PROGRESS";
pub const DELETE_IN_PROGRESS: &str = "DELETE_IN_PROGRESS";

pub struct OrgPolicyAssignmentsApi<'a> {
    client: &'a ServiceClient,
    base: String,
}

impl<'a> OrgPolicyAssignmentsApi<'a> {
    pub(crate) fn new(client: &'a ServiceClient, organization_base: String) -> Self {
        Self {
            client,
            base: organization_base,
        }
    }

    /// Create or update, returning the assignment id
    pub async fn put(&self, body: Value) -> Result<String, ApiError> {
        let response = self
            .client
            .put(&format!("{}/policy-assignments", self.base), body)
            .await?;
        pathsearch::search_string("organization_policy_assignment_id", &response)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ApiError::ParseError(
                    "unable to find the organization policy assignment ID in the response"
                        .to_string(),
                )
            })
    }

    pub async fn get(&self, id: &str) -> Result<Value, ApiError> {
        self.client
            .get(&format!("{}/policy-assignments/{}", self.base, id))
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .delete(&format!("{}/policy-assignments/{}", self.base, id))
            .await?;
        Ok(())
    }

    /// Deployment status of one assignment. An empty string means the
    /// service no longer reports it.
    pub async fn status(&self, id: &str) -> Result<(Value, String), ApiError> {
        let path = QueryParams::new()
            .add("organization_policy_assignment_id", id)
            .append_to(&format!("{}/policy-assignment-statuses", self.base));
        let body = self.client.get(&path).await?;
        let status =
            pathsearch::search_string("value[0].organization_policy_assignment_status", &body)
                .unwrap_or_default();
        Ok((body, status))
    }
}
