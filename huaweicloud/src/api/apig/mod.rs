//! API Gateway (APIG) dedicated instance endpoints

pub mod apis;
pub mod channels;
pub mod envs;
pub mod groups;
pub mod throttles;

pub use apis::ApisApi;
pub use channels::ChannelsApi;
pub use envs::{EnvironmentRequest, EnvironmentResponse, EnvsApi};
pub use groups::{ApiGroupRequest, ApiGroupResponse, GroupsApi};
pub use throttles::ThrottlesApi;

use crate::api::client::ServiceClient;

pub struct ApigApi<'a> {
    client: &'a ServiceClient,
}

impl<'a> ApigApi<'a> {
    pub fn new(client: &'a ServiceClient) -> Self {
        Self { client }
    }

    /// Every APIG object lives under a dedicated instance
    pub fn instance(&self, instance_id: &str) -> InstanceApi<'a> {
        InstanceApi {
            client: self.client,
            base: format!("v2/{{project_id}}/apigw/instances/{}", instance_id),
        }
    }
}

pub struct InstanceApi<'a> {
    client: &'a ServiceClient,
    base: String,
}

impl<'a> InstanceApi<'a> {
    pub fn throttles(&self) -> ThrottlesApi<'a> {
        ThrottlesApi::new(self.client, format!("{}/throttles", self.base))
    }

    pub fn channels(&self) -> ChannelsApi<'a> {
        ChannelsApi::new(self.client, format!("{}/vpc-channels", self.base))
    }

    pub fn groups(&self) -> GroupsApi<'a> {
        GroupsApi::new(self.client, format!("{}/api-groups", self.base))
    }

    pub fn envs(&self) -> EnvsApi<'a> {
        EnvsApi::new(self.client, format!("{}/envs", self.base))
    }

    pub fn apis(&self) -> ApisApi<'a> {
        ApisApi::new(self.client, format!("{}/apis", self.base))
    }
}
