//! Application Operations Management (AOM) v4 alarm endpoints

pub mod alarm_rule_templates;
pub mod alarm_rules;

pub use alarm_rule_templates::AlarmRuleTemplatesApi;
pub use alarm_rules::AlarmRulesApi;

use crate::api::client::ServiceClient;

pub struct AomApi<'a> {
    client: &'a ServiceClient,
}

impl<'a> AomApi<'a> {
    pub fn new(client: &'a ServiceClient) -> Self {
        Self { client }
    }

    pub fn alarm_rules(&self) -> AlarmRulesApi<'a> {
        AlarmRulesApi::new(self.client)
    }

    pub fn alarm_rule_templates(&self) -> AlarmRuleTemplatesApi<'a> {
        AlarmRuleTemplatesApi::new(self.client)
    }
}
