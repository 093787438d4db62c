//! Application Operations Management resources

pub mod alarm_spec;
pub mod resource_alarm_rule;
pub mod resource_alarm_rules_template;

pub use resource_alarm_rule::AomAlarmRuleResource;
pub use resource_alarm_rules_template::AomAlarmRulesTemplateResource;
