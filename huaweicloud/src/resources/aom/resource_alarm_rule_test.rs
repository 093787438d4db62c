#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::test_helpers::{provider_data, value};
    use mockito::{Matcher, Server};
    use std::sync::Arc;
    use tfplug::types::ClientCapabilities;

    const RULES: &str = "/v4/p1/alarm-rules";

    async fn configured(url: &str) -> AomAlarmRuleResource {
        let mut resource = AomAlarmRuleResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new(provider_data(url))),
                },
            )
            .await;
        resource
    }

    fn notification() -> Value {
        json!({
            "notification_type": "direct",
            "route_group_enable": null,
            "route_group_rule": null,
            "notification_enable": true,
            "bind_notification_rule_id": "rule-notify",
            "notify_resolved": null,
            "notify_triggered": null,
            "notify_frequency": null
        })
    }

    fn metric_rule() -> DynamicValue {
        value(json!({
            "id": null,
            "region": null,
            "name": "cpu-high",
            "type": "metric",
            "prom_instance_id": "prom-1",
            "enable": null,
            "description": null,
            "enterprise_project_id": "eps-1",
            "status": null,
            "alarm_rule_id": null,
            "created_at": null,
            "updated_at": null,
            "alarm_notifications": [notification()],
            "event_alarm_spec": [],
            "metric_alarm_spec": [{
                "monitor_type": "all_metric",
                "monitor_objects": null,
                "recovery_conditions": [{"recovery_timeframe": 1}],
                "trigger_conditions": [{
                    "metric_query_mode": "PROM",
                    "metric_name": "aom_node_cpu_usage",
                    "promql": "label_replace(avg_over_time(aom_node_cpu_usage[59999ms]))",
                    "aggregation_window": "1m",
                    "query_match": null,
                    "query_param": "{\"code\":\"a\"}",
                    "metric_labels": null,
                    "aggregate_type": null,
                    "aggregation_type": "average",
                    "operator": ">",
                    "thresholds": {"Critical": "80"},
                    "trigger_times": "3",
                    "trigger_type": "FIXED_RATE",
                    "trigger_interval": "15s",
                    "expression": null,
                    "mix_promql": null,
                    "metric_statistic_method": null,
                    "metric_namespace": null,
                    "metric_unit": null,
                    "promql_expr": null,
                    "promql_for": null,
                    "aom_monitor_level": null
                }],
                "no_data_conditions": [],
                "alarm_tags": []
            }]
        }))
    }

    fn rule_listing() -> String {
        json!({
            "alarm_rules": [{
                "alarm_rule_id": 1700000000001_i64,
                "alarm_rule_name": "cpu-high",
                "alarm_rule_type": "metric",
                "alarm_rule_enable": true,
                "alarm_rule_status": "OK",
                "prom_instance_id": "prom-1",
                "enterprise_project_id": "eps-1",
                "alarm_create_time": 1709280000000_i64,
                "alarm_update_time": 1709280000000_i64,
                "alarm_notifications": {
                    "notification_type": "direct",
                    "notification_enable": true,
                    "bind_notification_rule_id": "rule-notify",
                    "notify_resolved": false,
                    "notify_triggered": false,
                    "route_group_enable": false,
                    "notify_frequency": -1
                },
                "metric_alarm_spec": {
                    "monitor_type": "all_metric",
                    "recovery_conditions": {"recovery_timeframe": 1},
                    "alarm_tags": [{"auto_tags": [], "custom_tags": [], "custom_annotations": []}],
                    "trigger_conditions": [{
                        "metric_query_mode": "PROM",
                        "metric_name": "aom_node_cpu_usage",
                        "promql": "label_replace(avg_over_time(aom_node_cpu_usage[59999ms]))",
                        "aggregation_window": "1m",
                        "query_param": {"code": "a"},
                        "aggregation_type": "average",
                        "operator": ">",
                        "thresholds": {"Critical": "80"},
                        "trigger_times": 3,
                        "trigger_type": "FIXED_RATE",
                        "trigger_interval": "15s"
                    }]
                }
            }]
        })
        .to_string()
    }

    #[test]
    fn metric_body_carries_required_empty_structures() {
        let body = AomAlarmRuleResource::build_body(&metric_rule());

        assert_eq!(body["alarm_rule_name"], json!("cpu-high"));
        assert!(body.get("event_alarm_spec").is_none());
        assert!(body.get("alarm_rule_enable").is_none());
        let spec = &body["metric_alarm_spec"];
        assert_eq!(spec["recovery_conditions"], json!({"recovery_timeframe": 1}));
        assert_eq!(
            spec["alarm_tags"],
            json!([{"auto_tags": [], "custom_annotations": [], "custom_tags": []}])
        );
        let condition = &spec["trigger_conditions"][0];
        assert_eq!(condition["query_param"], json!({"code": "a"}));
        assert!(condition.get("query_match").is_none());
        assert_eq!(
            body["alarm_notifications"],
            json!({"notification_type": "direct", "notification_enable": true,
                   "bind_notification_rule_id": "rule-notify"})
        );
    }

    #[tokio::test]
    async fn exactly_one_spec() {
        let mut config = metric_rule();
        config
            .set_list(&AttributePath::new("metric_alarm_spec"), vec![])
            .unwrap();

        let response = AomAlarmRuleResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: TYPE_NAME.to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Invalid alarm spec");
    }

    #[tokio::test]
    async fn create_uses_the_name_as_id() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", RULES)
            .match_query(Matcher::UrlEncoded("action_id".into(), "add-alarm-action".into()))
            .match_header("Enterprise-Project-Id", "eps-1")
            .match_body(Matcher::PartialJson(json!({
                "alarm_rule_name": "cpu-high", "alarm_rule_type": "metric"
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("GET", RULES)
            .match_query(Matcher::UrlEncoded("name".into(), "cpu-high".into()))
            .with_status(200)
            .with_body(rule_listing())
            .create_async()
            .await;

        let response = configured(&server.url())
            .await
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: metric_rule(),
                    config: metric_rule(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        create.assert_async().await;
        let state = &response.new_state;
        assert_eq!(get_str(state, "id"), "cpu-high");
        assert_eq!(get_str(state, "region"), "cn-north-4");
        assert_eq!(get_str(state, "alarm_rule_id"), "1700000000001");
        assert_eq!(get_str(state, "created_at"), "2024-03-01T08:00:00Z");
        assert!(state.get(&AttributePath::new("description")).is_null());

        let spec = &state.get(&AttributePath::new("metric_alarm_spec")).as_list().unwrap()[0];
        assert!(spec.attr("alarm_tags").as_list().unwrap().is_empty());
        let condition = &spec.attr("trigger_conditions").as_list().unwrap()[0];
        assert_eq!(condition.attr("trigger_times").as_str(), Some("3"));
        assert_eq!(
            condition.attr("query_param").as_str(),
            Some(r#"{"code":"a"}"#)
        );
    }

    #[tokio::test]
    async fn unchanged_rule_is_not_updated() {
        let mut server = Server::new_async().await;
        let update = server
            .mock("POST", RULES)
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        server
            .mock("GET", RULES)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(rule_listing())
            .create_async()
            .await;

        let mut prior = metric_rule();
        prior.set_string(&AttributePath::new("id"), "cpu-high".to_string()).unwrap();
        let response = configured(&server.url())
            .await
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: prior.clone(),
                    planned_state: prior.clone(),
                    config: prior,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        update.assert_async().await;
    }

    #[tokio::test]
    async fn read_drops_missing_rule() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", RULES)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"alarm_rules": []}"#)
            .create_async()
            .await;

        let response = configured(&server.url())
            .await
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: value(json!({"id": "cpu-high"})),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;

        assert!(response.new_state.is_none());
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn delete_skips_rules_that_are_already_gone() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", RULES)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"alarm_rules": []}"#)
            .create_async()
            .await;
        let delete = server
            .mock("DELETE", RULES)
            .expect(0)
            .create_async()
            .await;

        let response = configured(&server.url())
            .await
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: value(json!({"id": "cpu-high"})),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        delete.assert_async().await;
    }
}
