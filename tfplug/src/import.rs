//! Import helpers for simplifying resource import implementations

use crate::context::Context;
use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Sets the import ID to a specific attribute in state
///
/// Example: ID "f3a1..." -> state.id = "f3a1..."
pub fn import_state_passthrough_id(
    _ctx: &Context,
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
    response: &mut ImportResourceStateResponse,
) {
    let mut state = DynamicValue::object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!("Could not set attribute '{}' to value '{}'", attr_path, request.id),
            )
            .with_attribute(attr_path),
        );
        return;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
    });
}

/// Splits a composite import ID such as "<instance_id>/<name>".
/// The last part keeps any remaining separators.
pub fn parse_import_id(id: &str, parts: &[&str]) -> Result<Vec<String>, Diagnostic> {
    let split: Vec<String> = id.splitn(parts.len(), '/').map(str::to_string).collect();

    if split.len() != parts.len() || split.iter().any(String::is_empty) {
        let format = parts
            .iter()
            .map(|p| format!("<{}>", p))
            .collect::<Vec<_>>()
            .join("/");
        return Err(Diagnostic::error(
            "Invalid import ID",
            format!("invalid format specified for import ID, want '{}', but got '{}'", format, id),
        ));
    }

    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientCapabilities;

    #[test]
    fn passthrough_sets_id() {
        let request = ImportResourceStateRequest {
            type_name: "huaweicloud_rms_policy_assignment".to_string(),
            id: "65f3a".to_string(),
            client_capabilities: ClientCapabilities::default(),
        };
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        };

        import_state_passthrough_id(&Context::new(), AttributePath::new("id"), &request, &mut response);

        assert_eq!(response.imported_resources.len(), 1);
        let state = &response.imported_resources[0].state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "65f3a");
    }

    #[test]
    fn parse_two_part_id() {
        let parts = parse_import_id("inst-1/my_policy", &["instance_id", "name"]).unwrap();
        assert_eq!(parts, vec!["inst-1", "my_policy"]);
    }

    #[test]
    fn parse_rejects_missing_part() {
        let err = parse_import_id("inst-1", &["instance_id", "name"]).unwrap_err();
        assert!(err.detail.contains("<instance_id>/<name>"));

        assert!(parse_import_id("inst-1/", &["instance_id", "id"]).is_err());
    }
}
