//! Attribute validators run against known configuration values

use crate::types::{AttributePath, Diagnostic, Dynamic};

pub trait Validator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>);
}

pub struct StringOneOf {
    pub values: Vec<String>,
}

impl StringOneOf {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.values.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_str() {
            if !self.values.iter().any(|v| v == s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", path),
                        format!("expected one of {:?}, got {:?}", self.values, s),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

pub struct StringLengthBetween {
    pub min: usize,
    pub max: usize,
}

impl Validator for StringLengthBetween {
    fn description(&self) -> String {
        format!("string length must be between {} and {}", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if len < self.min || len > self.max {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid length for {}", path),
                        format!(
                            "length must be between {} and {}, got {}",
                            self.min, self.max, len
                        ),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

pub struct NumberBetween {
    pub min: f64,
    pub max: f64,
}

impl Validator for NumberBetween {
    fn description(&self) -> String {
        format!("value must be between {} and {}", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(n) = value.as_f64() {
            if n < self.min || n > self.max {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Value out of range for {}", path),
                        format!("expected {} to {}, got {}", self.min, self.max, n),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

pub struct ListLengthAtMost {
    pub max: usize,
}

impl Validator for ListLengthAtMost {
    fn description(&self) -> String {
        format!("at most {} items", self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Dynamic::List(items) = value {
            if items.len() > self.max {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Too many items in {}", path),
                        format!("{} must have at most {} items, got {}", path, self.max, items.len()),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_one_of_rejects_unlisted_value() {
        let validator = StringOneOf::new(["SECOND", "MINUTE", "HOUR", "DAY"]);
        let mut diags = vec![];

        validator.validate(
            &Dynamic::from("WEEK"),
            &AttributePath::new("period_unit"),
            &mut diags,
        );

        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("period_unit"));
        assert_eq!(diags[0].attribute, Some(AttributePath::new("period_unit")));
    }

    #[test]
    fn string_one_of_accepts_listed_value() {
        let validator = StringOneOf::new(["builtin", "custom"]);
        let mut diags = vec![];

        validator.validate(&Dynamic::from("custom"), &AttributePath::new("type"), &mut diags);

        assert!(diags.is_empty());
    }

    #[test]
    fn string_length_counts_characters() {
        let validator = StringLengthBetween { min: 3, max: 5 };
        let mut diags = vec![];

        validator.validate(&Dynamic::from("通道名称"), &AttributePath::new("name"), &mut diags);
        assert!(diags.is_empty());

        validator.validate(&Dynamic::from("ab"), &AttributePath::new("name"), &mut diags);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn number_between_ignores_non_numbers() {
        let validator = NumberBetween { min: 1.0, max: 4.0 };
        let mut diags = vec![];

        validator.validate(&Dynamic::Null, &AttributePath::new("balance_strategy"), &mut diags);
        validator.validate(&Dynamic::from(5.0), &AttributePath::new("balance_strategy"), &mut diags);

        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn list_length_at_most() {
        let validator = ListLengthAtMost { max: 1 };
        let mut diags = vec![];

        validator.validate(
            &Dynamic::from(vec!["a", "b"]),
            &AttributePath::new("excluded_accounts"),
            &mut diags,
        );

        assert_eq!(diags.len(), 1);
    }
}
