//! Canonical tag handling
//!
//! Azure hands tags back in two shapes: a native `{"key": "value"}` object on
//! most resources, and a pre-joined `"key: value, key: value"` string where a
//! listing was flattened upstream. Both shapes parse into the same [`Tags`]
//! value, so everything downstream sees one representation.
//!
//! The `environment` key is reserved: it becomes a top-level environment
//! reference instead of a custom field.

use std::collections::BTreeMap;

use serde_json::Value;

use super::Environment;

/// Reserved tag key, matched case-insensitively
pub const ENVIRONMENT_KEY: &str = "environment";

/// Prefix applied to every tag key that lands in custom_fields
pub const CUSTOM_FIELD_PREFIX: &str = "az_lbl_";

/// Parsed tag set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    entries: Vec<(String, String)>,
}

impl Tags {
    /// Parse tags from the wire, accepting either a native mapping or a
    /// joined string. `None`, `null`, and anything else parse as empty.
    pub fn from_value(tags: Option<&Value>) -> Self {
        match tags {
            Some(Value::Object(map)) => {
                let entries = map
                    .iter()
                    .map(|(k, v)| {
                        let value = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.trim().to_string(), value.trim().to_string())
                    })
                    .collect();
                Self { entries }
            }
            Some(Value::String(joined)) => Self::from_joined(joined),
            _ => Self::default(),
        }
    }

    /// Parse the `"key: value, key: value"` form
    pub fn from_joined(joined: &str) -> Self {
        let entries = joined
            .split(',')
            .filter_map(|pair| {
                let mut parts = pair.splitn(2, ':');
                let key = parts.next()?.trim();
                if key.is_empty() {
                    return None;
                }
                let value = parts.next().unwrap_or("").trim();
                Some((key.to_string(), value.to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The reserved environment tag, if present with a non-empty value
    pub fn environment(&self) -> Option<Environment> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(ENVIRONMENT_KEY))
            .filter(|(_, v)| !v.is_empty())
            .map(|(_, v)| Environment { name: v.clone() })
    }

    /// Every non-reserved tag, keys prefixed for Tidal
    pub fn custom_fields(&self) -> BTreeMap<String, Value> {
        self.entries
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(ENVIRONMENT_KEY))
            .map(|(k, v)| {
                (
                    format!("{}{}", CUSTOM_FIELD_PREFIX, k),
                    Value::String(v.clone()),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn mapping_and_joined_string_agree() {
        let from_map = Tags::from_value(Some(&json!({
            "environment": "prod",
            "team": "x"
        })));
        let from_string = Tags::from_value(Some(&json!("environment: prod, team: x")));

        assert_eq!(from_map.environment(), from_string.environment());
        assert_eq!(from_map.custom_fields(), from_string.custom_fields());
        assert_eq!(
            from_map.environment(),
            Some(Environment {
                name: "prod".to_string()
            })
        );
        assert_eq!(
            from_map.custom_fields(),
            BTreeMap::from([("az_lbl_team".to_string(), json!("x"))])
        );
    }

    #[test]
    fn environment_key_is_case_insensitive() {
        let tags = Tags::from_value(Some(&json!({"Environment": "staging"})));
        assert_eq!(tags.environment().unwrap().name, "staging");
        assert!(tags.custom_fields().is_empty());
    }

    #[test]
    fn missing_and_null_tags_are_empty() {
        assert!(Tags::from_value(None).is_empty());
        assert!(Tags::from_value(Some(&Value::Null)).is_empty());
    }

    #[test]
    fn empty_environment_value_is_ignored() {
        let tags = Tags::from_value(Some(&json!({"environment": ""})));
        assert!(tags.environment().is_none());
    }

    #[test]
    fn joined_string_without_value_keeps_the_key() {
        let tags = Tags::from_joined("orphan");
        assert_eq!(
            tags.custom_fields(),
            BTreeMap::from([("az_lbl_orphan".to_string(), json!(""))])
        );
    }

    #[test]
    fn db_server_example_normalizes() {
        let tags = Tags::from_joined("environment: production, team: payments");
        assert_eq!(tags.environment().unwrap().name, "production");
        assert_eq!(
            tags.custom_fields(),
            BTreeMap::from([("az_lbl_team".to_string(), json!("payments"))])
        );
    }

    fn arb_tag_key() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_-]{0,15}"
    }

    fn arb_tag_value() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_. -]{0,20}".prop_map(|s| s.trim().to_string())
    }

    proptest! {
        /// The mapping form and the joined-string form of the same content
        /// always produce the same environment and custom fields
        #[test]
        fn forms_are_equivalent(entries in prop::collection::btree_map(arb_tag_key(), arb_tag_value(), 0..8)) {
            let map: serde_json::Map<String, Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            let joined = entries
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join(", ");

            let from_map = Tags::from_value(Some(&Value::Object(map)));
            let from_string = Tags::from_joined(&joined);

            prop_assert_eq!(from_map.environment(), from_string.environment());
            prop_assert_eq!(from_map.custom_fields(), from_string.custom_fields());
        }

        /// The reserved key never leaks into custom fields
        #[test]
        fn environment_never_in_custom_fields(value in arb_tag_value()) {
            let tags = Tags::from_value(Some(&json!({ "environment": value })));
            prop_assert!(tags.custom_fields().is_empty());
        }

        /// Every custom field key carries the prefix
        #[test]
        fn custom_field_keys_are_prefixed(entries in prop::collection::btree_map(arb_tag_key(), arb_tag_value(), 0..8)) {
            let map: serde_json::Map<String, Value> = entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            let tags = Tags::from_value(Some(&Value::Object(map)));
            for key in tags.custom_fields().keys() {
                prop_assert!(key.starts_with(CUSTOM_FIELD_PREFIX));
            }
        }
    }
}
