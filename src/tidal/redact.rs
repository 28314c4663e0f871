//! Secret redaction for connection strings and app settings
//!
//! Connection strings bundle credentials after the first delimiter
//! (`Server=...;User ID=...;Password=...`), so keeping only the prefix before
//! the first `,` or `;` drops the secret material. This is a heuristic, not a
//! guaranteed scrubber: a secret placed before the first delimiter survives.

use serde_json::Value;

/// Keep only the prefix before the first `,` or `;`. Idempotent.
pub fn redact(value: &str) -> String {
    value
        .split(|c| c == ',' || c == ';')
        .next()
        .unwrap_or(value)
        .to_string()
}

/// Redact every value under a response's `properties` object, in place.
///
/// Handles both wire shapes: app settings (`"KEY": "value"`) and connection
/// strings (`"NAME": {"value": "...", "type": "..."}`).
pub fn redact_properties(doc: &mut Value) {
    let Some(properties) = doc.get_mut("properties").and_then(|p| p.as_object_mut()) else {
        return;
    };

    for entry in properties.values_mut() {
        match entry {
            Value::String(s) => *s = redact(s),
            Value::Object(inner) => {
                if let Some(Value::String(s)) = inner.get_mut("value") {
                    *s = redact(s);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn keeps_prefix_before_comma() {
        assert_eq!(redact("user=a,password=b"), "user=a");
    }

    #[test]
    fn keeps_prefix_before_semicolon() {
        assert_eq!(redact("Server=db;Password=hunter2"), "Server=db");
    }

    #[test]
    fn value_without_delimiter_passes_through() {
        assert_eq!(redact("novalue"), "novalue");
    }

    #[test]
    fn app_settings_values_are_redacted_in_place() {
        let mut doc = json!({
            "properties": {
                "PLAIN": "keep-this",
                "DB": "host=db;password=secret"
            }
        });
        redact_properties(&mut doc);
        assert_eq!(doc["properties"]["PLAIN"], "keep-this");
        assert_eq!(doc["properties"]["DB"], "host=db");
    }

    #[test]
    fn connection_string_entries_are_redacted_in_place() {
        let mut doc = json!({
            "properties": {
                "Main": {
                    "value": "Server=tcp:x.database.windows.net,1433;Password=p",
                    "type": "SQLAzure"
                }
            }
        });
        redact_properties(&mut doc);
        assert_eq!(
            doc["properties"]["Main"]["value"],
            "Server=tcp:x.database.windows.net"
        );
        assert_eq!(doc["properties"]["Main"]["type"], "SQLAzure");
    }

    #[test]
    fn document_without_properties_is_untouched() {
        let mut doc = json!({"name": "unrelated"});
        let before = doc.clone();
        redact_properties(&mut doc);
        assert_eq!(doc, before);
    }

    proptest! {
        /// Redaction is idempotent
        #[test]
        fn redact_is_idempotent(value in ".{0,80}") {
            let once = redact(&value);
            prop_assert_eq!(redact(&once), once);
        }

        /// The result never contains a delimiter
        #[test]
        fn result_has_no_delimiters(value in ".{0,80}") {
            let redacted = redact(&value);
            prop_assert!(!redacted.contains(',') && !redacted.contains(';'));
        }

        /// The result is always a prefix of the input
        #[test]
        fn result_is_a_prefix(value in ".{0,80}") {
            prop_assert!(value.starts_with(&redact(&value)));
        }
    }
}
