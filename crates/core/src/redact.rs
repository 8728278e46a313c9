//! Sensitive field redaction for structured log details.
//!
//! Adapter log entries and migration logs carry free-form JSON context that
//! may include generated passwords or SSH material. Anything written to a
//! log repository passes through [`redact_sensitive`] first.

/// Key fragments whose values are replaced before storage. Matching is
/// case-insensitive substring matching on the key name.
pub const SENSITIVE_KEY_FRAGMENTS: &[&str] = &["password", "secret", "token", "key"];

const REDACTED: &str = "[REDACTED]";

/// Redact sensitive values from a JSON value, recursing into objects and
/// arrays. Returns a new value with redactions applied.
pub fn redact_sensitive(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, val) in map {
                let lower = key.to_lowercase();
                if SENSITIVE_KEY_FRAGMENTS.iter().any(|f| lower.contains(f)) {
                    out.insert(key.clone(), serde_json::Value::String(REDACTED.into()));
                } else {
                    out.insert(key.clone(), redact_sensitive(val));
                }
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact_sensitive).collect())
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_password_and_keeps_rest() {
        let input = serde_json::json!({"username": "u_shop", "password": "p"});
        let out = redact_sensitive(&input);
        assert_eq!(out["username"], "u_shop");
        assert_eq!(out["password"], "[REDACTED]");
    }

    #[test]
    fn redacts_nested_and_camel_case_keys() {
        let input = serde_json::json!({"ssh": {"sshKeyPath": "/k", "host": "h"}});
        let out = redact_sensitive(&input);
        assert_eq!(out["ssh"]["sshKeyPath"], "[REDACTED]");
        assert_eq!(out["ssh"]["host"], "h");
    }

    #[test]
    fn redacts_inside_arrays() {
        let input = serde_json::json!([{"token": "t"}, {"data": "d"}]);
        let out = redact_sensitive(&input);
        assert_eq!(out[0]["token"], "[REDACTED]");
        assert_eq!(out[1]["data"], "d");
    }

    #[test]
    fn scalars_pass_through() {
        let input = serde_json::json!(42);
        assert_eq!(redact_sensitive(&input), 42);
    }
}
