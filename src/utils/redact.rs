//! Masking of secret-looking config values for display

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

pub const MASK: &str = "********";

static SECRET_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passwd|secret|token|api_?key|private_?key|credentials?)")
        .expect("valid regex")
});

/// Returns true if a key name suggests its value is a credential.
pub fn is_secret_key(key: &str) -> bool {
    SECRET_KEY.is_match(key)
}

/// Replace every non-empty scalar under a secret-looking key with [`MASK`].
pub fn mask_secrets(value: &mut Value) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map.iter_mut() {
                let secret = key.as_str().is_some_and(is_secret_key);
                if secret && is_filled_scalar(child) {
                    *child = Value::String(MASK.to_string());
                } else {
                    mask_secrets(child);
                }
            }
        }
        Value::Sequence(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}

fn is_filled_scalar(value: &Value) -> bool {
    match value {
        Value::String(s) => !s.is_empty(),
        Value::Number(_) | Value::Bool(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_keys() {
        assert!(is_secret_key("password"));
        assert!(is_secret_key("JWT_SECRET_KEY"));
        assert!(is_secret_key("bot_token"));
        assert!(is_secret_key("apiKey"));
        assert!(!is_secret_key("host"));
        assert!(!is_secret_key("max_open_conns"));
    }

    #[test]
    fn test_mask_nested_values() {
        let mut value: Value = serde_yaml::from_str(
            "database:\n  host: db\n  password: hunter2\n\
             email:\n  password: ''\ntelegram:\n  - bot_token: abc\n",
        )
        .expect("yaml");

        mask_secrets(&mut value);

        let out = serde_yaml::to_string(&value).expect("yaml");
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("abc"));
        assert!(out.contains("host: db"));
        assert!(out.contains("password: ''"), "empty secrets stay visibly empty: {out}");
    }
}
