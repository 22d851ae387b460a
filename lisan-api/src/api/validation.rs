//! Request body validation
//!
//! Handlers collect every failing field into a [`Validator`] and return a
//! single [`ApiError::Validation`] listing all of them.

use crate::error::{ApiError, ApiResult, FieldErrors};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::sync::OnceLock;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `ok`
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors
                .entry(field.to_string())
                .or_default()
                .push(message.to_string());
        }
        self
    }

    /// At least `min` characters after trimming
    pub fn min_chars(&mut self, field: &str, value: &str, min: usize, message: &str) -> &mut Self {
        self.check(value.trim().chars().count() >= min, field, message)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> ApiResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

pub fn is_valid_email(value: &str) -> bool {
    email_regex().map_or(false, |re| re.is_match(value))
}

/// Absolute http(s) URL with a non-empty host
pub fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));

    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or("");
            !host.is_empty() && !host.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`); use with `#[serde(default)]`
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_all_fields() {
        let mut v = Validator::new();
        v.min_chars("username", " ab ", 3, "Username must be at least 3 characters")
            .check(is_valid_email("nope"), "email", "Invalid email")
            .check(true, "password", "unused");

        match v.finish() {
            Err(ApiError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.contains_key("username"));
                assert!(errors.contains_key("email"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_email() {
        assert!(is_valid_email("siswa@lisan.id"));
        assert!(!is_valid_email("siswa@lisan"));
        assert!(!is_valid_email("si swa@lisan.id"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_http_url() {
        assert!(is_http_url("https://cdn.example.com/a.png"));
        assert!(is_http_url("http://localhost:8080"));
        assert!(!is_http_url("ftp://example.com/a.png"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("avatar.png"));
    }

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        level_id: Option<Option<i64>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"level_id":null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"level_id":4}"#).unwrap();
        assert_eq!(absent.level_id, None);
        assert_eq!(null.level_id, Some(None));
        assert_eq!(set.level_id, Some(Some(4)));
    }
}
