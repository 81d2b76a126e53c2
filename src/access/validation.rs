//! Field-level input checks.
//!
//! Shared by the mutation gateway and the auth handlers. Functions returning
//! `Result<(), String>` leave it to the caller to attach the field name; the
//! `AccessResult` variants already carry it.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::{AccessError, AccessResult};

lazy_static! {
    /// Deliberately loose: one `@`, no whitespace, a dot in the domain part
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// Calendar date as sent by HTML date inputs
    static ref DATE_REGEX: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}$"
    ).unwrap();
}

const MAX_EMAIL_LEN: usize = 254;
const MAX_PASSWORD_LEN: usize = 128;

/// Trim an optional string; blank values become `None`.
pub fn normalize_optional(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > MAX_EMAIL_LEN {
        return Err(format!("Email is too long (max {} characters)", MAX_EMAIL_LEN));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a password against the configured minimum length
pub fn validate_password(password: &str, min_length: usize) -> Result<(), String> {
    if password.len() < min_length {
        return Err(format!(
            "Password must be at least {} characters",
            min_length
        ));
    }

    if password.len() > MAX_PASSWORD_LEN {
        return Err(format!(
            "Password is too long (max {} characters)",
            MAX_PASSWORD_LEN
        ));
    }

    Ok(())
}

/// Validate a due date: either `YYYY-MM-DD` or a full RFC 3339 timestamp
pub fn validate_due_date(value: &str) -> Result<(), String> {
    if DATE_REGEX.is_match(value) {
        return chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| format!("Invalid date: {}", value));
    }

    chrono::DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| "Due date must be YYYY-MM-DD or an RFC 3339 timestamp".to_string())
}

/// Check the length of an already trimmed value.
pub fn validate_text_length(value: &str, field: &str, max: usize) -> AccessResult<()> {
    if value.chars().count() > max {
        return Err(AccessError::validation(
            field,
            format!("{} is too long (max {} characters)", field, max),
        ));
    }
    Ok(())
}

/// A required text field: present, non-blank after trimming and within `max`.
pub fn validate_required_text(raw: Option<&str>, field: &str, max: usize) -> AccessResult<String> {
    let value = normalize_optional(raw)
        .ok_or_else(|| AccessError::validation(field, format!("{} is required", field)))?;
    validate_text_length(&value, field, max)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email(" Ada.Lovelace+work@mail.example.org ").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("ada").is_err());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("ada lovelace@example.com").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret", 6).is_ok());
        assert!(validate_password("short", 6).is_err());
        assert!(validate_password(&"x".repeat(129), 6).is_err());
    }

    #[test]
    fn test_validate_due_date() {
        assert!(validate_due_date("2024-03-01").is_ok());
        assert!(validate_due_date("2024-03-01T09:30:00Z").is_ok());
        assert!(validate_due_date("2024-03-01T09:30:00+02:00").is_ok());

        assert!(validate_due_date("2024-02-30").is_err());
        assert!(validate_due_date("03/01/2024").is_err());
        assert!(validate_due_date("tomorrow").is_err());
    }

    #[test]
    fn test_required_text_trims_and_rejects_blank() {
        assert_eq!(
            validate_required_text(Some("  Ship it "), "title", 10),
            Ok("Ship it".to_string())
        );
        assert_eq!(
            validate_required_text(Some("   "), "title", 10),
            Err(AccessError::validation("title", "title is required"))
        );
        assert!(validate_required_text(None, "title", 10).is_err());
        assert!(validate_required_text(Some("way too long a title"), "title", 10).is_err());
    }

    #[test]
    fn test_normalize_optional() {
        assert_eq!(normalize_optional(Some(" x ")), Some("x".to_string()));
        assert_eq!(normalize_optional(Some("")), None);
        assert_eq!(normalize_optional(None), None);
    }
}
