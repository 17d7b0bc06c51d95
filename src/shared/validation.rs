//! Validation Utilities

use validator::{Validate, ValidationErrors};

use super::error::{AppError, FieldError};

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    field_errors.sort_by(|a, b| a.field.cmp(&b.field));

    let message = field_errors
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation(message)
}

/// Run `validator` checks on a request body.
pub fn validate<T: Validate>(body: &T) -> Result<(), AppError> {
    body.validate().map_err(validation_error)
}

/// Parse a Snowflake id received as a string.
pub fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid {} ID", what)))
}

/// Parse an optional id from a query string.
pub fn parse_optional_id(raw: Option<&str>, what: &str) -> Result<Option<i64>, AppError> {
    raw.filter(|s| !s.is_empty())
        .map(|s| parse_id(s, what))
        .transpose()
}

/// Normalize an email address for storage and lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(email(message = "Invalid email format"))]
        email: String,
    }

    #[test]
    fn test_validation_message_includes_field() {
        let sample = Sample {
            email: "nope".into(),
        };
        match validate(&sample) {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "email: Invalid email format"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(" 42 ", "movie").unwrap(), 42);
        assert!(matches!(parse_id("abc", "movie"), Err(AppError::BadRequest(msg)) if msg == "Invalid movie ID"));
        assert!(parse_id("-1", "movie").is_err());
        assert_eq!(parse_optional_id(Some(""), "hall").unwrap(), None);
        assert_eq!(parse_optional_id(Some("7"), "hall").unwrap(), Some(7));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }
}
