//! Request extraction and field checks shared by the auth and todo handlers.
//!
//! Rejections from axum's own extractors are converted into
//! [`AppError::Validation`] so every 400 carries the same `{message}` body.

use axum::extract::{FromRequest, FromRequestParts};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A present, non-blank string field.
pub fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, AppError> {
    match value {
        None => Err(AppError::Validation(format!("\"{field}\" is required"))),
        Some(v) if v.trim().is_empty() => Err(AppError::Validation(format!(
            "\"{field}\" is not allowed to be empty"
        ))),
        Some(v) => Ok(v),
    }
}

pub fn min_chars(field: &str, value: &str, min: usize) -> Result<(), AppError> {
    if value.chars().count() < min {
        return Err(AppError::Validation(format!(
            "\"{field}\" length must be at least {min} characters long"
        )));
    }
    Ok(())
}

pub fn max_chars(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "\"{field}\" length must be less than or equal to {max} characters long"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("spaces in@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn required_distinguishes_missing_and_empty() {
        let err = required("name", None).unwrap_err();
        assert_eq!(err.to_string(), "\"name\" is required");
        let err = required("name", Some("  ")).unwrap_err();
        assert_eq!(err.to_string(), "\"name\" is not allowed to be empty");
        assert_eq!(required("name", Some("A")).unwrap(), "A");
    }

    #[test]
    fn length_bounds_count_chars() {
        assert!(min_chars("password", "secret", 6).is_ok());
        assert_eq!(
            min_chars("password", "short", 6).unwrap_err().to_string(),
            "\"password\" length must be at least 6 characters long"
        );
        assert!(max_chars("title", &"é".repeat(255), 255).is_ok());
        assert!(max_chars("title", &"x".repeat(256), 255).is_err());
    }
}
