//! Field rules shared by user, party and company records.

use validator::ValidateEmail;

use crate::error::{DomainError, DomainResult};

/// Trimmed value, or a validation error naming `field` when blank.
pub fn required(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trimmed value, collapsing blank strings to `None`.
pub fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

/// Lower-cased address with a dotted domain (`name@shop.bo`, not `name@localhost`).
pub fn email(field: &str, value: &str) -> DomainResult<String> {
    let normalized = value.trim().to_lowercase();
    let dotted_domain = normalized
        .rsplit_once('@')
        .map(|(_, domain)| domain.contains('.') && !domain.ends_with('.'))
        .unwrap_or(false);
    if !dotted_domain || !normalized.clone().validate_email() {
        return Err(DomainError::validation(format!("{field} is not a valid email address")));
    }
    Ok(normalized)
}

pub fn optional_email(field: &str, value: Option<&str>) -> DomainResult<Option<String>> {
    optional(value).map(|v| email(field, &v)).transpose()
}

/// Phone numbers are stored as bare digits.
pub fn optional_phone(field: &str, value: Option<&str>) -> DomainResult<Option<String>> {
    match optional(value) {
        Some(v) if !is_digits(&v) => Err(DomainError::validation(format!(
            "{field} must contain digits only"
        ))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_and_rejects_blank() {
        assert_eq!(required("name", "  Ana ").unwrap(), "Ana");
        assert!(required("name", "   ").is_err());
    }

    #[test]
    fn email_requires_dotted_domain() {
        assert_eq!(email("email", " Ana@Shop.BO ").unwrap(), "ana@shop.bo");
        assert!(email("email", "ana@localhost").is_err());
        assert!(email("email", "not-an-email").is_err());
    }

    #[test]
    fn phone_must_be_numeric_when_present() {
        assert_eq!(optional_phone("phone", Some("70012345")).unwrap().as_deref(), Some("70012345"));
        assert_eq!(optional_phone("phone", Some("  ")).unwrap(), None);
        assert!(optional_phone("phone", Some("700-123")).is_err());
    }
}
