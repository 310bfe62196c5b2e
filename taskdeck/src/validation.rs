//! Form validation run before any network call.

use crate::error::ValidationError;

/// Reject blank input. `field` names the field in the error.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

/// Check a new password against the minimum length and its confirmation.
pub fn validate_password(
    password: &str,
    confirmation: &str,
    min_length: usize,
) -> Result<(), ValidationError> {
    if password.chars().count() < min_length {
        return Err(ValidationError::PasswordTooShort { min: min_length });
    }
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_rejected() {
        assert_eq!(
            require_non_empty("Title", "   "),
            Err(ValidationError::EmptyField("Title"))
        );
        assert!(require_non_empty("Title", "Buy milk").is_ok());
    }

    #[test]
    fn password_rules() {
        assert_eq!(
            validate_password("12345", "12345", 6),
            Err(ValidationError::PasswordTooShort { min: 6 })
        );
        assert_eq!(
            validate_password("123456", "123457", 6),
            Err(ValidationError::PasswordMismatch)
        );
        assert!(validate_password("123456", "123456", 6).is_ok());
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(validate_password("éééééé", "éééééé", 6).is_ok());
    }
}
