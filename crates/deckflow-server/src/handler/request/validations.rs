//! Request validation utilities.

use validator::ValidationError;

pub fn validation_error(code: &'static str, message: &str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.to_string().into());
    error
}

/// Rejects text that is empty or only whitespace.
pub fn is_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(validation_error("blank", "must not be empty or whitespace"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        assert!(is_not_blank("").is_err());
        assert!(is_not_blank(" \n\t").is_err());
        assert!(is_not_blank("Rust in production").is_ok());
    }
}
