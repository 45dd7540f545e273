/// Input validation utilities
use crate::constants::EMAIL_REGEX_PATTERN;
use crate::error::ProcessingError;
use regex::Regex;

lazy_static::lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(EMAIL_REGEX_PATTERN).unwrap();
}

pub fn validate_email_address(email: &str) -> Result<(), ProcessingError> {
    if EMAIL_REGEX.is_match(email) {
        Ok(())
    } else {
        Err(ProcessingError::SchemaValidation(format!(
            "invalid email address: {}",
            email
        )))
    }
}
