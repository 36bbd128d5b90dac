//! Validation rules shared by every provider. Error strings are the wire
//! contract clients parse against — keep them exact.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::ProviderError;
use crate::Result;

const SMS_MAX_LEN: usize = 160;

fn phone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[1-9]\d{1,14}$").unwrap())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap())
}

pub fn non_empty(message: &str, recipient: &str) -> Result<()> {
    if message.is_empty() {
        return Err(ProviderError::Validation("message cannot be empty".to_string()));
    }
    if recipient.is_empty() {
        return Err(ProviderError::Validation("recipient cannot be empty".to_string()));
    }
    Ok(())
}

pub fn phone(recipient: &str) -> Result<()> {
    if !phone_regex().is_match(recipient) {
        return Err(ProviderError::Validation(format!(
            "invalid phone number format: {recipient}. Must be in E.164 format"
        )));
    }
    Ok(())
}

pub fn sms_length(message: &str) -> Result<()> {
    if message.len() > SMS_MAX_LEN {
        return Err(ProviderError::Validation(
            "SMS message exceeds 160 character limit".to_string(),
        ));
    }
    Ok(())
}

pub fn email(recipient: &str) -> Result<()> {
    if !email_regex().is_match(recipient) {
        return Err(ProviderError::Validation(format!(
            "invalid email address format: {recipient}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_e164_numbers() {
        assert!(phone("+15551234567").is_ok());
        assert!(phone("15551234567").is_ok());
    }

    #[test]
    fn rejects_missing_country_code_shape() {
        let err = phone("5551234567").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid phone number format: 5551234567. Must be in E.164 format"
        );
    }

    #[test]
    fn rejects_oversized_sms() {
        let message = "a".repeat(200);
        let err = sms_length(&message).unwrap_err();
        assert_eq!(err.to_string(), "SMS message exceeds 160 character limit");
    }

    #[test]
    fn accepts_plain_email() {
        assert!(email("a@b.co").is_ok());
    }

    #[test]
    fn rejects_malformed_email() {
        assert!(email("not-an-email").is_err());
    }
}
