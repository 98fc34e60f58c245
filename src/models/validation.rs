use thiserror::Error;

use crate::config::constants::MIN_PASSWORD_LENGTH;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require(field, value)?;
    let valid = value
        .split_once('@')
        .map(|(user, domain)| !user.is_empty() && domain.contains('.') && !domain.ends_with('.'))
        .unwrap_or(false);
    if !valid {
        return Err(ValidationError::new(field, "is not a valid email address"));
    }
    Ok(())
}

pub(crate) fn password(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::new(
            field,
            format!("must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    Ok(())
}

pub(crate) fn http_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    require(field, value)?;
    match reqwest::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new(field, "must be an http(s) url")),
    }
}
