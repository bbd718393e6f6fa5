// Identifier validation shared by every queue use case

use crate::application::constants::MAX_ID_LENGTH;
use crate::error::{AppError, Result};

/// Validate a resource or user identifier
///
/// Non-empty, at most 64 chars, `[A-Za-z0-9_.:-]`.
pub fn validate_id(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} cannot be empty", field)));
    }

    if value.len() > MAX_ID_LENGTH {
        return Err(AppError::Validation(format!(
            "{} too long (max {} chars)",
            field, MAX_ID_LENGTH
        )));
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
    {
        return Err(AppError::Validation(format!(
            "{} must be alphanumeric with '_', '.', ':' or '-'",
            field
        )));
    }

    Ok(())
}

pub fn validate_ids(resource_id: &str, user_id: &str) -> Result<()> {
    validate_id("resource_id", resource_id)?;
    validate_id("user_id", user_id)
}
