//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::board::TeamKey;

/// Rejects values that are empty once surrounding whitespace is trimmed.
///
/// # Examples
///
/// ```ignore
/// validate_filled("  Ann ", "name_required", "enter name") // Ok
/// validate_filled("   ", "name_required", "enter name")    // Err - blank
/// ```
pub fn validate_filled(
    value: &str,
    code: &'static str,
    message: &'static str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new(code);
        err.message = Some(message.into());
        return Err(err);
    }
    Ok(())
}

/// Requires a team to have been picked.
pub fn validate_team_selected(team: Option<TeamKey>) -> Result<TeamKey, ValidationError> {
    team.ok_or_else(|| {
        let mut err = ValidationError::new("team_required");
        err.message = Some("select team".into());
        err
    })
}

/// Human-readable message carried by a validation error, falling back to its code.
pub fn validation_message(err: &ValidationError) -> String {
    err.message
        .as_ref()
        .map(|message| message.to_string())
        .unwrap_or_else(|| err.code.to_string())
}
