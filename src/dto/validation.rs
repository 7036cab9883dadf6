//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum accepted display name length, in characters.
const MAX_PLAYER_NAME_CHARS: usize = 32;

/// Validates that a room code is exactly 4 uppercase alphanumeric characters.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("AB3D") // Ok
/// validate_room_code("ab3d") // Err - lowercase
/// validate_room_code("ABC")  // Err - too short
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != 4 {
        let mut err = ValidationError::new("room_code_length");
        err.message =
            Some(format!("Room code must be exactly 4 characters (got {})", code.len()).into());
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code must contain only characters A-Z and 0-9".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a player display name is non-blank and reasonably short.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    if name.chars().count() > MAX_PLAYER_NAME_CHARS {
        let mut err = ValidationError::new("player_name_length");
        err.message =
            Some(format!("Player name must be at most {MAX_PLAYER_NAME_CHARS} characters").into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("ABCD").is_ok());
        assert!(validate_room_code("A1B2").is_ok());
        assert!(validate_room_code("0000").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid_length() {
        assert!(validate_room_code("ABC").is_err()); // too short
        assert!(validate_room_code("ABCDE").is_err()); // too long
        assert!(validate_room_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_room_code_invalid_format() {
        assert!(validate_room_code("abcd").is_err()); // lowercase
        assert!(validate_room_code("AB-D").is_err()); // punctuation
        assert!(validate_room_code("AB D").is_err()); // space
    }

    #[test]
    fn test_validate_player_name() {
        assert!(validate_player_name("Ada").is_ok());
        assert!(validate_player_name("   ").is_err());
        assert!(validate_player_name(&"x".repeat(33)).is_err());
    }
}
