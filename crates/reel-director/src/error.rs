//! Director error types.

use std::fmt;

use thiserror::Error;

use reel_providers::ProviderError;

pub type DirectorResult<T> = Result<T, DirectorError>;

#[derive(Debug, Error)]
pub enum DirectorError {
    /// The model's plan failed parsing or validation. Never retried by the
    /// director; the caller decides whether to re-invoke.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The text provider failed. Retryable errors bubble unchanged.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What a plan violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// Response was not parseable JSON
    Malformed,
    /// A required field is absent
    MissingField,
    /// A required string field is empty after trimming
    EmptyField,
    /// Scene or shot ids are not a contiguous 1-based sequence
    BadId,
    /// Shot duration outside [5, 10] seconds
    DurationOutOfRange,
    /// A prompt field is under the token floor
    PromptTooShort,
    /// Camera move outside the closed set
    UnknownCameraMove,
    /// Transition outside the closed set
    UnknownTransition,
    /// Sum of durations outside the ±10% target window
    TotalDurationOutOfTolerance,
    /// More scenes than the caller allowed
    TooManyScenes,
    /// More shots in a scene than the caller allowed
    TooManyShots,
}

/// A located plan validation failure.
#[derive(Debug, Clone, Error)]
pub struct ValidationError {
    pub kind: ValidationKind,
    /// 1-based scene position, when the violation is inside a scene
    pub scene: Option<u32>,
    /// 1-based shot position, when the violation is inside a shot
    pub shot: Option<u32>,
    pub message: String,
}

impl ValidationError {
    pub fn new(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            scene: None,
            shot: None,
            message: message.into(),
        }
    }

    pub fn in_scene(kind: ValidationKind, scene: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            scene: Some(scene),
            shot: None,
            message: message.into(),
        }
    }

    pub fn in_shot(kind: ValidationKind, scene: u32, shot: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            scene: Some(scene),
            shot: Some(shot),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ValidationKind::Malformed, message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.scene, self.shot) {
            (Some(scene), Some(shot)) => {
                write!(f, "scene {}, shot {}: {}", scene, shot, self.message)
            }
            (Some(scene), None) => write!(f, "scene {}: {}", scene, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_location() {
        let err = ValidationError::in_shot(
            ValidationKind::UnknownCameraMove,
            2,
            3,
            "Unknown camera move: zoom_through",
        );
        assert_eq!(
            err.to_string(),
            "scene 2, shot 3: Unknown camera move: zoom_through"
        );
    }

    #[test]
    fn test_display_without_location() {
        let err = ValidationError::malformed("response was not JSON");
        assert_eq!(err.to_string(), "response was not JSON");
    }
}
