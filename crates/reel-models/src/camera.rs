//! Camera move and transition vocabularies.
//!
//! Both sets are closed: the director's system prompt enumerates them and
//! validation rejects anything outside, so downstream video synthesis never
//! sees a move it cannot express.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Camera movement applied across a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraMove {
    /// Locked-off camera
    #[default]
    Static,
    /// Move toward the subject
    PushIn,
    /// Move away from the subject
    PullOut,
    PanLeft,
    PanRight,
    TiltUp,
    TiltDown,
    CraneUp,
    CraneDown,
    DollyLeft,
    DollyRight,
}

impl CameraMove {
    /// All valid camera moves, in prompt-enumeration order.
    pub const ALL: &'static [CameraMove] = &[
        CameraMove::Static,
        CameraMove::PushIn,
        CameraMove::PullOut,
        CameraMove::PanLeft,
        CameraMove::PanRight,
        CameraMove::TiltUp,
        CameraMove::TiltDown,
        CameraMove::CraneUp,
        CameraMove::CraneDown,
        CameraMove::DollyLeft,
        CameraMove::DollyRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraMove::Static => "static",
            CameraMove::PushIn => "push_in",
            CameraMove::PullOut => "pull_out",
            CameraMove::PanLeft => "pan_left",
            CameraMove::PanRight => "pan_right",
            CameraMove::TiltUp => "tilt_up",
            CameraMove::TiltDown => "tilt_down",
            CameraMove::CraneUp => "crane_up",
            CameraMove::CraneDown => "crane_down",
            CameraMove::DollyLeft => "dolly_left",
            CameraMove::DollyRight => "dolly_right",
        }
    }
}

impl fmt::Display for CameraMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CameraMove {
    type Err = CameraMoveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(CameraMove::Static),
            "push_in" => Ok(CameraMove::PushIn),
            "pull_out" => Ok(CameraMove::PullOut),
            "pan_left" => Ok(CameraMove::PanLeft),
            "pan_right" => Ok(CameraMove::PanRight),
            "tilt_up" => Ok(CameraMove::TiltUp),
            "tilt_down" => Ok(CameraMove::TiltDown),
            "crane_up" => Ok(CameraMove::CraneUp),
            "crane_down" => Ok(CameraMove::CraneDown),
            "dolly_left" => Ok(CameraMove::DollyLeft),
            "dolly_right" => Ok(CameraMove::DollyRight),
            _ => Err(CameraMoveParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown camera move: {0}")]
pub struct CameraMoveParseError(String);

/// Transition applied when leaving a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Hard cut (the default when a shot specifies nothing)
    #[default]
    Cut,
    Crossfade,
    FadeBlack,
    FadeWhite,
    WipeLeft,
    WipeRight,
}

impl Transition {
    pub const ALL: &'static [Transition] = &[
        Transition::Cut,
        Transition::Crossfade,
        Transition::FadeBlack,
        Transition::FadeWhite,
        Transition::WipeLeft,
        Transition::WipeRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Cut => "cut",
            Transition::Crossfade => "crossfade",
            Transition::FadeBlack => "fade_black",
            Transition::FadeWhite => "fade_white",
            Transition::WipeLeft => "wipe_left",
            Transition::WipeRight => "wipe_right",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Transition {
    type Err = TransitionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cut" => Ok(Transition::Cut),
            "crossfade" => Ok(Transition::Crossfade),
            "fade_black" => Ok(Transition::FadeBlack),
            "fade_white" => Ok(Transition::FadeWhite),
            "wipe_left" => Ok(Transition::WipeLeft),
            "wipe_right" => Ok(Transition::WipeRight),
            _ => Err(TransitionParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown transition: {0}")]
pub struct TransitionParseError(String);
