//! Shot plan models.
//!
//! A `Plan` is the director's validated, normalized decomposition of a
//! concept into scenes and 5-10 second shots. Once a plan is approved it is
//! immutable; jobs carry frozen copies of the prompts they need.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{CameraMove, Transition};

/// Minimum duration of a single shot, in seconds.
pub const MIN_SHOT_SECONDS: f64 = 5.0;

/// Maximum duration of a single shot, in seconds.
pub const MAX_SHOT_SECONDS: f64 = 10.0;

/// Tolerance around the requested total duration (fraction, i.e. 10%).
pub const TOTAL_DURATION_TOLERANCE: f64 = 0.10;

/// Minimum whitespace-separated tokens required in each prompt field.
pub const MIN_PROMPT_TOKENS: usize = 20;

/// Round a duration to 0.1 second resolution.
pub fn round_duration(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}

/// A validated, normalized shot decomposition of a concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    /// Short display title
    pub title: String,

    /// One-paragraph narrative summary
    pub narrative: String,

    /// Sum of all shot durations, rounded to 0.1s
    pub total_duration: f64,

    /// Ordered scenes; ids are 1-based and contiguous
    pub scenes: Vec<Scene>,
}

impl Plan {
    /// Total number of shots across all scenes.
    pub fn shot_count(&self) -> usize {
        self.scenes.iter().map(|s| s.shots.len()).sum()
    }

    /// Sum of shot durations, rounded to 0.1s.
    pub fn sum_durations(&self) -> f64 {
        let sum: f64 = self
            .scenes
            .iter()
            .flat_map(|s| s.shots.iter())
            .map(|shot| shot.duration)
            .sum();
        round_duration(sum)
    }

    /// Iterate shots in scene-then-shot order.
    pub fn shots(&self) -> impl Iterator<Item = (&Scene, &Shot)> {
        self.scenes
            .iter()
            .flat_map(|scene| scene.shots.iter().map(move |shot| (scene, shot)))
    }
}

/// A narrative unit of a plan, containing one or more shots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    /// 1-based position within the plan
    pub id: u32,

    /// Scene name
    pub name: String,

    /// What happens in this scene
    pub description: String,

    /// Mood/tone keywords
    pub mood: String,

    /// Ordered shots; ids are 1-based within the scene
    pub shots: Vec<Shot>,
}

/// An atomic 5-10 second unit: two frames and one motion clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Shot {
    /// 1-based position within its scene
    pub id: u32,

    /// Duration in seconds, within [5.0, 10.0], 0.1s resolution
    pub duration: f64,

    /// Image prompt for the first frame
    pub start_prompt: String,

    /// Image prompt for the last frame
    pub end_prompt: String,

    /// Motion prompt describing what happens between the frames
    pub motion_prompt: String,

    /// Camera movement across the shot
    pub camera_move: CameraMove,

    /// Lighting description
    pub lighting: String,

    /// Optional color palette keywords
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_palette: Option<String>,

    /// Transition applied when leaving this shot
    #[serde(default)]
    pub transition_out: Transition,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    fn sample_shot(id: u32, duration: f64) -> Shot {
        Shot {
            id,
            duration,
            start_prompt: prompt(20),
            end_prompt: prompt(20),
            motion_prompt: prompt(20),
            camera_move: CameraMove::PushIn,
            lighting: "golden hour".to_string(),
            color_palette: None,
            transition_out: Transition::Cut,
        }
    }

    fn sample_plan() -> Plan {
        Plan {
            title: "Dawn Flight".to_string(),
            narrative: "A drone rises over a pine forest at dawn.".to_string(),
            total_duration: 15.0,
            scenes: vec![Scene {
                id: 1,
                name: "Ascent".to_string(),
                description: "The drone lifts off".to_string(),
                mood: "serene".to_string(),
                shots: vec![sample_shot(1, 7.5), sample_shot(2, 7.5)],
            }],
        }
    }

    #[test]
    fn test_round_duration() {
        assert_eq!(round_duration(7.44), 7.4);
        assert_eq!(round_duration(7.45), 7.5);
        assert_eq!(round_duration(7.0), 7.0);
    }

    #[test]
    fn test_sum_durations() {
        let plan = sample_plan();
        assert_eq!(plan.sum_durations(), 15.0);
        assert_eq!(plan.shot_count(), 2);
    }

    #[test]
    fn test_serde_roundtrip() {
        let plan = sample_plan();
        let json = serde_json::to_string(&plan).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(plan, back);
    }

    #[test]
    fn test_missing_transition_defaults_to_cut() {
        let json = r#"{
            "id": 1,
            "duration": 6.0,
            "start_prompt": "a",
            "end_prompt": "b",
            "motion_prompt": "c",
            "camera_move": "static",
            "lighting": "soft"
        }"#;
        let shot: Shot = serde_json::from_str(json).unwrap();
        assert_eq!(shot.transition_out, Transition::Cut);
    }
}
