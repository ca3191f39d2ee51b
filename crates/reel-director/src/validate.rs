//! Strict plan validation.
//!
//! Fails on the first violation and reports the location as 1-based scene
//! and shot positions. Validation never mutates; `normalize` runs after.

use serde::{Deserialize, Serialize};

use reel_models::{
    CameraMove, Transition, MAX_SHOT_SECONDS, MIN_PROMPT_TOKENS, MIN_SHOT_SECONDS,
    TOTAL_DURATION_TOLERANCE,
};

use crate::error::{ValidationError, ValidationKind};
use crate::parse::{RawPlan, RawScene, RawShot};

/// Caller-supplied shape constraints for a direction request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorConstraints {
    /// Upper bound on scene count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scenes: Option<u32>,
    /// Upper bound on shots per scene
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_shots_per_scene: Option<u32>,
    /// Elements the plan must feature
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Elements the plan must avoid
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub avoid: Vec<String>,
}

fn token_count(s: &str) -> usize {
    s.split_whitespace().count()
}

fn required_str<'a>(
    value: &'a Option<String>,
    field: &str,
    scene: Option<u32>,
    shot: Option<u32>,
) -> Result<&'a str, ValidationError> {
    let text = value.as_deref().ok_or_else(|| ValidationError {
        kind: ValidationKind::MissingField,
        scene,
        shot,
        message: format!("Missing field: {}", field),
    })?;
    if text.trim().is_empty() {
        return Err(ValidationError {
            kind: ValidationKind::EmptyField,
            scene,
            shot,
            message: format!("Field is empty: {}", field),
        });
    }
    Ok(text)
}

/// Validate a raw plan against the target duration and constraints.
pub fn validate(
    raw: &RawPlan,
    target_duration: f64,
    constraints: &DirectorConstraints,
) -> Result<(), ValidationError> {
    required_str(&raw.title, "title", None, None)?;
    required_str(&raw.narrative, "narrative", None, None)?;

    let scenes = raw.scenes.as_ref().ok_or_else(|| {
        ValidationError::new(ValidationKind::MissingField, "Missing field: scenes")
    })?;
    if scenes.is_empty() {
        return Err(ValidationError::new(
            ValidationKind::EmptyField,
            "Plan has no scenes",
        ));
    }

    if let Some(max) = constraints.max_scenes {
        if scenes.len() as u32 > max {
            return Err(ValidationError::new(
                ValidationKind::TooManyScenes,
                format!("Plan has {} scenes, limit is {}", scenes.len(), max),
            ));
        }
    }

    let mut total = 0.0;
    for (scene_index, scene) in scenes.iter().enumerate() {
        let scene_pos = scene_index as u32 + 1;
        total += validate_scene(scene, scene_pos, constraints)?;
    }

    let low = target_duration * (1.0 - TOTAL_DURATION_TOLERANCE);
    let high = target_duration * (1.0 + TOTAL_DURATION_TOLERANCE);
    if total < low - 1e-9 || total > high + 1e-9 {
        return Err(ValidationError::new(
            ValidationKind::TotalDurationOutOfTolerance,
            format!(
                "Total duration {:.1}s is outside [{:.1}s, {:.1}s] for a {:.0}s target",
                total, low, high, target_duration
            ),
        ));
    }

    Ok(())
}

fn validate_scene(
    scene: &RawScene,
    scene_pos: u32,
    constraints: &DirectorConstraints,
) -> Result<f64, ValidationError> {
    if scene.id != Some(scene_pos) {
        return Err(ValidationError::in_scene(
            ValidationKind::BadId,
            scene_pos,
            format!("Scene id {:?} does not match position {}", scene.id, scene_pos),
        ));
    }

    required_str(&scene.name, "name", Some(scene_pos), None)?;
    required_str(&scene.description, "description", Some(scene_pos), None)?;
    required_str(&scene.mood, "mood", Some(scene_pos), None)?;

    let shots = scene.shots.as_ref().ok_or_else(|| {
        ValidationError::in_scene(ValidationKind::MissingField, scene_pos, "Missing field: shots")
    })?;
    if shots.is_empty() {
        return Err(ValidationError::in_scene(
            ValidationKind::EmptyField,
            scene_pos,
            "Scene has no shots",
        ));
    }

    if let Some(max) = constraints.max_shots_per_scene {
        if shots.len() as u32 > max {
            return Err(ValidationError::in_scene(
                ValidationKind::TooManyShots,
                scene_pos,
                format!("Scene has {} shots, limit is {}", shots.len(), max),
            ));
        }
    }

    let mut scene_total = 0.0;
    for (shot_index, shot) in shots.iter().enumerate() {
        let shot_pos = shot_index as u32 + 1;
        scene_total += validate_shot(shot, scene_pos, shot_pos)?;
    }
    Ok(scene_total)
}

fn validate_shot(shot: &RawShot, scene_pos: u32, shot_pos: u32) -> Result<f64, ValidationError> {
    if shot.id != Some(shot_pos) {
        return Err(ValidationError::in_shot(
            ValidationKind::BadId,
            scene_pos,
            shot_pos,
            format!("Shot id {:?} does not match position {}", shot.id, shot_pos),
        ));
    }

    let duration = shot.duration.ok_or_else(|| {
        ValidationError::in_shot(
            ValidationKind::MissingField,
            scene_pos,
            shot_pos,
            "Missing field: duration",
        )
    })?;
    if !(MIN_SHOT_SECONDS..=MAX_SHOT_SECONDS).contains(&duration) {
        return Err(ValidationError::in_shot(
            ValidationKind::DurationOutOfRange,
            scene_pos,
            shot_pos,
            format!(
                "Shot duration {:.1}s is outside [{:.0}, {:.0}] seconds",
                duration, MIN_SHOT_SECONDS, MAX_SHOT_SECONDS
            ),
        ));
    }

    for (field, value) in [
        ("start_prompt", &shot.start_prompt),
        ("end_prompt", &shot.end_prompt),
        ("motion_prompt", &shot.motion_prompt),
    ] {
        let text = required_str(value, field, Some(scene_pos), Some(shot_pos))?;
        let tokens = token_count(text);
        if tokens < MIN_PROMPT_TOKENS {
            return Err(ValidationError::in_shot(
                ValidationKind::PromptTooShort,
                scene_pos,
                shot_pos,
                format!(
                    "{} has {} tokens, minimum is {}",
                    field, tokens, MIN_PROMPT_TOKENS
                ),
            ));
        }
    }

    let camera = required_str(&shot.camera_move, "camera_move", Some(scene_pos), Some(shot_pos))?;
    if camera.parse::<CameraMove>().is_err() {
        return Err(ValidationError::in_shot(
            ValidationKind::UnknownCameraMove,
            scene_pos,
            shot_pos,
            format!("Unknown camera move: {}", camera),
        ));
    }

    required_str(&shot.lighting, "lighting", Some(scene_pos), Some(shot_pos))?;

    if let Some(transition) = shot.transition_out.as_deref() {
        if !transition.trim().is_empty() && transition.parse::<Transition>().is_err() {
            return Err(ValidationError::in_shot(
                ValidationKind::UnknownTransition,
                scene_pos,
                shot_pos,
                format!("Unknown transition: {}", transition),
            ));
        }
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_plan;

    fn prompt() -> String {
        vec!["word"; 20].join(" ")
    }

    fn shot_json(id: u32, duration: f64, camera: &str) -> String {
        format!(
            r#"{{"id": {id}, "duration": {duration},
                "start_prompt": "{p}", "end_prompt": "{p}", "motion_prompt": "{p}",
                "camera_move": "{camera}", "lighting": "soft"}}"#,
            id = id,
            duration = duration,
            p = prompt(),
            camera = camera
        )
    }

    fn plan_json(shots: &[String]) -> String {
        format!(
            r#"{{"title": "T", "narrative": "N", "total_duration": 0,
                "scenes": [{{"id": 1, "name": "S", "description": "D", "mood": "M",
                             "shots": [{}]}}]}}"#,
            shots.join(",")
        )
    }

    #[test]
    fn test_valid_plan_passes() {
        let json = plan_json(&[
            shot_json(1, 7.5, "static"),
            shot_json(2, 7.5, "push_in"),
            shot_json(3, 7.5, "pan_left"),
            shot_json(4, 7.5, "crane_up"),
        ]);
        let raw = parse_plan(&json).unwrap();
        assert!(validate(&raw, 30.0, &DirectorConstraints::default()).is_ok());
    }

    #[test]
    fn test_unknown_camera_move_locates_shot() {
        let json = plan_json(&[
            shot_json(1, 7.5, "static"),
            shot_json(2, 7.5, "zoom_through"),
            shot_json(3, 7.5, "pan_left"),
            shot_json(4, 7.5, "crane_up"),
        ]);
        let raw = parse_plan(&json).unwrap();
        let err = validate(&raw, 30.0, &DirectorConstraints::default()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::UnknownCameraMove);
        assert_eq!(err.scene, Some(1));
        assert_eq!(err.shot, Some(2));
    }

    #[test]
    fn test_total_out_of_tolerance_rejected() {
        // 70s against a 60s target: above the +10% window
        let shots: Vec<String> = (1..=7).map(|id| shot_json(id, 10.0, "static")).collect();
        let raw = parse_plan(&plan_json(&shots)).unwrap();
        let err = validate(&raw, 60.0, &DirectorConstraints::default()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::TotalDurationOutOfTolerance);
    }

    #[test]
    fn test_total_at_tolerance_edge_accepted() {
        // 66s against a 60s target: exactly the +10% edge
        let mut shots: Vec<String> = (1..=6).map(|id| shot_json(id, 10.0, "static")).collect();
        shots.push(shot_json(7, 6.0, "static"));
        let raw = parse_plan(&plan_json(&shots)).unwrap();
        assert!(validate(&raw, 60.0, &DirectorConstraints::default()).is_ok());
    }

    #[test]
    fn test_duration_out_of_range() {
        let json = plan_json(&[shot_json(1, 12.0, "static")]);
        let raw = parse_plan(&json).unwrap();
        let err = validate(&raw, 12.0, &DirectorConstraints::default()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::DurationOutOfRange);
        assert_eq!(err.shot, Some(1));
    }

    #[test]
    fn test_short_prompt_rejected() {
        let json = format!(
            r#"{{"title": "T", "narrative": "N",
                "scenes": [{{"id": 1, "name": "S", "description": "D", "mood": "M",
                    "shots": [{{"id": 1, "duration": 7.0,
                        "start_prompt": "too short",
                        "end_prompt": "{p}", "motion_prompt": "{p}",
                        "camera_move": "static", "lighting": "soft"}}]}}]}}"#,
            p = prompt()
        );
        let raw = parse_plan(&json).unwrap();
        let err = validate(&raw, 7.0, &DirectorConstraints::default()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::PromptTooShort);
    }

    #[test]
    fn test_non_sequential_scene_id() {
        let json = r#"{"title": "T", "narrative": "N",
            "scenes": [{"id": 2, "name": "S", "description": "D", "mood": "M", "shots": []}]}"#;
        let raw = parse_plan(json).unwrap();
        let err = validate(&raw, 30.0, &DirectorConstraints::default()).unwrap_err();
        assert_eq!(err.kind, ValidationKind::BadId);
        assert_eq!(err.scene, Some(1));
    }

    #[test]
    fn test_scene_limit_enforced() {
        let scene = r#"{"id": 1, "name": "S", "description": "D", "mood": "M",
                        "shots": [SHOT]}"#
            .replace("SHOT", &shot_json(1, 7.5, "static"));
        let scene2 = scene.replace("\"id\": 1", "\"id\": 2");
        let json = format!(
            r#"{{"title": "T", "narrative": "N", "scenes": [{}, {}]}}"#,
            scene, scene2
        );
        let raw = parse_plan(&json).unwrap();
        let constraints = DirectorConstraints {
            max_scenes: Some(1),
            ..Default::default()
        };
        let err = validate(&raw, 15.0, &constraints).unwrap_err();
        assert_eq!(err.kind, ValidationKind::TooManyScenes);
    }
}
