//! Plan normalization.
//!
//! Runs after validation: trims every string, rounds durations to 0.1s,
//! renumbers ids into contiguous 1-based sequences, defaults missing
//! transitions to cut, and recomputes the total duration from the rounded
//! shots. Normalization is idempotent.

use reel_models::{round_duration, CameraMove, Plan, Scene, Shot, Transition};

use crate::parse::{RawPlan, RawScene, RawShot};

fn trimmed(value: Option<String>) -> String {
    value.unwrap_or_default().trim().to_string()
}

fn trimmed_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Produce a normalized plan from a validated raw plan.
pub fn normalize(raw: RawPlan) -> Plan {
    let scenes: Vec<Scene> = raw
        .scenes
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(scene_index, scene)| normalize_scene(scene, scene_index as u32 + 1))
        .collect();

    let total: f64 = scenes
        .iter()
        .flat_map(|s| s.shots.iter())
        .map(|shot| shot.duration)
        .sum();

    Plan {
        title: trimmed(raw.title),
        narrative: trimmed(raw.narrative),
        total_duration: round_duration(total),
        scenes,
    }
}

fn normalize_scene(raw: RawScene, id: u32) -> Scene {
    Scene {
        id,
        name: trimmed(raw.name),
        description: trimmed(raw.description),
        mood: trimmed(raw.mood),
        shots: raw
            .shots
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(shot_index, shot)| normalize_shot(shot, shot_index as u32 + 1))
            .collect(),
    }
}

fn normalize_shot(raw: RawShot, id: u32) -> Shot {
    Shot {
        id,
        duration: round_duration(raw.duration.unwrap_or_default()),
        start_prompt: trimmed(raw.start_prompt),
        end_prompt: trimmed(raw.end_prompt),
        motion_prompt: trimmed(raw.motion_prompt),
        camera_move: raw
            .camera_move
            .as_deref()
            .and_then(|c| c.parse::<CameraMove>().ok())
            .unwrap_or_default(),
        lighting: trimmed(raw.lighting),
        color_palette: trimmed_opt(raw.color_palette),
        transition_out: raw
            .transition_out
            .as_deref()
            .and_then(|t| t.parse::<Transition>().ok())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_plan;

    fn raw_json() -> String {
        let p = vec!["word"; 20].join(" ");
        format!(
            r#"{{"title": "  Dawn Flight  ", "narrative": " N ", "total_duration": 99,
                "scenes": [{{"id": 7, "name": " S ", "description": "D", "mood": "M",
                    "shots": [
                        {{"id": 9, "duration": 7.46, "start_prompt": " {p} ",
                          "end_prompt": "{p}", "motion_prompt": "{p}",
                          "camera_move": "push_in", "lighting": " soft "}},
                        {{"id": 1, "duration": 6.04, "start_prompt": "{p}",
                          "end_prompt": "{p}", "motion_prompt": "{p}",
                          "camera_move": "static", "lighting": "hard",
                          "transition_out": "crossfade", "color_palette": "  "}}
                    ]}}]}}"#,
            p = p
        )
    }

    #[test]
    fn test_normalize_renumbers_and_rounds() {
        let plan = normalize(parse_plan(&raw_json()).unwrap());

        assert_eq!(plan.title, "Dawn Flight");
        assert_eq!(plan.scenes[0].id, 1);
        assert_eq!(plan.scenes[0].shots[0].id, 1);
        assert_eq!(plan.scenes[0].shots[1].id, 2);
        assert_eq!(plan.scenes[0].shots[0].duration, 7.5);
        assert_eq!(plan.scenes[0].shots[1].duration, 6.0);
        assert_eq!(plan.total_duration, 13.5);
        assert_eq!(plan.scenes[0].shots[0].transition_out, Transition::Cut);
        assert_eq!(plan.scenes[0].shots[1].transition_out, Transition::Crossfade);
        // Blank palette collapses to none
        assert_eq!(plan.scenes[0].shots[1].color_palette, None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(parse_plan(&raw_json()).unwrap());

        // Feed the normalized plan back through as raw
        let as_json = serde_json::to_string(&once).unwrap();
        let twice = normalize(parse_plan(&as_json).unwrap());

        assert_eq!(once, twice);
    }
}
