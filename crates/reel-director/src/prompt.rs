//! Prompt composition for the director.

use reel_models::{
    CameraMove, Plan, Transition, MAX_SHOT_SECONDS, MIN_PROMPT_TOKENS, MIN_SHOT_SECONDS,
};

use crate::director::DirectRequest;

fn enumerate<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The system prompt: schema, closed vocabularies, duration windows, and
/// continuity guidance. Everything the validator enforces is spelled out
/// here so a compliant model can pass on the first attempt.
pub fn system_prompt() -> String {
    format!(
        r#"You are a film director planning a short promotional video. Decompose the user's concept into scenes and shots.

IMPORTANT: You must strictly follow this output format.
Return ONLY a single JSON object with this schema:
{{
  "title": "Short display title",
  "narrative": "One-paragraph summary of the video",
  "total_duration": 0.0,
  "scenes": [
    {{
      "id": 1,
      "name": "Scene name",
      "description": "What happens in this scene",
      "mood": "Mood keywords",
      "shots": [
        {{
          "id": 1,
          "duration": 6.5,
          "start_prompt": "Detailed image prompt for the first frame",
          "end_prompt": "Detailed image prompt for the last frame",
          "motion_prompt": "What happens between the two frames",
          "camera_move": "push_in",
          "lighting": "Lighting description",
          "color_palette": "Optional palette keywords",
          "transition_out": "cut"
        }}
      ]
    }}
  ]
}}

Hard rules:
- Scene ids start at 1 and increase by 1. Shot ids restart at 1 inside each scene.
- Every shot duration is between {min_shot:.0} and {max_shot:.0} seconds.
- The sum of all shot durations must be within 10% of the requested total duration.
- "camera_move" must be one of: {camera_moves}.
- "transition_out" is optional and must be one of: {transitions}.
- "start_prompt", "end_prompt" and "motion_prompt" must each contain at least {min_tokens} words. Describe subject, setting, composition, atmosphere and style.
- Continuity: the end frame of shot N is the visual premise of shot N+1. Write end_prompt and the next start_prompt as the same moment seen from the new shot's framing.
- Return ONLY the JSON object. No markdown, no commentary."#,
        min_shot = MIN_SHOT_SECONDS,
        max_shot = MAX_SHOT_SECONDS,
        camera_moves = enumerate(CameraMove::ALL),
        transitions = enumerate(Transition::ALL),
        min_tokens = MIN_PROMPT_TOKENS,
    )
}

/// The user prompt for an initial direction request.
pub fn user_prompt(request: &DirectRequest) -> String {
    let mut prompt = format!(
        "Concept: {}\nTarget duration: {:.0} seconds\nAspect ratio: {}\n",
        request.concept.trim(),
        request.target_duration,
        request.aspect_ratio,
    );

    if let Some(style) = request.style.as_deref() {
        prompt.push_str(&format!("Visual style: {}\n", style.trim()));
    }
    if let Some(max) = request.constraints.max_scenes {
        prompt.push_str(&format!("Use at most {} scenes.\n", max));
    }
    if let Some(max) = request.constraints.max_shots_per_scene {
        prompt.push_str(&format!("Use at most {} shots per scene.\n", max));
    }
    if !request.constraints.include.is_empty() {
        prompt.push_str(&format!(
            "The video must feature: {}.\n",
            request.constraints.include.join(", ")
        ));
    }
    if !request.constraints.avoid.is_empty() {
        prompt.push_str(&format!(
            "The video must avoid: {}.\n",
            request.constraints.avoid.join(", ")
        ));
    }

    prompt
}

/// The user prompt for a refinement pass: the prior plan plus feedback.
pub fn refine_user_prompt(prior_json: &str, prior: &Plan, feedback: &str) -> String {
    format!(
        r#"Here is the current plan for a {:.0} second video:

{}

Revise it according to this feedback, keeping the same JSON schema and all hard rules. Keep the total duration within 10% of {:.0} seconds.

FEEDBACK:
{}"#,
        prior.total_duration,
        prior_json,
        prior.total_duration,
        feedback.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::DirectorConstraints;
    use reel_models::AspectRatio;

    #[test]
    fn test_system_prompt_enumerates_vocabularies() {
        let prompt = system_prompt();
        assert!(prompt.contains("push_in"));
        assert!(prompt.contains("dolly_right"));
        assert!(prompt.contains("fade_white"));
        assert!(prompt.contains("at least 20 words"));
        assert!(prompt.contains("between 5 and 10 seconds"));
    }

    #[test]
    fn test_user_prompt_includes_constraints() {
        let request = DirectRequest {
            concept: "A drone ascent over a pine forest at dawn".to_string(),
            target_duration: 30.0,
            aspect_ratio: AspectRatio::Landscape,
            style: Some("cinematic".to_string()),
            constraints: DirectorConstraints {
                max_scenes: Some(3),
                max_shots_per_scene: Some(2),
                include: vec!["mist".to_string()],
                avoid: vec!["people".to_string()],
            },
        };
        let prompt = user_prompt(&request);
        assert!(prompt.contains("30 seconds"));
        assert!(prompt.contains("16:9"));
        assert!(prompt.contains("at most 3 scenes"));
        assert!(prompt.contains("mist"));
        assert!(prompt.contains("avoid: people"));
    }
}
