//! Raw plan parsing.
//!
//! The model's reply is parsed into lenient `Raw*` shapes first; strict
//! checks live in `validate`. Models occasionally wrap JSON in markdown
//! fences despite instructions, so fences are stripped before parsing.

use serde::Deserialize;

use crate::error::ValidationError;

/// Unvalidated plan as the model produced it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlan {
    pub title: Option<String>,
    pub narrative: Option<String>,
    pub total_duration: Option<f64>,
    pub scenes: Option<Vec<RawScene>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawScene {
    pub id: Option<u32>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub mood: Option<String>,
    pub shots: Option<Vec<RawShot>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawShot {
    pub id: Option<u32>,
    pub duration: Option<f64>,
    pub start_prompt: Option<String>,
    pub end_prompt: Option<String>,
    pub motion_prompt: Option<String>,
    pub camera_move: Option<String>,
    pub lighting: Option<String>,
    pub color_palette: Option<String>,
    pub transition_out: Option<String>,
}

/// Strip a leading ```json / trailing ``` fence pair, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

/// Parse a model reply into a raw plan.
pub fn parse_plan(text: &str) -> Result<RawPlan, ValidationError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(cleaned)
        .map_err(|e| ValidationError::malformed(format!("Plan response was not valid JSON: {}", e)))
}
