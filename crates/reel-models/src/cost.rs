//! Upfront cost estimation breakdown.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Estimated cost of running a plan through the pipeline, in USD.
///
/// Produced by the director before approval so the user sees the spend
/// before any external call is made. Adapter-reported actual costs are
/// informational only and never authoritative for billing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CostBreakdown {
    /// Text completion estimate
    pub text: f64,
    /// Frame synthesis estimate (2 frames per shot)
    pub images: f64,
    /// Video synthesis estimate (1 clip per shot)
    pub videos: f64,
    /// Compile estimate (0 when compilation is disabled)
    pub compile: f64,
    /// Sum of the components
    pub total: f64,
    /// Number of frames that will be synthesized
    pub image_count: u32,
    /// Number of clips that will be synthesized
    pub video_count: u32,
}

impl CostBreakdown {
    /// Recompute the total from the components.
    pub fn finalize(mut self) -> Self {
        self.total = self.text + self.images + self.videos + self.compile;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_sums_components() {
        let breakdown = CostBreakdown {
            text: 0.01,
            images: 0.40,
            videos: 2.50,
            compile: 0.10,
            total: 0.0,
            image_count: 8,
            video_count: 4,
        }
        .finalize();
        assert!((breakdown.total - 3.01).abs() < 1e-9);
    }
}
