use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crop::{CropState, CropType, GrowthStage};
use crate::rules::Action;

/// Yield of a perfectly healthy crop at optimal moisture, kg/ha.
pub const BASE_YIELD: f64 = 5000.0;
pub const OPTIMAL_SOIL_MOISTURE: f64 = 70.0;
const MIN_MOISTURE_MULTIPLIER: f64 = 0.5;
const NOISE_FLOOR: f64 = 0.8;
const NOISE_SPAN: f64 = 0.4;

/// End-of-season harvest scoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct YieldModel;

impl YieldModel {
    pub fn new() -> Self {
        Self
    }

    pub fn health_multiplier(&self, final_health: f64) -> f64 {
        final_health.clamp(0.0, 100.0) / 100.0
    }

    pub fn moisture_multiplier(&self, final_soil_moisture: f64) -> f64 {
        let distance = (final_soil_moisture.clamp(0.0, 100.0) - OPTIMAL_SOIL_MOISTURE).abs();
        (1.0 - distance / 100.0).max(MIN_MOISTURE_MULTIPLIER)
    }

    /// Deterministic part of the harvest, before the weather-luck factor.
    pub fn expected(&self, final_health: f64, final_soil_moisture: f64) -> f64 {
        BASE_YIELD
            * self.health_multiplier(final_health)
            * self.moisture_multiplier(final_soil_moisture)
    }

    /// Half-open range `[low, high)` that [`compute`](Self::compute) can return.
    pub fn bounds(&self, final_health: f64, final_soil_moisture: f64) -> (f64, f64) {
        let expected = self.expected(final_health, final_soil_moisture);
        (
            expected * NOISE_FLOOR,
            expected * (NOISE_FLOOR + NOISE_SPAN),
        )
    }

    pub fn compute<R: Rng + ?Sized>(
        &self,
        final_health: f64,
        final_soil_moisture: f64,
        rng: &mut R,
    ) -> f64 {
        let luck = NOISE_FLOOR + rng.gen::<f64>() * NOISE_SPAN;
        self.expected(final_health, final_soil_moisture) * luck
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YieldRating {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

impl YieldRating {
    pub fn for_yield(total_yield: f64) -> Self {
        if total_yield >= 8000.0 {
            YieldRating::Excellent
        } else if total_yield >= 6000.0 {
            YieldRating::Good
        } else if total_yield >= 4000.0 {
            YieldRating::Fair
        } else {
            YieldRating::NeedsImprovement
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            YieldRating::Excellent => "Excellent!",
            YieldRating::Good => "Good",
            YieldRating::Fair => "Fair",
            YieldRating::NeedsImprovement => "Needs Improvement",
        }
    }
}

/// Summary of a completed season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestReport {
    pub crop: CropType,
    pub total_yield: f64,
    pub rating: YieldRating,
    pub final_health: f64,
    pub final_soil_moisture: f64,
    pub growth_stage: GrowthStage,
    pub weeks_played: usize,
    pub action_counts: BTreeMap<String, usize>,
}

impl HarvestReport {
    /// `None` while the season is still running.
    pub fn from_state(state: &CropState) -> Option<Self> {
        if !state.is_completed() {
            return None;
        }
        let action_counts = Action::ALL
            .into_iter()
            .map(|action| (action.as_str().to_string(), state.action_count(action)))
            .collect();
        Some(Self {
            crop: state.crop,
            total_yield: state.total_yield,
            rating: YieldRating::for_yield(state.total_yield),
            final_health: state.health_score,
            final_soil_moisture: state.soil_moisture,
            growth_stage: state.growth_stage,
            weeks_played: state.decisions.len(),
            action_counts,
        })
    }
}
