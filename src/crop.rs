use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::climate::ClimateSample;
use crate::rules::Action;

/// Number of weekly turns in one season.
pub const SEASON_WEEKS: u32 = 14;

pub const INITIAL_SOIL_MOISTURE: f64 = 60.0;
pub const INITIAL_HEALTH: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropType {
    #[default]
    Rice,
}

impl CropType {
    pub fn as_str(self) -> &'static str {
        match self {
            CropType::Rice => "rice",
        }
    }
}

impl fmt::Display for CropType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported crop type '{0}'")]
pub struct UnknownCrop(pub String);

impl FromStr for CropType {
    type Err = UnknownCrop;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rice" => Ok(CropType::Rice),
            other => Err(UnknownCrop(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthStage {
    Seedling,
    Vegetative,
    Reproductive,
    Maturity,
}

impl GrowthStage {
    /// Phenological stage reached in a given season week.
    pub fn for_week(week: u32) -> Self {
        match week {
            0..=4 => GrowthStage::Seedling,
            5..=8 => GrowthStage::Vegetative,
            9..=12 => GrowthStage::Reproductive,
            _ => GrowthStage::Maturity,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GrowthStage::Seedling => "Seedling Stage",
            GrowthStage::Vegetative => "Vegetative Stage",
            GrowthStage::Reproductive => "Reproductive Stage",
            GrowthStage::Maturity => "Maturity Stage",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GrowthStage::Seedling => "Young rice plants establishing roots",
            GrowthStage::Vegetative => "Rapid leaf and stem growth",
            GrowthStage::Reproductive => "Flowering and grain formation",
            GrowthStage::Maturity => "Golden grains ready for harvest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStatus {
    Active,
    Completed,
}

/// One accepted weekly decision. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub week: u32,
    pub action: Action,
    pub climate: ClimateSample,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropState {
    pub week: u32,
    pub crop: CropType,
    pub soil_moisture: f64,
    pub growth_stage: GrowthStage,
    pub health_score: f64,
    pub total_yield: f64,
    pub decisions: Vec<DecisionRecord>,
    pub status: SeasonStatus,
}

impl CropState {
    pub fn new(crop: CropType) -> Self {
        Self {
            week: 1,
            crop,
            soil_moisture: INITIAL_SOIL_MOISTURE,
            growth_stage: GrowthStage::Seedling,
            health_score: INITIAL_HEALTH,
            total_yield: 0.0,
            decisions: Vec::new(),
            status: SeasonStatus::Active,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SeasonStatus::Completed
    }

    pub fn action_count(&self, action: Action) -> usize {
        self.decisions
            .iter()
            .filter(|record| record.action == action)
            .count()
    }
}

impl Default for CropState {
    fn default() -> Self {
        Self::new(CropType::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_follow_week_bands() {
        for week in 1..=4 {
            assert_eq!(GrowthStage::for_week(week), GrowthStage::Seedling);
        }
        for week in 5..=8 {
            assert_eq!(GrowthStage::for_week(week), GrowthStage::Vegetative);
        }
        for week in 9..=12 {
            assert_eq!(GrowthStage::for_week(week), GrowthStage::Reproductive);
        }
        for week in 13..=14 {
            assert_eq!(GrowthStage::for_week(week), GrowthStage::Maturity);
        }
    }

    #[test]
    fn new_season_starts_from_fixed_values() {
        let state = CropState::new(CropType::Rice);
        assert_eq!(state.week, 1);
        assert_eq!(state.soil_moisture, 60.0);
        assert_eq!(state.health_score, 100.0);
        assert_eq!(state.total_yield, 0.0);
        assert_eq!(state.growth_stage, GrowthStage::Seedling);
        assert_eq!(state.status, SeasonStatus::Active);
        assert!(state.decisions.is_empty());
        assert_eq!(state, CropState::default());
    }

    #[test]
    fn crop_type_parses_case_insensitively() {
        assert_eq!("Rice".parse::<CropType>(), Ok(CropType::Rice));
        assert!("wheat".parse::<CropType>().is_err());
    }
}
