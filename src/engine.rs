//! The season state machine.
//!
//! ```text
//! Active(1) --apply--> awaiting settle --settle--> Active(2) ... Active(14) --apply--> Completed
//! ```
//!
//! Between an accepted action and the following [`SeasonEngine::settle`] the
//! engine has no current climate sample and refuses new actions. This keeps at
//! most one action in flight even when the caller pauses between turns to
//! present the outcome.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::climate::{ClimateSample, ClimateSeries, WeekOutOfRange};
use crate::crop::{CropState, CropType, DecisionRecord, GrowthStage, SeasonStatus, SEASON_WEEKS};
use crate::rules::{self, Action, OutcomeResult};
use crate::yield_model::{HarvestReport, YieldModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateConflict {
    #[error("the season is already completed")]
    SeasonCompleted,
    #[error("an action is still being processed")]
    ActionInFlight,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid state: {0}")]
    InvalidState(StateConflict),
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error(transparent)]
    OutOfRange(#[from] WeekOutOfRange),
}

/// Everything one accepted action produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    pub week: u32,
    pub action: Action,
    pub climate: ClimateSample,
    pub outcome: OutcomeResult,
    pub soil_moisture: f64,
    pub health_score: f64,
    pub growth_stage: GrowthStage,
    /// Set on the turn that completes the season.
    pub total_yield: Option<f64>,
}

impl TurnReport {
    pub fn completed_season(&self) -> bool {
        self.total_yield.is_some()
    }
}

#[derive(Clone)]
pub struct SeasonEngine<R = ChaCha8Rng> {
    state: CropState,
    climate: ClimateSeries,
    current_sample: Option<ClimateSample>,
    yield_model: YieldModel,
    rng: R,
}

impl SeasonEngine<ChaCha8Rng> {
    pub fn seeded(crop: CropType, climate: ClimateSeries, seed: u64) -> Result<Self, EngineError> {
        Self::new(crop, climate, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> SeasonEngine<R> {
    /// Starts a season at week 1 with the week-1 climate sample loaded.
    pub fn new(crop: CropType, climate: ClimateSeries, rng: R) -> Result<Self, EngineError> {
        let state = CropState::new(crop);
        let current_sample = *climate.sample(state.week)?;
        Ok(Self {
            state,
            climate,
            current_sample: Some(current_sample),
            yield_model: YieldModel::new(),
            rng,
        })
    }

    pub fn state(&self) -> &CropState {
        &self.state
    }

    pub fn climate(&self) -> &ClimateSeries {
        &self.climate
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// True between an accepted action and the next [`settle`](Self::settle).
    pub fn is_awaiting_settle(&self) -> bool {
        !self.is_completed() && self.current_sample.is_none()
    }

    /// Climate the next action will be evaluated against.
    pub fn current_climate_sample(&self) -> Result<&ClimateSample, EngineError> {
        self.ensure_accepting()?;
        self.current_sample
            .as_ref()
            .ok_or(EngineError::InvalidState(StateConflict::ActionInFlight))
    }

    pub fn harvest_report(&self) -> Option<HarvestReport> {
        HarvestReport::from_state(&self.state)
    }

    pub fn apply_named(&mut self, action: &str) -> Result<TurnReport, EngineError> {
        let action: Action = action.parse()?;
        self.apply_action(action)
    }

    /// Plays one week. On error the crop state is left untouched.
    pub fn apply_action(&mut self, action: Action) -> Result<TurnReport, EngineError> {
        let climate = *self.current_climate_sample()?;
        let outcome = rules::evaluate(action, &climate, &self.state);

        let soil_moisture = (self.state.soil_moisture
            + outcome.soil_moisture_change
            + climate.rainfall / 10.0)
            .clamp(0.0, 100.0);
        let health_score = (self.state.health_score + outcome.health_change).clamp(0.0, 100.0);

        let mut next = self.state.clone();
        next.soil_moisture = soil_moisture;
        next.health_score = health_score;
        next.decisions.push(DecisionRecord {
            week: self.state.week,
            action,
            climate,
            outcome: outcome.message.clone(),
        });

        let next_week = self.state.week + 1;
        let total_yield = if next_week > SEASON_WEEKS {
            let harvest = self
                .yield_model
                .compute(health_score, soil_moisture, &mut self.rng);
            next.week = SEASON_WEEKS;
            next.growth_stage = GrowthStage::Maturity;
            next.total_yield = harvest;
            next.status = SeasonStatus::Completed;
            Some(harvest)
        } else {
            next.week = next_week;
            next.growth_stage = GrowthStage::for_week(next_week);
            None
        };

        debug!(
            week = self.state.week,
            %action,
            title = %outcome.title,
            soil_moisture,
            health_score,
            "turn applied"
        );
        let report = TurnReport {
            week: self.state.week,
            action,
            climate,
            outcome,
            soil_moisture,
            health_score,
            growth_stage: next.growth_stage,
            total_yield,
        };
        self.state = next;
        self.current_sample = None;
        if let Some(harvest) = total_yield {
            info!(harvest, health_score, soil_moisture, "season completed");
        }
        Ok(report)
    }

    /// Loads the climate for the current week and re-opens the engine for
    /// input. Calling it when no action is pending just returns the sample.
    pub fn settle(&mut self) -> Result<&ClimateSample, EngineError> {
        self.ensure_accepting()?;
        if self.current_sample.is_none() {
            self.current_sample = Some(*self.climate.sample(self.state.week)?);
        }
        self.current_climate_sample()
    }

    fn ensure_accepting(&self) -> Result<(), EngineError> {
        if self.state.status == SeasonStatus::Completed {
            return Err(EngineError::InvalidState(StateConflict::SeasonCompleted));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn flat_climate(temperature: f64, rainfall: f64) -> ClimateSeries {
        ClimateSeries::from_fn("fixture", |week| ClimateSample {
            week,
            temperature,
            rainfall,
            soil_moisture: 70.0,
            irradiance: 16.0,
        })
    }

    fn engine(climate: ClimateSeries) -> SeasonEngine<StepRng> {
        SeasonEngine::new(CropType::Rice, climate, StepRng::new(0, 0)).unwrap()
    }

    fn play(engine: &mut SeasonEngine<StepRng>, action: Action) -> TurnReport {
        let report = engine.apply_action(action).unwrap();
        if !report.completed_season() {
            engine.settle().unwrap();
        }
        report
    }

    #[test]
    fn fourteen_turns_complete_the_season() {
        let mut engine = engine(flat_climate(27.0, 30.0));
        for turn in 1..=14 {
            assert_eq!(engine.state().week, turn);
            assert!(!engine.is_completed());
            let report = play(&mut engine, Action::ALL[turn as usize % 3]);
            assert_eq!(report.week, turn);
            assert_eq!(report.completed_season(), turn == 14);
        }
        let state = engine.state();
        assert_eq!(state.status, SeasonStatus::Completed);
        assert_eq!(state.decisions.len(), 14);
        assert_eq!(state.week, 14);
        assert_eq!(state.growth_stage, GrowthStage::Maturity);
        assert!(state.total_yield > 0.0);
        let weeks: Vec<u32> = state.decisions.iter().map(|d| d.week).collect();
        assert_eq!(weeks, (1..=14).collect::<Vec<_>>());
        assert!(engine.harvest_report().is_some());
    }

    #[test]
    fn completed_season_rejects_actions_without_changes() {
        let mut engine = engine(flat_climate(27.0, 30.0));
        for _ in 0..14 {
            play(&mut engine, Action::Rest);
        }
        let before = engine.state().clone();
        for action in Action::ALL {
            assert_eq!(
                engine.apply_action(action),
                Err(EngineError::InvalidState(StateConflict::SeasonCompleted))
            );
        }
        assert_eq!(
            engine.settle().unwrap_err(),
            EngineError::InvalidState(StateConflict::SeasonCompleted)
        );
        assert_eq!(engine.state(), &before);
    }

    #[test]
    fn second_action_before_settle_is_rejected() {
        let mut engine = engine(flat_climate(27.0, 30.0));
        engine.apply_action(Action::Irrigate).unwrap();
        assert!(engine.is_awaiting_settle());
        let before = engine.state().clone();
        assert_eq!(
            engine.apply_action(Action::Rest),
            Err(EngineError::InvalidState(StateConflict::ActionInFlight))
        );
        assert!(engine.current_climate_sample().is_err());
        assert_eq!(engine.state(), &before);

        let sample = *engine.settle().unwrap();
        assert_eq!(sample.week, 2);
        assert!(!engine.is_awaiting_settle());
        assert!(engine.apply_action(Action::Rest).is_ok());
    }

    #[test]
    fn settle_is_idempotent_while_accepting() {
        let mut engine = engine(flat_climate(27.0, 30.0));
        assert_eq!(engine.settle().unwrap().week, 1);
        assert_eq!(engine.settle().unwrap().week, 1);
        assert_eq!(engine.state().decisions.len(), 0);
    }

    #[test]
    fn rainfall_adds_moisture_regardless_of_action() {
        let mut engine = engine(flat_climate(27.0, 30.0));
        // fertilize: 60 - 5 + 30/10
        let report = play(&mut engine, Action::Fertilize);
        assert!((report.soil_moisture - 58.0).abs() < 1e-9);
        assert_eq!(report.health_score, 100.0);
        assert_eq!(engine.state().soil_moisture, report.soil_moisture);
    }

    #[test]
    fn state_stays_clamped_under_extreme_weather() {
        let mut flooded = engine(flat_climate(40.0, 900.0));
        for _ in 0..14 {
            let report = play(&mut flooded, Action::Irrigate);
            assert!((0.0..=100.0).contains(&report.soil_moisture));
            assert!((0.0..=100.0).contains(&report.health_score));
        }
        assert_eq!(flooded.state().soil_moisture, 100.0);
        assert_eq!(flooded.state().health_score, 0.0);
        assert_eq!(flooded.state().total_yield, 0.0);

        let mut parched = engine(flat_climate(40.0, 0.0));
        for _ in 0..14 {
            play(&mut parched, Action::Rest);
            assert!(parched.state().soil_moisture >= 0.0);
            assert!(parched.state().health_score >= 0.0);
        }
        assert_eq!(parched.state().soil_moisture, 0.0);
    }

    #[test]
    fn growth_stage_advances_with_the_week() {
        let mut engine = engine(flat_climate(27.0, 30.0));
        let mut stages = vec![engine.state().growth_stage];
        for _ in 0..13 {
            play(&mut engine, Action::Rest);
            stages.push(engine.state().growth_stage);
        }
        for (index, stage) in stages.iter().enumerate() {
            assert_eq!(*stage, GrowthStage::for_week(index as u32 + 1));
        }
    }

    #[test]
    fn fertilizing_in_reproductive_weeks_pays_off() {
        let mut engine = engine(flat_climate(27.0, 30.0));
        for _ in 0..8 {
            play(&mut engine, Action::Rest);
        }
        assert_eq!(engine.state().growth_stage, GrowthStage::Reproductive);
        let report = play(&mut engine, Action::Fertilize);
        assert_eq!(report.outcome.health_change, 15.0);
        assert_eq!(report.outcome.soil_moisture_change, -5.0);
    }

    #[test]
    fn final_turn_still_reports_its_outcome() {
        let mut engine = engine(flat_climate(27.0, 30.0));
        for _ in 0..13 {
            play(&mut engine, Action::Rest);
        }
        let report = engine.apply_action(Action::Fertilize).unwrap();
        assert_eq!(report.week, 14);
        assert_eq!(report.outcome.title, "Too Late");
        let last = engine.state().decisions.last().unwrap();
        assert_eq!(last.outcome, report.outcome.message);
        let (low, high) = YieldModel::new().bounds(report.health_score, report.soil_moisture);
        let harvest = report.total_yield.unwrap();
        assert!(harvest >= low - 1e-9 && harvest < high);
    }

    #[test]
    fn unknown_action_names_fail_cleanly() {
        let mut engine = engine(flat_climate(27.0, 30.0));
        assert_eq!(
            engine.apply_named("plough"),
            Err(EngineError::UnknownAction("plough".into()))
        );
        assert!(engine.state().decisions.is_empty());
        assert!(engine.apply_named("irrigate").is_ok());
    }

    #[test]
    fn decision_snapshots_the_week_climate() {
        let climate = ClimateSeries::from_fn("ramp", |week| ClimateSample {
            week,
            temperature: 25.0,
            rainfall: week as f64 * 10.0,
            soil_moisture: 70.0,
            irradiance: 15.0,
        });
        let mut engine = engine(climate);
        play(&mut engine, Action::Rest);
        play(&mut engine, Action::Rest);
        let decisions = &engine.state().decisions;
        assert_eq!(decisions[0].climate.rainfall, 10.0);
        assert_eq!(decisions[1].climate.rainfall, 20.0);
    }
}
