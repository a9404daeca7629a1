//! Outcome rules: the game balance for every weekly action.
//!
//! Each action owns an ordered decision list. Conditions overlap on purpose
//! (a hot, dry week satisfies both heat and drought stress), so the first rule
//! whose condition holds decides the outcome.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::climate::ClimateSample;
use crate::crop::{CropState, GrowthStage};
use crate::engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Irrigate,
    Fertilize,
    Rest,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Irrigate, Action::Fertilize, Action::Rest];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Irrigate => "irrigate",
            Action::Fertilize => "fertilize",
            Action::Rest => "rest",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == value.trim())
            .ok_or_else(|| EngineError::UnknownAction(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeResult {
    pub soil_moisture_change: f64,
    pub health_change: f64,
    pub feedback: FeedbackKind,
    pub title: String,
    pub message: String,
    pub learning_note: Option<String>,
}

/// The facts a rule may look at.
#[derive(Debug, Clone, Copy)]
struct Conditions {
    rainfall: f64,
    temperature: f64,
    soil_moisture: f64,
    stage: GrowthStage,
}

struct Rule {
    when: fn(&Conditions) -> bool,
    outcome: Narrative,
}

struct Narrative {
    health_change: f64,
    feedback: FeedbackKind,
    title: &'static str,
    /// May reference `{rainfall}` and `{temperature}`.
    message: &'static str,
    learning_note: Option<&'static str>,
}

/// First matching rule wins; `otherwise` applies when none match.
struct DecisionList {
    rules: &'static [Rule],
    otherwise: Narrative,
}

impl DecisionList {
    fn decide(&self, conditions: &Conditions) -> &Narrative {
        self.rules
            .iter()
            .find(|rule| (rule.when)(conditions))
            .map(|rule| &rule.outcome)
            .unwrap_or(&self.otherwise)
    }

    #[cfg(test)]
    fn narratives(&self) -> impl Iterator<Item = &Narrative> {
        self.rules
            .iter()
            .map(|rule| &rule.outcome)
            .chain(std::iter::once(&self.otherwise))
    }
}

fn flooding(c: &Conditions) -> bool {
    c.rainfall > 100.0
}

fn saturated(c: &Conditions) -> bool {
    c.soil_moisture > 80.0
}

fn parched(c: &Conditions) -> bool {
    c.soil_moisture < 40.0
}

fn reproductive(c: &Conditions) -> bool {
    c.stage == GrowthStage::Reproductive
}

fn mature(c: &Conditions) -> bool {
    c.stage == GrowthStage::Maturity
}

fn heat_wave(c: &Conditions) -> bool {
    c.temperature > 32.0
}

fn drought(c: &Conditions) -> bool {
    c.rainfall < 20.0 && c.soil_moisture < 40.0
}

fn waterlogged(c: &Conditions) -> bool {
    c.rainfall > 80.0 && c.soil_moisture > 70.0
}

static IRRIGATE: DecisionList = DecisionList {
    rules: &[
        Rule {
            when: flooding,
            outcome: Narrative {
                health_change: -15.0,
                feedback: FeedbackKind::Warning,
                title: "Over-Irrigation Warning!",
                message: "Heavy rainfall ({rainfall}mm) combined with irrigation caused flooding. Your rice plants are stressed from waterlogged conditions.",
                learning_note: Some("During high rainfall periods, additional irrigation can lead to flooding and root damage. Monitor weather forecasts before irrigating."),
            },
        },
        Rule {
            when: saturated,
            outcome: Narrative {
                health_change: -8.0,
                feedback: FeedbackKind::Warning,
                title: "Excess Moisture",
                message: "Soil was already well-saturated. Over-irrigation can lead to nutrient leaching and disease.",
                learning_note: Some("Rice needs consistent moisture, but excessive water reduces oxygen availability to roots."),
            },
        },
        Rule {
            when: parched,
            outcome: Narrative {
                health_change: 10.0,
                feedback: FeedbackKind::Success,
                title: "Good Decision!",
                message: "Your irrigation helped restore optimal moisture levels. Plants are thriving!",
                learning_note: Some("Rice requires 4-6 inches of standing water during active growth, especially in the reproductive stage."),
            },
        },
    ],
    otherwise: Narrative {
        health_change: 5.0,
        feedback: FeedbackKind::Success,
        title: "Moisture Maintained",
        message: "Irrigation maintained good soil moisture levels for healthy growth.",
        learning_note: None,
    },
};

static FERTILIZE: DecisionList = DecisionList {
    rules: &[
        Rule {
            when: reproductive,
            outcome: Narrative {
                health_change: 15.0,
                feedback: FeedbackKind::Success,
                title: "Perfect Timing!",
                message: "Fertilizing during the reproductive stage boosts grain formation. Excellent choice!",
                learning_note: Some("The reproductive stage is critical for yield. Proper nutrition during flowering maximizes grain production."),
            },
        },
        Rule {
            when: mature,
            outcome: Narrative {
                health_change: -5.0,
                feedback: FeedbackKind::Warning,
                title: "Too Late",
                message: "Fertilizing at maturity has minimal benefit and can delay harvest.",
                learning_note: Some("Late-season fertilization is generally ineffective. Focus on earlier growth stages."),
            },
        },
    ],
    otherwise: Narrative {
        health_change: 8.0,
        feedback: FeedbackKind::Success,
        title: "Growth Boost",
        message: "Fertilizer provides essential nutrients for plant development.",
        learning_note: Some("Split fertilizer applications throughout the season optimize nutrient uptake."),
    },
};

static REST: DecisionList = DecisionList {
    rules: &[
        Rule {
            when: heat_wave,
            outcome: Narrative {
                health_change: -12.0,
                feedback: FeedbackKind::Warning,
                title: "Heat Stress",
                message: "High temperature ({temperature}°C) without intervention caused heat stress. Plants need more water!",
                learning_note: Some("Rice is sensitive to temperatures above 35°C, especially during flowering. Consider irrigation during heat waves."),
            },
        },
        Rule {
            when: drought,
            outcome: Narrative {
                health_change: -10.0,
                feedback: FeedbackKind::Warning,
                title: "Drought Stress",
                message: "Low rainfall and you chose to rest. Plants are experiencing drought stress.",
                learning_note: Some("During dry periods, active management is crucial to maintain crop health."),
            },
        },
        Rule {
            when: waterlogged,
            outcome: Narrative {
                health_change: -5.0,
                feedback: FeedbackKind::Info,
                title: "Natural Conditions",
                message: "High rainfall led to waterlogged conditions. Sometimes less intervention is better, but monitor closely.",
                learning_note: None,
            },
        },
    ],
    otherwise: Narrative {
        health_change: 3.0,
        feedback: FeedbackKind::Success,
        title: "Nature Balanced",
        message: "Weather conditions were favorable. Your crops grew steadily with minimal intervention.",
        learning_note: Some("Optimal conditions allow plants to thrive naturally, reducing the need for inputs."),
    },
};

impl Action {
    fn decision_list(self) -> &'static DecisionList {
        match self {
            Action::Irrigate => &IRRIGATE,
            Action::Fertilize => &FERTILIZE,
            Action::Rest => &REST,
        }
    }

    fn soil_moisture_change(self, conditions: &Conditions) -> f64 {
        match self {
            Action::Irrigate => 20.0,
            Action::Fertilize => -5.0,
            Action::Rest if conditions.rainfall > 50.0 => 10.0,
            Action::Rest => -10.0,
        }
    }
}

/// Outcome of taking `action` in `climate` given the crop as it stood before
/// the action.
pub fn evaluate(action: Action, climate: &ClimateSample, state: &CropState) -> OutcomeResult {
    let conditions = Conditions {
        rainfall: climate.rainfall,
        temperature: climate.temperature,
        soil_moisture: state.soil_moisture,
        stage: state.growth_stage,
    };
    let narrative = action.decision_list().decide(&conditions);

    OutcomeResult {
        soil_moisture_change: action.soil_moisture_change(&conditions),
        health_change: narrative.health_change,
        feedback: narrative.feedback,
        title: narrative.title.to_string(),
        message: render(narrative.message, &conditions),
        learning_note: narrative.learning_note.map(str::to_string),
    }
}

fn render(template: &str, conditions: &Conditions) -> String {
    template
        .replace("{rainfall}", &format!("{:.0}", conditions.rainfall.round()))
        .replace("{temperature}", &format!("{:.1}", conditions.temperature))
}
