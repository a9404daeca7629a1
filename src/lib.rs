pub mod climate;
pub mod config;
pub mod crop;
pub mod engine;
pub mod host;
pub mod identity;
pub mod rng;
pub mod rules;
pub mod session;
pub mod web;
pub mod yield_model;

pub use config::{ConfigLoader, GameConfig};
pub use crop::{CropState, CropType, GrowthStage};
pub use engine::{EngineError, SeasonEngine, TurnReport};
pub use host::{DefaultHost, GameHost};
pub use rules::{Action, OutcomeResult};
pub use yield_model::{HarvestReport, YieldModel};
