//! Runs many seasons side by side, one engine per stored session.

use std::collections::HashMap;
use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::climate::{self, ClimateSample, ClimateSource, ConfiguredSource, DateRange};
use crate::crop::{CropState, CropType};
use crate::rules::Action;
use crate::engine::{EngineError, SeasonEngine, StateConflict, TurnReport};
use crate::identity::{IdentityProvider, StaticIdentity, UserInfo};
use crate::rng::RngManager;
use crate::session::{
    InMemorySessionStore, SessionError, SessionId, SessionPatch, SessionStore,
};
use crate::yield_model::HarvestReport;

const EVENT_CAPACITY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// What a client sees of one season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub id: SessionId,
    pub state: CropState,
    /// Climate the next action will meet; absent while a turn awaits settle
    /// and once the season is over.
    pub current_climate: Option<ClimateSample>,
    pub awaiting_settle: bool,
    pub stage_label: String,
    pub stage_description: String,
    pub source_tag: String,
    pub date_range: Option<DateRange>,
    pub harvest: Option<HarvestReport>,
}

/// Published after every accepted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnEvent {
    pub session_id: SessionId,
    pub turn: TurnReport,
    pub harvest: Option<HarvestReport>,
}

pub type DefaultHost = GameHost<InMemorySessionStore, ConfiguredSource, StaticIdentity>;

/// A live engine, or what is left of it once the store holds the final state.
enum Season {
    Live(SeasonEngine),
    Finished {
        source_tag: String,
        date_range: Option<DateRange>,
    },
}

impl Season {
    fn retire(engine: &SeasonEngine) -> Self {
        Season::Finished {
            source_tag: engine.climate().source_tag().to_string(),
            date_range: engine.climate().date_range(),
        }
    }
}

pub struct GameHost<S, C, I> {
    store: S,
    climate: C,
    identity: I,
    rng: Mutex<RngManager>,
    seasons: AsyncMutex<HashMap<SessionId, Season>>,
    events: broadcast::Sender<TurnEvent>,
}

impl<S, C, I> GameHost<S, C, I>
where
    S: SessionStore,
    C: ClimateSource,
    I: IdentityProvider,
{
    pub fn new(store: S, climate: C, identity: I, seed: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            climate,
            identity,
            rng: Mutex::new(RngManager::new(seed)),
            seasons: AsyncMutex::new(HashMap::new()),
            events,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe()
    }

    pub async fn start_season(&self, crop: CropType) -> Result<SessionView, HostError> {
        let climate_seed: u64 = {
            let mut rng = self.rng.lock().expect("rng lock poisoned");
            rng.stream("climate").gen()
        };
        let mut climate_rng = ChaCha8Rng::seed_from_u64(climate_seed);
        let series = climate::resolve(&self.climate, &mut climate_rng).await;

        let handle = self.store.create(CropState::new(crop)).await?;
        let yield_rng = self
            .rng
            .lock()
            .expect("rng lock poisoned")
            .fork(&format!("yield:{}", handle.id));
        let engine = SeasonEngine::new(crop, series, yield_rng)?;
        info!(
            session = handle.id,
            crop = %crop,
            climate = engine.climate().source_tag(),
            "season started"
        );

        let view = live_view(handle.id, handle.state, &engine);
        self.seasons.lock().await.insert(handle.id, Season::Live(engine));
        Ok(view)
    }

    /// Plays one turn. The engine only advances once the store has accepted
    /// the new state; any error leaves both untouched.
    pub async fn submit_action(
        &self,
        id: SessionId,
        action: &str,
    ) -> Result<TurnEvent, HostError> {
        let mut seasons = self.seasons.lock().await;
        let mut staged = match seasons.get(&id) {
            Some(Season::Live(engine)) => engine.clone(),
            Some(Season::Finished { .. }) => {
                action.parse::<Action>()?;
                return Err(EngineError::InvalidState(StateConflict::SeasonCompleted).into());
            }
            None => return Err(SessionError::NotFound(id).into()),
        };
        let turn = staged.apply_named(action)?;
        let harvest = staged.harvest_report();
        // Persist before releasing the seasons so stored states stay in turn order.
        self.store
            .update(id, SessionPatch::from_state(staged.state()))
            .await?;
        let next = if staged.is_completed() {
            debug!(session = id, "releasing engine of completed season");
            Season::retire(&staged)
        } else {
            Season::Live(staged)
        };
        seasons.insert(id, next);
        drop(seasons);

        let event = TurnEvent {
            session_id: id,
            turn,
            harvest,
        };
        if self.events.send(event.clone()).is_err() {
            debug!(session = id, "no turn event subscribers");
        }
        Ok(event)
    }

    pub async fn settle(&self, id: SessionId) -> Result<ClimateSample, HostError> {
        let mut seasons = self.seasons.lock().await;
        match seasons.get_mut(&id) {
            Some(Season::Live(engine)) => Ok(*engine.settle()?),
            Some(Season::Finished { .. }) => {
                Err(EngineError::InvalidState(StateConflict::SeasonCompleted).into())
            }
            None => Err(SessionError::NotFound(id).into()),
        }
    }

    pub async fn session(&self, id: SessionId) -> Result<SessionView, HostError> {
        let handle = self.store.get(id).await?;
        let seasons = self.seasons.lock().await;
        match seasons.get(&id) {
            Some(Season::Live(engine)) => Ok(live_view(id, handle.state, engine)),
            Some(Season::Finished {
                source_tag,
                date_range,
            }) => Ok(SessionView {
                id,
                current_climate: None,
                awaiting_settle: false,
                stage_label: handle.state.growth_stage.label().to_string(),
                stage_description: handle.state.growth_stage.description().to_string(),
                source_tag: source_tag.clone(),
                date_range: *date_range,
                harvest: HarvestReport::from_state(&handle.state),
                state: handle.state,
            }),
            None => Err(SessionError::NotFound(id).into()),
        }
    }

    /// `None` when nobody is signed in or the provider fails.
    pub async fn current_user(&self) -> Option<UserInfo> {
        match self.identity.current_user().await {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(error = %err, "playing anonymously");
                None
            }
        }
    }
}

fn live_view(id: SessionId, state: CropState, engine: &SeasonEngine) -> SessionView {
    SessionView {
        id,
        current_climate: engine.current_climate_sample().ok().copied(),
        awaiting_settle: engine.is_awaiting_settle(),
        stage_label: state.growth_stage.label().to_string(),
        stage_description: state.growth_stage.description().to_string(),
        state,
        source_tag: engine.climate().source_tag().to_string(),
        date_range: engine.climate().date_range(),
        harvest: engine.harvest_report(),
    }
}
