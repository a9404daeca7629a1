//! Persistence boundary for season state.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::crop::{CropState, DecisionRecord, GrowthStage, SeasonStatus};

pub type SessionId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub id: SessionId,
    pub state: CropState,
}

/// Fields to overwrite on a stored state. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub week: Option<u32>,
    pub soil_moisture: Option<f64>,
    pub growth_stage: Option<GrowthStage>,
    pub health_score: Option<f64>,
    pub total_yield: Option<f64>,
    pub decisions: Option<Vec<DecisionRecord>>,
    pub status: Option<SeasonStatus>,
}

impl SessionPatch {
    /// Patch that turns any stored state into `state` (crop type aside).
    pub fn from_state(state: &CropState) -> Self {
        Self {
            week: Some(state.week),
            soil_moisture: Some(state.soil_moisture),
            growth_stage: Some(state.growth_stage),
            health_score: Some(state.health_score),
            total_yield: Some(state.total_yield),
            decisions: Some(state.decisions.clone()),
            status: Some(state.status),
        }
    }

    pub fn apply(self, state: &mut CropState) {
        if let Some(week) = self.week {
            state.week = week;
        }
        if let Some(soil_moisture) = self.soil_moisture {
            state.soil_moisture = soil_moisture;
        }
        if let Some(growth_stage) = self.growth_stage {
            state.growth_stage = growth_stage;
        }
        if let Some(health_score) = self.health_score {
            state.health_score = health_score;
        }
        if let Some(total_yield) = self.total_yield {
            state.total_yield = total_yield;
        }
        if let Some(decisions) = self.decisions {
            state.decisions = decisions;
        }
        if let Some(status) = self.status {
            state.status = status;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound(SessionId),
}

pub trait SessionStore {
    fn create(
        &self,
        initial: CropState,
    ) -> impl Future<Output = Result<SessionHandle, SessionError>> + Send;

    fn update(
        &self,
        id: SessionId,
        patch: SessionPatch,
    ) -> impl Future<Output = Result<SessionHandle, SessionError>> + Send;

    fn get(&self, id: SessionId)
        -> impl Future<Output = Result<SessionHandle, SessionError>> + Send;
}

/// Process-local store. Ids start at 1 and are never reused.
#[derive(Debug)]
pub struct InMemorySessionStore {
    next_id: AtomicU64,
    sessions: RwLock<HashMap<SessionId, CropState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    async fn create(&self, initial: CropState) -> Result<SessionHandle, SessionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.write().await.insert(id, initial.clone());
        Ok(SessionHandle { id, state: initial })
    }

    async fn update(
        &self,
        id: SessionId,
        patch: SessionPatch,
    ) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions.write().await;
        let state = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        patch.apply(state);
        Ok(SessionHandle {
            id,
            state: state.clone(),
        })
    }

    async fn get(&self, id: SessionId) -> Result<SessionHandle, SessionError> {
        let sessions = self.sessions.read().await;
        let state = sessions.get(&id).ok_or(SessionError::NotFound(id))?;
        Ok(SessionHandle {
            id,
            state: state.clone(),
        })
    }
}
