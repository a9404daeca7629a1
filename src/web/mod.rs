//! JSON and server-sent-events surface over a [`DefaultHost`].

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{info, warn};

use crate::{
    climate::ClimateSample,
    crop::CropType,
    engine::EngineError,
    host::{DefaultHost, HostError, SessionView, TurnEvent},
    identity::UserInfo,
    session::{SessionError, SessionId},
};

type AppState = Arc<DefaultHost>;

pub struct WebServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSession {
    pub crop: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitAction {
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub anonymous: bool,
    pub user: Option<UserInfo>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
pub enum ApiError {
    Host(HostError),
    BadRequest(String),
}

impl From<HostError> for ApiError {
    fn from(err: HostError) -> Self {
        ApiError::Host(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Host(HostError::Session(SessionError::NotFound(_))) => StatusCode::NOT_FOUND,
            ApiError::Host(HostError::Engine(err)) => match err {
                EngineError::InvalidState(_) => StatusCode::CONFLICT,
                EngineError::UnknownAction(_) => StatusCode::BAD_REQUEST,
                EngineError::OutOfRange(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };
        let error = match self {
            ApiError::BadRequest(message) => message,
            ApiError::Host(err) => err.to_string(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

pub fn router(game: AppState) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/actions", post(submit_action))
        .route("/api/sessions/:id/settle", post(settle))
        .route("/api/me", get(me))
        .route("/api/events", get(stream_events))
        .with_state(game)
}

pub async fn run(game: AppState, config: WebServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "ecofarm API listening (Ctrl+C to stop)");
    axum::serve(listener, router(game))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

async fn create_session(
    State(game): State<AppState>,
    body: Bytes,
) -> Result<Json<SessionView>, ApiError> {
    // An empty body asks for the default crop.
    let request: CreateSession = if body.is_empty() {
        CreateSession::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::BadRequest(format!("invalid session request: {err}")))?
    };
    let crop = match request.crop {
        Some(name) => name
            .parse::<CropType>()
            .map_err(|err| ApiError::BadRequest(err.to_string()))?,
        None => CropType::default(),
    };
    Ok(Json(game.start_season(crop).await?))
}

async fn get_session(
    State(game): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(game.session(id).await?))
}

async fn submit_action(
    State(game): State<AppState>,
    Path(id): Path<SessionId>,
    Json(request): Json<SubmitAction>,
) -> Result<Json<TurnEvent>, ApiError> {
    Ok(Json(game.submit_action(id, &request.action).await?))
}

async fn settle(
    State(game): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<ClimateSample>, ApiError> {
    Ok(Json(game.settle(id).await?))
}

async fn me(State(game): State<AppState>) -> Json<MeResponse> {
    let user = game.current_user().await;
    Json(MeResponse {
        anonymous: user.is_none(),
        user,
    })
}

async fn stream_events(
    State(game): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(game.subscribe()).filter_map(|msg| match msg {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(payload) => Some(Ok(Event::default().event("turn").data(payload))),
            Err(err) => {
                warn!(error = %err, "dropping unserializable turn event");
                None
            }
        },
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}
