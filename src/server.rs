//! CTF Scoreboard Server
//!
//! HTTP surface over the adjudicator and the leaderboard service.
//!
//! Every response uses the same envelope:
//! `{"status": "success" | "error", "message"?, "kind"?, "data"?}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        ConnectInfo, Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::adjudicator::Adjudicator;
use crate::auth::{client_ip, require_admin, user_id_from_headers};
use crate::error::CoreError;
use crate::leaderboard::LeaderboardService;
use crate::models::{ChallengeId, EventId, LedgerKind};

pub struct AppState {
    pub adjudicator: Adjudicator,
    pub leaderboard: LeaderboardService,
    pub admin_token: Option<String>,
    pub started_at: std::time::Instant,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/challenges/:id/submit", post(submit_handler))
        .route("/challenges/:id/leaderboard", get(challenge_leaderboard_handler))
        .route("/events/:id/challenges", get(challenges_handler))
        .route("/events/:id/scoreboard", get(scoreboard_handler))
        .route("/events/:id/team-leaderboard", get(team_leaderboard_handler))
        .route("/events/:id/submissions", get(submissions_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// ENVELOPE
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: None,
            kind: None,
            data: Some(data),
        }
    }
}

fn ok<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(Envelope::success(data))).into_response()
}

/// [`CoreError`] rendered as an HTTP response
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(CoreError::Validation(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self(CoreError::Validation(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(CoreError::Validation(rejection.body_text()))
    }
}

pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Validation(_) | CoreError::AlreadySolvedByTeam | CoreError::IncorrectFlag => {
            StatusCode::BAD_REQUEST
        }
        CoreError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        CoreError::EventNotStarted
        | CoreError::EventEnded
        | CoreError::NoTeamForUser
        | CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::EventNotFound(_) | CoreError::ChallengeNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = match &self.0 {
            CoreError::Storage(e) => {
                let reference = Uuid::new_v4();
                error!("Internal error [{}]: {:#}", reference, e);
                format!("{} (ref {})", self.0.public_message(), reference)
            }
            other => other.public_message(),
        };

        let body = Envelope::<()> {
            status: "error".to_string(),
            message: Some(message),
            kind: Some(self.0.kind().to_string()),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

// ============================================================================
// HANDLERS
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    healthy: bool,
    version: String,
    uptime_secs: u64,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    ok(
        StatusCode::OK,
        HealthResponse {
            healthy: true,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: state.started_at.elapsed().as_secs(),
        },
    )
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub submission: String,
}

async fn submit_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    path: Result<Path<ChallengeId>, PathRejection>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult {
    let Path(challenge_id) = path?;
    let user_id = user_id_from_headers(&headers).ok_or(CoreError::NotAuthenticated)?;
    let Json(request) = body?;
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));

    let outcome = state
        .adjudicator
        .submit(challenge_id, Some(user_id), &request.submission, ip.as_deref())
        .await?;
    Ok(ok(StatusCode::CREATED, outcome))
}

async fn challenges_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    path: Result<Path<EventId>, PathRejection>,
) -> ApiResult {
    let Path(event_id) = path?;
    let listing = state
        .leaderboard
        .challenge_list(event_id, user_id_from_headers(&headers))
        .await?;
    Ok(ok(StatusCode::OK, listing))
}

async fn scoreboard_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<EventId>, PathRejection>,
) -> ApiResult {
    let Path(event_id) = path?;
    let board = state.leaderboard.event_leaderboard(event_id).await?;
    Ok(ok(StatusCode::OK, board))
}

async fn team_leaderboard_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    path: Result<Path<EventId>, PathRejection>,
) -> ApiResult {
    let Path(event_id) = path?;
    let board = state
        .leaderboard
        .team_leaderboard(event_id, user_id_from_headers(&headers))
        .await?;
    Ok(ok(StatusCode::OK, board))
}

async fn challenge_leaderboard_handler(
    State(state): State<Arc<AppState>>,
    path: Result<Path<ChallengeId>, PathRejection>,
) -> ApiResult {
    let Path(challenge_id) = path?;
    let board = state.leaderboard.challenge_leaderboard(challenge_id).await?;
    Ok(ok(StatusCode::OK, board))
}

#[derive(Debug, Deserialize)]
pub struct SubmissionsQuery {
    pub kind: LedgerKind,
    pub limit: Option<i64>,
}

async fn submissions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    path: Result<Path<EventId>, PathRejection>,
    query: Result<Query<SubmissionsQuery>, QueryRejection>,
) -> ApiResult {
    require_admin(&headers, state.admin_token.as_deref())?;
    let Path(event_id) = path?;
    let Query(query) = query?;

    let log = state
        .leaderboard
        .submission_log(event_id, query.kind, query.limit)
        .await?;
    Ok(ok(StatusCode::OK, log))
}

/// Run the server
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = format!("{}:{}", host, port);

    info!("Starting CTF scoreboard server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
