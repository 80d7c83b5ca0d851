use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::{debug, info};

use crate::{
    common::{app_state::AppState, error::ServerError, session_id::generate_session_id},
    lobby::{
        models::{
            CreateLobbyRequest, CreateLobbyResponse, JoinLobbyResponse, StartGameRequest,
            StartGameResponse, SubmitAnswerRequest, SubmitAnswerResponse,
        },
        websocket::events_handler,
    },
};

pub fn lobby_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/newlobby", post(create_lobby))
        // GET so the join link can be pasted straight into a browser
        .route("/joinlobby/{lobby_id}", get(join_lobby))
        .route("/start", post(start_game))
        .route("/answer", post(submit_answer))
        .route("/status/{lobby_id}", get(game_status))
        .route("/events/{lobby_id}/{session_id}", get(events_handler))
        .with_state(state)
}

async fn create_lobby(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateLobbyRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let session_id = generate_session_id();
    let lobby_id = state.get_registry().add_lobby(
        request.question_count,
        request.countdown_ms,
        Some(&session_id),
    )?;

    let response = CreateLobbyResponse {
        session_id,
        lobby_id,
        question_count: request.question_count,
        countdown_ms: request.countdown_ms,
    };

    Ok((StatusCode::OK, Json(response)))
}

async fn join_lobby(
    State(state): State<Arc<AppState>>,
    Path(lobby_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    // Every join is a new player, the session only names it inside this lobby.
    let session_id = generate_session_id();
    state.get_registry().join_lobby(&lobby_id, &session_id)?;

    let response = JoinLobbyResponse {
        message: "Joined lobby successfully".into(),
        lobby_id,
        session_id,
    };

    Ok((StatusCode::OK, Json(response)))
}

async fn start_game(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartGameRequest>,
) -> Result<impl IntoResponse, ServerError> {
    let started = state
        .get_registry()
        .start_game(&request.lobby_id, &request.session_id)?;

    info!(
        "Session {} started lobby {}",
        request.session_id, request.lobby_id
    );

    let response = StartGameResponse {
        countdown_ms: started.countdown_ms,
        question_count: started.question_count,
    };

    Ok((StatusCode::OK, Json(response)))
}

async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, ServerError> {
    // A negative index can never match, usize::MAX adjudicates it as wrong.
    let answer = usize::try_from(request.answer).unwrap_or(usize::MAX);
    let outcome = state.get_registry().submit_answer(
        &request.lobby_id,
        &request.session_id,
        &request.question_id,
        answer,
    )?;

    debug!(
        "Answer from {} in lobby {} awarded {} points",
        request.session_id,
        request.lobby_id,
        outcome.points()
    );

    Ok((StatusCode::OK, Json(SubmitAnswerResponse::from(outcome))))
}

async fn game_status(
    State(state): State<Arc<AppState>>,
    Path(lobby_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let status = state.get_registry().game_status(&lobby_id)?;
    Ok((StatusCode::OK, Json(status)))
}
