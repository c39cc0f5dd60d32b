use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chain_reaction::worker::{SearchWorker, WorkerRequest};
use chain_reaction::{GameState, Player, Position};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const MOVE_SIZE: usize = 4;
// Bounds on the work a single request can hand to the shared search worker.
const MAX_DEPTH: u32 = 6;
const MAX_CELLS: usize = 400;

// Shared search worker
struct AppState {
    worker: Mutex<SearchWorker>,
}

#[derive(Debug, Default, Deserialize)]
struct NewGameParams {
    rows: Option<usize>,
    columns: Option<usize>,
    first: Option<Player>,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let worker = match SearchWorker::spawn() {
        Ok(worker) => worker,
        Err(e) => {
            error!("failed to start search worker: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        worker: Mutex::new(worker),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/new", get(new_game))
        .route("/moves", post(post_moves))
        .route("/play", post(play_move))
        .route("/worker", post(worker_message))
        .with_state(state)
        .layer(cors);

    let addr = std::env::var("CHAIN_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let addr: SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("invalid CHAIN_ADDR '{}': {}", addr, e);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Listening on {}", addr);
    if let Err(e) = axum::serve(listener, app).await {
        error!("server stopped: {}", e);
    }
}

async fn new_game(Query(params): Query<NewGameParams>) -> Result<Vec<u8>, StatusCode> {
    let rows = params.rows.unwrap_or(5);
    let columns = params.columns.unwrap_or(5);
    let first = params.first.unwrap_or(Player::One);
    if rows.checked_mul(columns).map_or(true, |cells| cells > MAX_CELLS) {
        warn!(rows, columns, max = MAX_CELLS, "rejecting oversized board");
        return Err(StatusCode::BAD_REQUEST);
    }
    let game = GameState::with_first_player(rows, columns, first).map_err(|e| {
        warn!("rejecting new game: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    Ok(game.to_binary())
}

fn check_board_size(game: &GameState) -> Result<(), StatusCode> {
    let cells = game.board().len();
    if cells > MAX_CELLS {
        warn!(cells, max = MAX_CELLS, "rejecting oversized board");
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

/// Rejects searches the worker could be stuck on for too long.
fn check_worker_request(request: &WorkerRequest) -> Result<(), StatusCode> {
    let (depth, game) = match request {
        WorkerRequest::Init { state, depth, .. } => (*depth, state),
        WorkerRequest::Search { depth, state } => (*depth, state),
        WorkerRequest::Unknown => return Ok(()),
    };
    if depth > MAX_DEPTH {
        warn!(depth, max = MAX_DEPTH, "rejecting deep search");
        return Err(StatusCode::BAD_REQUEST);
    }
    check_board_size(game)
}

fn decode_state(bytes: &[u8]) -> Result<GameState, StatusCode> {
    GameState::from_binary(bytes).map_err(|e| {
        warn!("rejecting state: {}", e);
        StatusCode::BAD_REQUEST
    })
}

async fn post_moves(payload: Bytes) -> Result<Vec<u8>, StatusCode> {
    let game = decode_state(&payload)?;
    let mut response = Vec::new();
    for position in game.valid_moves() {
        response.extend_from_slice(&encode_position(position)?);
    }
    Ok(response)
}

async fn play_move(payload: Bytes) -> Result<Vec<u8>, StatusCode> {
    if payload.len() < MOVE_SIZE {
        return Err(StatusCode::BAD_REQUEST);
    }
    let (state_bytes, move_bytes) = payload.split_at(payload.len() - MOVE_SIZE);
    let mut game = decode_state(state_bytes)?;
    let row = u16::from_le_bytes([move_bytes[0], move_bytes[1]]);
    let column = u16::from_le_bytes([move_bytes[2], move_bytes[3]]);
    if !game.apply_move(Position::new(row as usize, column as usize)) {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(game.to_binary())
}

async fn worker_message(State(state): State<Arc<AppState>>, Json(request): Json<WorkerRequest>) -> Response {
    if let Err(status) = check_worker_request(&request) {
        return status.into_response();
    }
    let mut worker = state.worker.lock().await;
    match worker.request(request).await {
        Ok(Some(reply)) => Json(reply).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("search worker failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

fn encode_position(position: Position) -> Result<[u8; MOVE_SIZE], StatusCode> {
    let row = u16::try_from(position.row).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let column = u16::try_from(position.column).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let [r0, r1] = row.to_le_bytes();
    let [c0, c1] = column.to_le_bytes();
    Ok([r0, r1, c0, c1])
}
