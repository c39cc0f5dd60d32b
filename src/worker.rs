//! Search offloading over message passing
//!
//! A host that must stay responsive can run the engine on a worker thread.
//! Requests and replies are plain values sent over channels, the worker owns
//! its engine, its game snapshot and (through the engine) a fresh
//! transposition table per search. Nothing is shared with the caller.
//!
//! Two request kinds exist: `init` binds an engine to weights, a position and
//! a default depth; `search` runs one `best_moves` call and replies with the
//! tie list. Unknown kinds deserialize to [`WorkerRequest::Unknown`] and are
//! ignored.

use std::thread;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{ScoredMove, SearchEngine, Weights};
use crate::error::{ChainError, Result};
use crate::game::GameState;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerRequest {
    Init {
        state: GameState,
        weights: Weights,
        depth: u32,
    },
    Search {
        depth: u32,
        state: GameState,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkerResponse {
    Ready,
    Moves { moves: Vec<ScoredMove> },
}

/// Synchronous message handler holding the worker-side engine.
#[derive(Debug, Default)]
pub struct SearchHost {
    engine: Option<SearchEngine>,
    state: Option<GameState>,
    depth: u32,
}

impl SearchHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// Current snapshot, as set by the last `init` or `search`.
    pub fn state(&self) -> Option<&GameState> {
        self.state.as_ref()
    }

    pub fn handle(&mut self, request: WorkerRequest) -> Option<WorkerResponse> {
        match request {
            WorkerRequest::Init {
                state,
                weights,
                depth,
            } => {
                debug!(depth, %weights, "worker initialized");
                self.engine = Some(SearchEngine::new(weights));
                self.state = Some(state);
                self.depth = depth;
                Some(WorkerResponse::Ready)
            }
            WorkerRequest::Search { depth, state } => {
                let engine = self.engine.get_or_insert_with(|| {
                    warn!("search received before init, using default weights");
                    SearchEngine::new(Weights::default())
                });
                let moves = engine.best_moves(&state, depth);
                self.state = Some(state);
                self.depth = depth;
                Some(WorkerResponse::Moves { moves })
            }
            WorkerRequest::Unknown => {
                warn!("ignoring unknown worker message");
                None
            }
        }
    }
}

/// A [`SearchHost`] running on its own thread.
pub struct SearchWorker {
    requests: Option<mpsc::UnboundedSender<WorkerRequest>>,
    responses: mpsc::UnboundedReceiver<WorkerResponse>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SearchWorker {
    pub fn spawn() -> Result<Self> {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let handle = thread::Builder::new()
            .name("search-worker".to_string())
            .spawn(move || {
                let mut host = SearchHost::new();
                while let Some(request) = request_rx.blocking_recv() {
                    if let Some(response) = host.handle(request) {
                        if response_tx.send(response).is_err() {
                            break;
                        }
                    }
                }
                debug!("search worker stopped");
            })?;

        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            handle: Some(handle),
        })
    }

    /// Fire-and-forget send.
    pub fn post(&self, request: WorkerRequest) -> Result<()> {
        self.requests
            .as_ref()
            .ok_or(ChainError::WorkerClosed)?
            .send(request)
            .map_err(|_| ChainError::WorkerClosed)
    }

    pub async fn recv(&mut self) -> Option<WorkerResponse> {
        self.responses.recv().await
    }

    /// Blocking variant of [`SearchWorker::recv`], for callers outside a runtime.
    pub fn blocking_recv(&mut self) -> Option<WorkerResponse> {
        self.responses.blocking_recv()
    }

    /// Sends `request` and waits for its reply. Ignored kinds have no reply.
    pub async fn request(&mut self, request: WorkerRequest) -> Result<Option<WorkerResponse>> {
        let expects_reply = !matches!(request, WorkerRequest::Unknown);
        self.post(request)?;
        if !expects_reply {
            return Ok(None);
        }
        self.recv().await.map(Some).ok_or(ChainError::WorkerClosed)
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
