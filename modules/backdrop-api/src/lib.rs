use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    routing::{get, post, put},
    Router,
};
use tokio::sync::Mutex;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use backdrop_common::config::{DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};
use backdrop_studio::{EditPipeline, Encoder, Session};

pub mod rest;

struct SessionEntry {
    session: Session,
    last_seen: Instant,
}

pub struct AppState {
    pub pipeline: EditPipeline,
    pub encoder: Encoder,
    pub default_instruction: String,
    session_ttl: Duration,
    max_sessions: usize,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

/// The session table is full even after dropping idle sessions.
#[derive(Debug)]
pub struct SessionsFull;

impl AppState {
    pub fn new(pipeline: EditPipeline, encoder: Encoder, default_instruction: String) -> Self {
        Self {
            pipeline,
            encoder,
            default_instruction,
            session_ttl: DEFAULT_SESSION_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Look up a live session and mark it as used.
    pub async fn session(&self, id: Uuid) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        if now.duration_since(sessions.get(&id)?.last_seen) >= self.session_ttl {
            sessions.remove(&id);
            debug!(session_id = %id, "Session expired");
            return None;
        }
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(entry.session.clone())
    }

    /// Register a new session, dropping idle ones first when the table is full.
    pub async fn insert_session(&self, session: Session) -> Result<(), SessionsFull> {
        let mut sessions = self.sessions.lock().await;
        if sessions.len() >= self.max_sessions {
            let now = Instant::now();
            let ttl = self.session_ttl;
            sessions.retain(|_, e| now.duration_since(e.last_seen) < ttl);
        }
        if sessions.len() >= self.max_sessions {
            warn!(max_sessions = self.max_sessions, "Session table full");
            return Err(SessionsFull);
        }
        sessions.insert(
            session.id(),
            SessionEntry {
                session,
                last_seen: Instant::now(),
            },
        );
        Ok(())
    }

    pub async fn remove_session(&self, id: Uuid) -> bool {
        self.sessions.lock().await.remove(&id).is_some()
    }

    /// Drop every session idle for longer than the TTL. Returns how many went.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        let now = Instant::now();
        let ttl = self.session_ttl;
        sessions.retain(|_, e| now.duration_since(e.last_seen) < ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Sweep idle sessions every `period` until the process exits.
pub fn spawn_session_sweeper(state: Arc<AppState>, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            state.evict_idle().await;
        }
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.encoder.max_bytes();

    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Sessions
        .route("/api/sessions", post(rest::create_session))
        .route(
            "/api/sessions/{id}",
            get(rest::get_session).delete(rest::delete_session),
        )
        .route("/api/sessions/{id}/image", put(rest::upload_image))
        .route("/api/sessions/{id}/instruction", put(rest::set_instruction))
        .route("/api/sessions/{id}/generate", post(rest::generate))
        .route("/api/sessions/{id}/reset", post(rest::reset))
        .route("/api/sessions/{id}/result.png", get(rest::download_result))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Images live only in the session; keep them out of caches
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
