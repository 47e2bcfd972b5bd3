use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use backdrop_common::{is_image_mime, BackdropError};
use backdrop_studio::{Session, SessionSnapshot, SkipReason};

use crate::AppState;

/// File name offered for the generated image download.
pub const RESULT_FILENAME: &str = "enhanced-profile.png";

// --- Request / response bodies ---

#[derive(Deserialize)]
pub struct InstructionBody {
    instruction: String,
}

#[derive(Serialize)]
pub struct GenerateResponse {
    started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped: Option<SkipReason>,
    session: SessionSnapshot,
}

// --- Helpers ---

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn session_not_found(id: Uuid) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("Session {id} not found"))
}

fn backdrop_error_response(err: &BackdropError) -> Response {
    let status = match err {
        BackdropError::Validation(_) => StatusCode::BAD_REQUEST,
        BackdropError::Io(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BackdropError::Service(_) | BackdropError::EmptyResult => StatusCode::BAD_GATEWAY,
        BackdropError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.user_message())
}

/// `Content-Type` without parameters, e.g. `image/png; q=1` → `image/png`.
pub fn declared_mime(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)?
        .to_str()
        .ok()?
        .split(';')
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
}

async fn lookup(state: &AppState, id: Uuid) -> Result<Session, Response> {
    state.session(id).await.ok_or_else(|| session_not_found(id))
}

// --- Handlers ---

pub async fn create_session(State(state): State<Arc<AppState>>) -> Response {
    let session = Session::new(
        state.pipeline.clone(),
        state.encoder,
        state.default_instruction.clone(),
    );
    let snapshot = session.snapshot().await;
    if state.insert_session(session).await.is_err() {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many active sessions, try again later",
        );
    }

    info!(session_id = %snapshot.id, "Session created");
    (StatusCode::CREATED, Json(snapshot)).into_response()
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match lookup(&state, id).await {
        Ok(session) => Json(session.snapshot().await).into_response(),
        Err(resp) => resp,
    }
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    if state.remove_session(id).await {
        info!(session_id = %id, "Session ended");
        StatusCode::NO_CONTENT.into_response()
    } else {
        session_not_found(id)
    }
}

/// Raw image bytes in the body, type in `Content-Type`.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session = match lookup(&state, id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };

    let mime = declared_mime(&headers).unwrap_or_default();
    if !is_image_mime(mime) {
        return error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Please upload an image file",
        );
    }
    if body.len() > session.encoder().max_bytes() {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("Image is too large (max {} bytes)", session.encoder().max_bytes()),
        );
    }

    match session.select_image_bytes(mime, &body).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => backdrop_error_response(&e),
    }
}

pub async fn set_instruction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<InstructionBody>,
) -> Response {
    match lookup(&state, id).await {
        Ok(session) => Json(session.set_instruction(body.instruction).await).into_response(),
        Err(resp) => resp,
    }
}

/// Starts generation in the background and answers immediately; clients
/// poll the session to observe LOADING → SUCCESS/ERROR.
pub async fn generate(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let session = match lookup(&state, id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };

    match session.begin_generate().await {
        Ok(pending) => {
            let snapshot = session.snapshot().await;
            tokio::spawn(async move {
                session.complete(pending).await;
            });
            (
                StatusCode::ACCEPTED,
                Json(GenerateResponse {
                    started: true,
                    skipped: None,
                    session: snapshot,
                }),
            )
                .into_response()
        }
        Err(reason) => Json(GenerateResponse {
            started: false,
            skipped: Some(reason),
            session: session.snapshot().await,
        })
        .into_response(),
    }
}

pub async fn reset(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match lookup(&state, id).await {
        Ok(session) => Json(session.reset().await).into_response(),
        Err(resp) => resp,
    }
}

pub async fn download_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    let session = match lookup(&state, id).await {
        Ok(session) => session,
        Err(resp) => return resp,
    };

    let Some(image) = session.snapshot().await.generated_image else {
        return error_response(StatusCode::NOT_FOUND, "No generated image yet");
    };

    match image.decode() {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, image.mime_type().to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{RESULT_FILENAME}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!(session_id = %id, error = %e, "Stored result failed to decode");
            backdrop_error_response(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn declared_mime_strips_parameters() {
        assert_eq!(declared_mime(&headers("image/png; charset=binary")), Some("image/png"));
        assert_eq!(declared_mime(&headers("image/jpeg")), Some("image/jpeg"));
    }

    #[test]
    fn declared_mime_missing() {
        assert_eq!(declared_mime(&HeaderMap::new()), None);
        assert_eq!(declared_mime(&headers(" ; x=y")), None);
    }

    #[test]
    fn service_failures_are_bad_gateway() {
        let resp = backdrop_error_response(&BackdropError::EmptyResult);
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let resp = backdrop_error_response(&BackdropError::Validation("x".into()));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
