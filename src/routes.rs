use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use include_dir::{Dir, include_dir};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, sync::Arc, time::Duration};
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::{
    credential::{CredentialError, CredentialProvider},
    gemini::ContentGenerator,
    i18n,
    models::{AspectRatio, GenerationRequest, ImageSettings, ImageSize, Language, Platform, Tone},
    orchestrator::{ErrorKind, Orchestrator, OrchestratorError},
    view::{DataUrlError, ImagePayload, SessionView},
};

static UI_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/ui");

pub struct SessionEntry {
    pub orchestrator: Orchestrator,
    pub last_seen: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AppState {
    /// One orchestrator per browser session.
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    pub generator: Arc<dyn ContentGenerator>,
    pub credentials: Arc<dyn CredentialProvider>,
    pub call_timeout: Duration,
}

impl AppState {
    pub fn new(generator: Arc<dyn ContentGenerator>, credentials: Arc<dyn CredentialProvider>, call_timeout: Duration) -> Self {
        Self { sessions: Arc::default(), generator, credentials, call_timeout }
    }

    /// Look up a session and mark it as seen.
    fn orchestrator(&self, id: Uuid) -> Result<Orchestrator, ApiError> {
        let mut sessions = self.sessions.write();
        let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound(id))?;
        entry.last_seen = Utc::now();
        Ok(entry.orchestrator.clone())
    }

    /// Drop sessions unseen for at least `ttl`. Sessions with a call in
    /// flight are kept. Returns how many were removed.
    pub fn evict_idle(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = (now - entry.last_seen).to_std().is_ok_and(|age| age >= ttl);
            let expired = idle && !entry.orchestrator.snapshot().is_busy();
            if expired {
                tracing::debug!("Evicting idle session {}", id);
            }
            !expired
        });
        before - sessions.len()
    }
}

/// Periodically evict sessions idle for longer than `ttl`.
pub async fn sweep_idle_sessions(state: AppState, ttl: Duration) {
    let mut ticker = tokio::time::interval((ttl / 4).max(Duration::from_secs(1)));
    loop {
        ticker.tick().await;
        let evicted = state.evict_idle(Utc::now(), ttl);
        if evicted > 0 {
            tracing::info!("🧹 Evicted {} idle sessions", evicted);
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/assets/*path", get(asset))
        .route("/api/options", get(options))
        .route("/api/credential", get(credential_status).post(select_credential))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/generate", post(generate))
        .route("/api/sessions/:id/settings", put(change_settings))
        .route("/api/sessions/:id/language", put(change_language))
        .route("/api/sessions/:id/cards/:platform/regenerate", post(regenerate_image))
        .route("/api/sessions/:id/cards/:platform/image", get(download_image))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),
    #[error("no image available for {}", .0.label())]
    NoImage(Platform),
    #[error("{message}")]
    Generation { source: OrchestratorError, message: String, session: Box<SessionView> },
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("stored image is unreadable: {0}")]
    Image(#[from] DataUrlError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) | Self::NoImage(_) => StatusCode::NOT_FOUND,
            Self::Credential(CredentialError::Unavailable) => StatusCode::FORBIDDEN,
            Self::Credential(_) => StatusCode::BAD_REQUEST,
            Self::Image(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Generation { source, .. } => match source.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Credential => StatusCode::UNAUTHORIZED,
                ErrorKind::Upstream | ErrorKind::Parse => StatusCode::BAD_GATEWAY,
                ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::Superseded => StatusCode::CONFLICT,
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::NoImage(_) => "no_image",
            Self::Credential(_) => "credential",
            Self::Image(_) => "image",
            Self::Generation { source, .. } => match source.kind() {
                ErrorKind::Validation => "validation",
                ErrorKind::Credential => "credential",
                ErrorKind::Upstream => "upstream",
                ErrorKind::Parse => "parse",
                ErrorKind::Timeout => "timeout",
                ErrorKind::Superseded => "superseded",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({ "error": self.to_string(), "kind": self.kind() });
        if let Self::Generation { session, .. } = &self {
            body["session"] = serde_json::to_value(session.as_ref()).unwrap_or_default();
        }
        (status, Json(body)).into_response()
    }
}

async fn index() -> Response {
    match UI_DIR.get_file("index.html").and_then(|f| f.contents_utf8()) {
        Some(html) => Html(html).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn asset(Path(path): Path<String>) -> Response {
    let Some(file) = UI_DIR.get_file(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let content_type = match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("js") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    };
    ([(header::CONTENT_TYPE, content_type)], file.contents()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct OptionsQuery {
    #[serde(default)]
    pub language: Language,
}

#[derive(Debug, Serialize)]
struct LabeledOption<T> {
    value: T,
    label: &'static str,
}

pub async fn options(Query(query): Query<OptionsQuery>) -> Json<serde_json::Value> {
    let tones: Vec<_> = Tone::ALL.iter().map(|t| LabeledOption { value: *t, label: i18n::tone_label(*t, query.language) }).collect();
    let languages: Vec<_> = Language::ALL.iter().map(|l| LabeledOption { value: *l, label: i18n::language_label(*l) }).collect();
    let sizes: Vec<_> = ImageSize::ALL.iter().map(|s| LabeledOption { value: *s, label: s.as_str() }).collect();
    let ratios: Vec<_> = AspectRatio::ALL.iter().map(|r| LabeledOption { value: *r, label: r.as_str() }).collect();
    Json(json!({
        "tones": tones,
        "languages": languages,
        "image_sizes": sizes,
        "aspect_ratios": ratios,
    }))
}

pub async fn credential_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "has_credential": state.credentials.has_credential().await }))
}

#[derive(Debug, Deserialize)]
pub struct SelectCredentialRequest {
    pub api_key: String,
}

pub async fn select_credential(
    State(state): State<AppState>,
    Json(body): Json<SelectCredentialRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.credentials.select(&body.api_key)?;
    Ok(Json(json!({ "has_credential": true })))
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let id = Uuid::new_v4();
    let orchestrator = Orchestrator::new(state.generator.clone(), state.credentials.clone(), state.call_timeout);
    orchestrator.refresh_credential().await;
    let view = SessionView::project(id, &orchestrator.snapshot());
    state.sessions.write().insert(id, SessionEntry { orchestrator, last_seen: Utc::now() });
    tracing::info!("🎯 Created session {}", id);
    (StatusCode::CREATED, Json(view))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    let orchestrator = state.orchestrator(id)?;
    orchestrator.refresh_credential().await;
    Ok(Json(SessionView::project(id, &orchestrator.snapshot())))
}

pub async fn delete_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.sessions.write().remove(&id).ok_or(ApiError::SessionNotFound(id))?;
    tracing::info!("🗑️ Closed session {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn generate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<GenerationRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let orchestrator = state.orchestrator(id)?;
    match orchestrator.submit(body).await {
        Ok(()) => Ok(Json(SessionView::project(id, &orchestrator.snapshot()))),
        Err(source) => {
            let session = SessionView::project(id, &orchestrator.snapshot());
            let message = session.error.clone().unwrap_or_else(|| source.to_string());
            Err(ApiError::Generation { source, message, session: Box::new(session) })
        }
    }
}

pub async fn change_settings(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<ImageSettings>,
) -> Result<Json<SessionView>, ApiError> {
    let orchestrator = state.orchestrator(id)?;
    orchestrator.change_settings(body);
    Ok(Json(SessionView::project(id, &orchestrator.snapshot())))
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: Language,
}

pub async fn change_language(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<LanguageRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let orchestrator = state.orchestrator(id)?;
    orchestrator.change_language(body.language);
    Ok(Json(SessionView::project(id, &orchestrator.snapshot())))
}

/// `202 Accepted` when a new image call was issued, `200 OK` when there was
/// nothing to regenerate.
pub async fn regenerate_image(
    Path((id, platform)): Path<(Uuid, Platform)>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionView>), ApiError> {
    let orchestrator = state.orchestrator(id)?;
    let status = if orchestrator.regenerate_image(platform) { StatusCode::ACCEPTED } else { StatusCode::OK };
    Ok((status, Json(SessionView::project(id, &orchestrator.snapshot()))))
}

pub async fn download_image(
    Path((id, platform)): Path<(Uuid, Platform)>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let orchestrator = state.orchestrator(id)?;
    let url = orchestrator
        .snapshot()
        .result
        .and_then(|r| r.slot(platform).image_url.clone())
        .ok_or(ApiError::NoImage(platform))?;
    let payload = ImagePayload::from_data_url(&url)?;
    let disposition = format!("attachment; filename=\"{}\"", platform.download_file_name());
    Ok((
        [(header::CONTENT_TYPE, payload.content_type), (header::CONTENT_DISPOSITION, disposition)],
        Body::from(Bytes::from(payload.bytes)),
    )
        .into_response())
}
