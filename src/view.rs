//! Read-only projection of orchestrator state for the page.

use crate::i18n::{self, UiStrings};
use crate::models::{ImageLoadState, ImageSettings, Language, Platform, PlatformResult};
use crate::orchestrator::{ErrorKind, ErrorNotice, OrchestratorState, Phase};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;
use thiserror::Error;
use uuid::Uuid;

#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct CardView {
    pub platform: Platform,
    pub label: &'static str,
    pub text: String,
    pub image_prompt: String,
    pub image_state: ImageLoadState,
    pub image_url: Option<String>,
    pub image_error: Option<String>,
    pub status_text: Option<&'static str>,
    pub download_name: Option<String>,
    pub can_regenerate: bool,
    pub updated_at: DateTime<Utc>,
}

impl CardView {
    pub fn from_slot(slot: &PlatformResult, strings: &UiStrings) -> Self {
        let platform = slot.draft.platform;
        let status_text = match slot.image_state {
            ImageLoadState::Loading => Some(strings.generating),
            ImageLoadState::Failed => Some(strings.failed),
            ImageLoadState::Loaded => None,
        };
        let download_name = (slot.image_state == ImageLoadState::Loaded && slot.image_url.is_some())
            .then(|| platform.download_file_name());
        Self {
            platform,
            label: platform.label(),
            text: slot.draft.text.clone(),
            image_prompt: slot.draft.image_prompt.clone(),
            image_state: slot.image_state,
            image_url: slot.image_url.clone(),
            image_error: slot.image_error.clone(),
            status_text,
            download_name,
            can_regenerate: slot.image_state != ImageLoadState::Loading,
            updated_at: slot.updated_at,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct SessionView {
    pub id: Uuid,
    pub phase: Phase,
    pub busy: bool,
    pub credential_ready: bool,
    pub settings: ImageSettings,
    pub language: Language,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    /// LinkedIn, Twitter/X, Instagram, in that order.
    pub cards: Option<Vec<CardView>>,
    pub strings: &'static UiStrings,
}

impl SessionView {
    pub fn project(id: Uuid, state: &OrchestratorState) -> Self {
        let strings = i18n::strings(state.language);
        let cards = state.result.as_ref().map(|result| {
            Platform::ALL.iter().map(|p| CardView::from_slot(result.slot(*p), strings)).collect()
        });
        Self {
            id,
            phase: state.phase,
            busy: state.is_busy(),
            credential_ready: state.credential_ready,
            settings: state.settings,
            language: state.language,
            error: state.error.as_ref().map(|n| localized_error(n, strings)),
            error_kind: state.error.as_ref().map(|n| n.kind),
            cards,
            strings,
        }
    }
}

/// Validation and credential errors have fixed translations; upstream errors
/// keep the backend's message.
fn localized_error(notice: &ErrorNotice, strings: &UiStrings) -> String {
    match notice.kind {
        ErrorKind::Validation => strings.topic_required.to_string(),
        ErrorKind::Credential => strings.credential_failed.to_string(),
        _ if notice.message.is_empty() => strings.generation_failed.to_string(),
        _ => notice.message.clone(),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DataUrlError {
    #[error("not a base64 data URL")]
    Malformed,
    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

/// Decoded `data:<mime>;base64,<payload>` image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn from_data_url(url: &str) -> Result<Self, DataUrlError> {
        let rest = url.strip_prefix("data:").ok_or(DataUrlError::Malformed)?;
        let (meta, payload) = rest.split_once(',').ok_or(DataUrlError::Malformed)?;
        let declared = meta.strip_suffix(";base64").ok_or(DataUrlError::Malformed)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| DataUrlError::Base64(e.to_string()))?;
        // Trust the bytes over the declared type when they are recognisable.
        let content_type = match image::guess_format(&bytes) {
            Ok(format) => format.to_mime_type().to_string(),
            Err(_) if !declared.is_empty() => declared.to_string(),
            Err(_) => "application/octet-stream".to_string(),
        };
        Ok(Self { content_type, bytes })
    }
}
