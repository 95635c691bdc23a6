//! Generation cycle driver.
//!
//! A cycle drafts text for all three platforms in one call, installs three
//! Loading slots, then fans out one image call per platform. Every image
//! completion is merged into its own slot against the latest state, and only
//! if the result it was issued for is still current.

use crate::credential::{CredentialError, CredentialProvider};
use crate::gemini::{ContentGenerator, GeminiError};
use crate::models::{GenerationRequest, GenerationResult, ImageSettings, Language, Platform, Tone};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Please enter a topic for your posts.")]
    EmptyTopic,
    #[error("Failed to select API Key: {0}")]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Generation(#[from] GeminiError),
    #[error("Gemini did not answer within {0:?}")]
    TimedOut(Duration),
    #[error("A newer generation request replaced this one")]
    Superseded,
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyTopic => ErrorKind::Validation,
            Self::Credential(_) | Self::Generation(GeminiError::MissingCredential) => ErrorKind::Credential,
            Self::Generation(GeminiError::Upstream(_)) => ErrorKind::Upstream,
            Self::Generation(GeminiError::Parse(_)) => ErrorKind::Parse,
            Self::TimedOut(_) => ErrorKind::Timeout,
            Self::Superseded => ErrorKind::Superseded,
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Credential,
    Upstream,
    Parse,
    Timeout,
    Superseded,
}

/// Last error shown to the user. Cleared when a new cycle starts.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&OrchestratorError> for ErrorNotice {
    fn from(err: &OrchestratorError) -> Self {
        Self { kind: err.kind(), message: err.to_string() }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    TextPending,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct OrchestratorState {
    pub phase: Phase,
    /// Id of the most recent submit; the result carries the id it was built under.
    pub cycle: u64,
    pub result: Option<GenerationResult>,
    pub error: Option<ErrorNotice>,
    pub settings: ImageSettings,
    pub language: Language,
    pub credential_ready: bool,
}

impl OrchestratorState {
    pub fn is_busy(&self) -> bool {
        self.phase == Phase::TextPending || self.result.as_ref().is_some_and(GenerationResult::any_loading)
    }
}

struct Inner {
    generator: Arc<dyn ContentGenerator>,
    credentials: Arc<dyn CredentialProvider>,
    state: RwLock<OrchestratorState>,
    changes: watch::Sender<u64>,
    call_timeout: Duration,
}

/// Owns one user's generation state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn ContentGenerator>,
        credentials: Arc<dyn CredentialProvider>,
        call_timeout: Duration,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                generator,
                credentials,
                state: RwLock::new(OrchestratorState::default()),
                changes,
                call_timeout,
            }),
        }
    }

    pub fn snapshot(&self) -> OrchestratorState {
        self.inner.state.read().clone()
    }

    /// Subscribe to state revisions. The value is a counter bumped on every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    /// Resolves once no text or image call is pending.
    pub async fn settled(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `inner`, so the channel cannot close while `self` exists.
        let _ = rx.wait_for(|_| !self.inner.state.read().is_busy()).await;
    }

    /// Apply `f` to the state, then notify subscribers. The lock is released
    /// before notifying so waiters can read state from their predicate.
    fn mutate<R>(&self, f: impl FnOnce(&mut OrchestratorState) -> R) -> R {
        let out = {
            let mut state = self.inner.state.write();
            f(&mut state)
        };
        self.inner.changes.send_modify(|rev| *rev += 1);
        out
    }

    pub async fn refresh_credential(&self) -> bool {
        let ready = self.inner.credentials.has_credential().await;
        self.mutate(|s| s.credential_ready = ready);
        ready
    }

    pub fn change_settings(&self, settings: ImageSettings) {
        info!("⚙️ Image settings: size={} aspect_ratio={}", settings.image_size.as_str(), settings.aspect_ratio.as_str());
        self.mutate(|s| s.settings = settings);
    }

    pub fn change_language(&self, language: Language) {
        self.mutate(|s| s.language = language);
    }

    /// Run the text phase of a new cycle and fan out the image calls.
    ///
    /// Returns once the three slots are installed; image calls continue in
    /// the background. The previous result stays visible while the text call
    /// runs and survives a failed one; it is replaced only when new drafts
    /// are installed.
    ///
    /// The text phase runs on its own task, so dropping the returned future
    /// does not cancel the cycle or leave the session in `TextPending`.
    pub async fn submit(&self, request: GenerationRequest) -> Result<(), OrchestratorError> {
        let topic = request.topic.trim().to_string();
        if topic.is_empty() {
            return Err(self.record_error(OrchestratorError::EmptyTopic));
        }

        if !self.inner.credentials.has_credential().await {
            info!("🔑 No API key yet, requesting one");
            if let Err(e) = self.inner.credentials.request_credential().await {
                self.mutate(|s| s.credential_ready = false);
                return Err(self.record_error(e.into()));
            }
        }

        let cycle = self.mutate(|s| {
            s.cycle += 1;
            s.phase = Phase::TextPending;
            s.error = None;
            s.credential_ready = true;
            s.language = request.language;
            s.cycle
        });
        info!("🚀 Cycle {} started for topic: {}", cycle, topic);

        let task = tokio::spawn(self.clone().run_cycle(cycle, topic, request.tone, request.language));
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("❌ Cycle {} task failed: {}", cycle, e);
                self.mutate(|s| {
                    if s.cycle == cycle {
                        s.phase = Phase::Idle;
                    }
                });
                Err(GeminiError::Upstream(format!("generation task failed: {e}")).into())
            }
        }
    }

    async fn run_cycle(self, cycle: u64, topic: String, tone: Tone, language: Language) -> Result<(), OrchestratorError> {
        let outcome = match tokio::time::timeout(
            self.inner.call_timeout,
            self.inner.generator.generate_text(&topic, tone, language),
        )
        .await
        {
            Ok(Ok(drafts)) => Ok(drafts),
            Ok(Err(e)) => Err(OrchestratorError::from(e)),
            Err(_) => Err(OrchestratorError::TimedOut(self.inner.call_timeout)),
        };

        let installed = self.mutate(|s| {
            if s.cycle != cycle {
                return Err(OrchestratorError::Superseded);
            }
            s.phase = Phase::Idle;
            match &outcome {
                Ok(drafts) => {
                    let result = GenerationResult::from_drafts(cycle, drafts);
                    let prompts = Platform::ALL.map(|p| (p, result.slot(p).draft.image_prompt.clone()));
                    s.result = Some(result);
                    // A validation error raised while this cycle was pending no longer applies.
                    s.error = None;
                    Ok((prompts, s.settings))
                }
                Err(e) => {
                    if matches!(e, OrchestratorError::Generation(GeminiError::MissingCredential)) {
                        s.credential_ready = false;
                    }
                    s.error = Some(ErrorNotice::from(e));
                    Err(e.clone())
                }
            }
        });

        let (prompts, settings) = match installed {
            Ok(ready) => ready,
            Err(OrchestratorError::Superseded) => {
                debug!("Cycle {} superseded before its text arrived", cycle);
                return Err(OrchestratorError::Superseded);
            }
            Err(e) => {
                error!("❌ Cycle {} text generation failed: {}", cycle, e);
                return Err(e);
            }
        };

        info!("✅ Cycle {} drafts ready, generating images", cycle);
        for (platform, prompt) in prompts {
            self.spawn_image(cycle, platform, prompt, settings);
        }
        Ok(())
    }

    /// Re-run one platform's image call. Returns `false` when there is no
    /// result to regenerate against.
    pub fn regenerate_image(&self, platform: Platform) -> bool {
        let issued = self.mutate(|s| {
            let settings = s.settings;
            let result = s.result.as_mut()?;
            let cycle = result.cycle;
            let slot = result.slot_mut(platform);
            slot.mark_loading();
            Some((cycle, slot.draft.image_prompt.clone(), settings))
        });
        match issued {
            Some((cycle, prompt, settings)) => {
                info!("🔄 Regenerating {} image (cycle {})", platform.label(), cycle);
                self.spawn_image(cycle, platform, prompt, settings);
                true
            }
            None => false,
        }
    }

    fn spawn_image(&self, cycle: u64, platform: Platform, prompt: String, settings: ImageSettings) {
        let this = self.clone();
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(
                this.inner.call_timeout,
                this.inner.generator.generate_image(&prompt, platform, settings.image_size, settings.aspect_ratio),
            )
            .await
            {
                Ok(res) => res.map_err(OrchestratorError::from),
                Err(_) => Err(OrchestratorError::TimedOut(this.inner.call_timeout)),
            };
            this.apply_image_outcome(cycle, platform, outcome);
        });
    }

    fn apply_image_outcome(&self, cycle: u64, platform: Platform, outcome: Result<String, OrchestratorError>) {
        self.mutate(|s| {
            let Some(result) = s.result.as_mut().filter(|r| r.cycle == cycle) else {
                debug!("Discarding {} image from stale cycle {}", platform.label(), cycle);
                return;
            };
            let slot = result.slot_mut(platform);
            match outcome {
                Ok(url) => slot.mark_loaded(url),
                Err(e) => {
                    warn!("⚠️ {} image failed: {}", platform.label(), e);
                    slot.mark_failed(e.to_string());
                }
            }
        });
    }

    fn record_error(&self, err: OrchestratorError) -> OrchestratorError {
        warn!("⚠️ {}", err);
        let notice = ErrorNotice::from(&err);
        self.mutate(|s| s.error = Some(notice));
        err
    }
}
