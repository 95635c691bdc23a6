use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Twitter,
    Instagram,
}

impl Platform {
    /// Display order of the cards.
    pub const ALL: [Platform; 3] = [Platform::LinkedIn, Platform::Twitter, Platform::Instagram];

    pub fn label(self) -> &'static str {
        match self {
            Platform::LinkedIn => "LinkedIn",
            Platform::Twitter => "Twitter/X",
            Platform::Instagram => "Instagram",
        }
    }

    /// Aspect ratio used when the user leaves the setting on `Auto`.
    pub fn default_aspect_ratio(self) -> AspectRatio {
        match self {
            Platform::LinkedIn => AspectRatio::Portrait3x4,
            Platform::Twitter => AspectRatio::Widescreen16x9,
            Platform::Instagram => AspectRatio::Portrait3x4,
        }
    }

    /// `linkedin-post.png`, `twitter-x-post.png`, `instagram-post.png`.
    pub fn download_file_name(self) -> String {
        format!("{}-post.png", self.label().to_lowercase().replace('/', "-"))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Professional,
    Witty,
    Urgent,
    Inspirational,
    Casual,
}

impl Tone {
    pub const ALL: [Tone; 5] = [Tone::Professional, Tone::Witty, Tone::Urgent, Tone::Inspirational, Tone::Casual];

    /// Label sent to the text model.
    pub fn label(self) -> &'static str {
        match self {
            Tone::Professional => "Professional",
            Tone::Witty => "Witty",
            Tone::Urgent => "Urgent",
            Tone::Inspirational => "Inspirational",
            Tone::Casual => "Casual",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Turkish,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Turkish];

    pub fn label(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Turkish => "Turkish",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1K")]
    Size1K,
    #[serde(rename = "2K")]
    Size2K,
    #[serde(rename = "4K")]
    Size4K,
}

impl ImageSize {
    pub const ALL: [ImageSize; 3] = [ImageSize::Size1K, ImageSize::Size2K, ImageSize::Size4K];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::Size1K => "1K",
            ImageSize::Size2K => "2K",
            ImageSize::Size4K => "4K",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Auto,
    #[serde(rename = "1:1")]
    Square1x1,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Tall9x16,
    #[serde(rename = "16:9")]
    Widescreen16x9,
    #[serde(rename = "2:3")]
    Portrait2x3,
    #[serde(rename = "3:2")]
    Landscape3x2,
    #[serde(rename = "21:9")]
    Ultrawide21x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 9] = [
        AspectRatio::Auto,
        AspectRatio::Square1x1,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Tall9x16,
        AspectRatio::Widescreen16x9,
        AspectRatio::Portrait2x3,
        AspectRatio::Landscape3x2,
        AspectRatio::Ultrawide21x9,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Auto => "Auto",
            AspectRatio::Square1x1 => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Tall9x16 => "9:16",
            AspectRatio::Widescreen16x9 => "16:9",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Ultrawide21x9 => "21:9",
        }
    }

    /// Concrete `w:h` string sent to the image model. A fixed setting wins;
    /// `Auto` falls back to the platform default.
    pub fn resolve_for(self, platform: Platform) -> &'static str {
        match self {
            AspectRatio::Auto => platform.default_aspect_ratio().as_str(),
            fixed => fixed.as_str(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageSettings {
    #[serde(default)]
    pub image_size: ImageSize,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    #[serde(default)]
    pub tone: Tone,
    #[serde(default)]
    pub language: Language,
}

/// One post as returned by the text model, before it is bound to a platform.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DraftPayload {
    pub content: String,
    #[serde(rename = "imagePrompt")]
    pub image_prompt: String,
}

/// Structured JSON body produced by the text model.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlatformDrafts {
    pub linkedin: DraftPayload,
    pub twitter: DraftPayload,
    pub instagram: DraftPayload,
}

impl PlatformDrafts {
    pub fn draft_for(&self, platform: Platform) -> PlatformDraft {
        let payload = match platform {
            Platform::LinkedIn => &self.linkedin,
            Platform::Twitter => &self.twitter,
            Platform::Instagram => &self.instagram,
        };
        PlatformDraft {
            platform,
            text: payload.content.clone(),
            image_prompt: payload.image_prompt.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlatformDraft {
    pub platform: Platform,
    pub text: String,
    pub image_prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageLoadState {
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlatformResult {
    pub draft: PlatformDraft,
    pub image_url: Option<String>,
    pub image_state: ImageLoadState,
    pub image_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PlatformResult {
    pub fn loading(draft: PlatformDraft) -> Self {
        Self { draft, image_url: None, image_state: ImageLoadState::Loading, image_error: None, updated_at: Utc::now() }
    }

    pub fn mark_loading(&mut self) {
        self.image_url = None;
        self.image_error = None;
        self.image_state = ImageLoadState::Loading;
        self.updated_at = Utc::now();
    }

    pub fn mark_loaded(&mut self, image_url: String) {
        self.image_url = Some(image_url);
        self.image_error = None;
        self.image_state = ImageLoadState::Loaded;
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self, reason: String) {
        self.image_url = None;
        self.image_error = Some(reason);
        self.image_state = ImageLoadState::Failed;
        self.updated_at = Utc::now();
    }
}

/// Exactly one slot per platform. Built whole from a text response and only
/// ever touched one slot at a time afterwards.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GenerationResult {
    pub cycle: u64,
    pub linkedin: PlatformResult,
    pub twitter: PlatformResult,
    pub instagram: PlatformResult,
}

impl GenerationResult {
    pub fn from_drafts(cycle: u64, drafts: &PlatformDrafts) -> Self {
        Self {
            cycle,
            linkedin: PlatformResult::loading(drafts.draft_for(Platform::LinkedIn)),
            twitter: PlatformResult::loading(drafts.draft_for(Platform::Twitter)),
            instagram: PlatformResult::loading(drafts.draft_for(Platform::Instagram)),
        }
    }

    pub fn slot(&self, platform: Platform) -> &PlatformResult {
        match platform {
            Platform::LinkedIn => &self.linkedin,
            Platform::Twitter => &self.twitter,
            Platform::Instagram => &self.instagram,
        }
    }

    pub fn slot_mut(&mut self, platform: Platform) -> &mut PlatformResult {
        match platform {
            Platform::LinkedIn => &mut self.linkedin,
            Platform::Twitter => &mut self.twitter,
            Platform::Instagram => &mut self.instagram,
        }
    }

    pub fn any_loading(&self) -> bool {
        Platform::ALL.iter().any(|p| self.slot(*p).image_state == ImageLoadState::Loading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drafts() -> PlatformDrafts {
        let d = |c: &str| DraftPayload { content: c.into(), image_prompt: format!("{c} image") };
        PlatformDrafts { linkedin: d("li"), twitter: d("tw"), instagram: d("ig") }
    }

    #[test]
    fn auto_aspect_ratio_uses_platform_defaults() {
        assert_eq!(AspectRatio::Auto.resolve_for(Platform::LinkedIn), "3:4");
        assert_eq!(AspectRatio::Auto.resolve_for(Platform::Twitter), "16:9");
        assert_eq!(AspectRatio::Auto.resolve_for(Platform::Instagram), "3:4");
    }

    #[test]
    fn fixed_aspect_ratio_is_passed_verbatim() {
        for platform in Platform::ALL {
            assert_eq!(AspectRatio::Widescreen16x9.resolve_for(platform), "16:9");
            assert_eq!(AspectRatio::Ultrawide21x9.resolve_for(platform), "21:9");
        }
    }

    #[test]
    fn download_names_follow_platform_labels() {
        assert_eq!(Platform::LinkedIn.download_file_name(), "linkedin-post.png");
        assert_eq!(Platform::Twitter.download_file_name(), "twitter-x-post.png");
        assert_eq!(Platform::Instagram.download_file_name(), "instagram-post.png");
    }

    #[test]
    fn settings_deserialize_from_ui_labels() {
        let s: ImageSettings = serde_json::from_str(r#"{"image_size":"4K","aspect_ratio":"9:16"}"#).unwrap();
        assert_eq!(s, ImageSettings { image_size: ImageSize::Size4K, aspect_ratio: AspectRatio::Tall9x16 });
        let defaults: ImageSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults.image_size, ImageSize::Size1K);
        assert_eq!(defaults.aspect_ratio, AspectRatio::Auto);
    }

    #[test]
    fn result_from_drafts_starts_every_slot_loading() {
        let result = GenerationResult::from_drafts(7, &drafts());
        assert_eq!(result.cycle, 7);
        for platform in Platform::ALL {
            let slot = result.slot(platform);
            assert_eq!(slot.draft.platform, platform);
            assert_eq!(slot.image_state, ImageLoadState::Loading);
            assert!(slot.image_url.is_none());
        }
        assert_eq!(result.twitter.draft.text, "tw");
        assert_eq!(result.instagram.draft.image_prompt, "ig image");
        assert!(result.any_loading());
    }

    #[test]
    fn slot_transitions_touch_only_that_slot() {
        let mut result = GenerationResult::from_drafts(1, &drafts());
        result.slot_mut(Platform::Twitter).mark_failed("boom".into());
        assert_eq!(result.twitter.image_state, ImageLoadState::Failed);
        assert_eq!(result.twitter.image_error.as_deref(), Some("boom"));
        assert_eq!(result.linkedin.image_state, ImageLoadState::Loading);

        result.slot_mut(Platform::Twitter).mark_loaded("data:image/png;base64,AA==".into());
        assert_eq!(result.twitter.image_state, ImageLoadState::Loaded);
        assert!(result.twitter.image_error.is_none());

        result.slot_mut(Platform::Twitter).mark_loading();
        assert!(result.twitter.image_url.is_none());
    }

    #[test]
    fn drafts_reject_missing_fields() {
        let missing = r#"{"linkedin":{"content":"a","imagePrompt":"b"},"twitter":{"content":"a"},"instagram":{"content":"a","imagePrompt":"b"}}"#;
        assert!(serde_json::from_str::<PlatformDrafts>(missing).is_err());
    }
}
