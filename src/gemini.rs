use crate::config::GeminiConfig;
use crate::credential::CredentialProvider;
use crate::models::{AspectRatio, ImageSize, Language, Platform, PlatformDrafts, Tone};
use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use serde::Deserialize;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info, error};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeminiError {
    #[error("API Key not found. Please select an API Key.")] MissingCredential,
    #[error("Gemini request failed: {0}")] Upstream(String),
    #[error("Invalid JSON response from Gemini: {0}")] Parse(String),
}

/// The two calls the orchestrator needs from a generative backend.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// One structured call that drafts all three posts.
    async fn generate_text(&self, topic: &str, tone: Tone, language: Language) -> Result<PlatformDrafts, GeminiError>;

    /// Returns a `data:` URL for the first inline image in the response.
    async fn generate_image(
        &self,
        prompt: &str,
        platform: Platform,
        size: ImageSize,
        aspect_ratio: AspectRatio,
    ) -> Result<String, GeminiError>;
}

/// Shorten inline image payloads so raw responses stay readable in debug logs.
fn elide_inline_data(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                match val {
                    serde_json::Value::String(s) if key == "data" && s.len() > 100 => {
                        *s = format!("{}...[{} base64 chars]", preview(s, 32), s.len());
                    }
                    other => elide_inline_data(other),
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(elide_inline_data),
        _ => {}
    }
}

pub struct GeminiClient {
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
    text_model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig, credentials: Arc<dyn CredentialProvider>) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GeminiError::Upstream(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            credentials,
            base_url: config.base_url.clone(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
        })
    }

    async fn perform_api_call(&self, model: &str, request_body: serde_json::Value) -> Result<GeminiResponse, GeminiError> {
        let api_key = self.credentials.api_key().ok_or(GeminiError::MissingCredential)?;
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, api_key);

        info!("🔗 Making request to: {}", url.replace(&api_key, "***"));

        let response = self.client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Upstream(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GeminiError::Upstream(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await
            .map_err(|e| GeminiError::Upstream(e.to_string()))?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            let logged = match serde_json::from_str::<serde_json::Value>(&response_text) {
                Ok(mut json_value) => {
                    elide_inline_data(&mut json_value);
                    json_value.to_string()
                }
                Err(_) => response_text.chars().take(1000).collect(),
            };
            debug!("📥 Raw Gemini API response: {}", logged);
        }

        serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Upstream(format!("unexpected response envelope: {e}")))
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate_text(&self, topic: &str, tone: Tone, language: Language) -> Result<PlatformDrafts, GeminiError> {
        info!("🚀 Drafting posts ({} / {}) with {}", tone.label(), language.label(), self.text_model);

        let request_body = json!({
            "contents": [{
                "parts": [{"text": build_text_prompt(topic, tone, language)}]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": drafts_response_schema()
            }
        });

        let parsed = self.perform_api_call(&self.text_model, request_body).await?;
        let text = extract_text(&parsed).ok_or_else(|| GeminiError::Upstream("No response from Gemini".into()))?;
        let drafts = parse_drafts(&text);
        match &drafts {
            Ok(_) => info!("✅ Drafted posts for all platforms"),
            Err(e) => error!("❌ Failed to parse drafts: {}", e),
        }
        drafts
    }

    async fn generate_image(
        &self,
        prompt: &str,
        platform: Platform,
        size: ImageSize,
        aspect_ratio: AspectRatio,
    ) -> Result<String, GeminiError> {
        let target_ratio = aspect_ratio.resolve_for(platform);
        info!("🎯 Generating {} image ({}, {}) with prompt: {}", platform.label(), target_ratio, size.as_str(), preview(prompt, 100));

        let request_body = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": {
                    "aspectRatio": target_ratio,
                    "imageSize": size.as_str()
                }
            }
        });

        let result = self.perform_api_call(&self.image_model, request_body).await.and_then(|parsed| {
            extract_first_image_data_url(&parsed).ok_or_else(|| GeminiError::Upstream("No image data found in response".into()))
        });
        match &result {
            Ok(url) => info!("✅ {} image generated: [{} chars]", platform.label(), url.len()),
            Err(e) => error!("❌ Error generating image for {}: {}", platform.label(), e),
        }
        result
    }
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

pub fn build_text_prompt(topic: &str, tone: Tone, language: Language) -> String {
    format!(
        "You are a world-class social media manager.\n\
        Topic: \"{topic}\"\n\
        Tone: \"{tone}\"\n\
        Language: \"{language}\"\n\n\
        Generate 3 distinct social media posts, written in {language}:\n\
        1. LinkedIn: Long-form, professional yet engaging, uses line breaks.\n\
        2. Twitter/X: Short, punchy, under 280 chars, maybe 1-2 hashtags.\n\
        3. Instagram: Visual-focused caption, engaging hook, 10-15 relevant hashtags at the bottom.\n\n\
        Also provide a detailed image generation prompt (in English) for each that would suit the platform's aesthetic.\n\
        - LinkedIn image: Professional, clean, infographic or office style.\n\
        - Twitter image: Eye-catching, bold, meme-style or high contrast.\n\
        - Instagram image: Aesthetic, lifestyle, high-quality photography style.",
        tone = tone.label(),
        language = language.label(),
    )
}

fn drafts_response_schema() -> serde_json::Value {
    let post = json!({
        "type": "OBJECT",
        "properties": {
            "content": {"type": "STRING"},
            "imagePrompt": {"type": "STRING"}
        },
        "required": ["content", "imagePrompt"]
    });
    json!({
        "type": "OBJECT",
        "properties": {
            "linkedin": post.clone(),
            "twitter": post.clone(),
            "instagram": post
        },
        "required": ["linkedin", "twitter", "instagram"]
    })
}

/// Decode the model's JSON text into the three drafts. Tolerates a Markdown code fence.
pub fn parse_drafts(text: &str) -> Result<PlatformDrafts, GeminiError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body).map_err(|e| GeminiError::Parse(e.to_string()))
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    #[allow(dead_code)]
    Other(serde_json::Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: Option<String>,
}

/// Concatenated text parts of the first candidate, `None` if there are none.
fn extract_text(resp: &GeminiResponse) -> Option<String> {
    let candidate = resp.candidates.first()?;
    let text: String = candidate.content.parts.iter()
        .filter_map(|p| match p { Part::Text { text } => Some(text.as_str()), _ => None })
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

fn extract_first_image_data_url(resp: &GeminiResponse) -> Option<String> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                let mime = inline_data.mime_type.as_deref().unwrap_or("image/png");
                debug!("🎯 Found image data with mime type: {}", mime);
                return Some(format!("data:{};base64,{}", mime, inline_data.data));
            }
        }
    }
    info!("⚠️ No inline image data found in response structure");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::KeyStore;
    use axum::{extract::{Path, Query, State}, routing::post, Json, Router};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::time::Duration;

    fn response(parts: serde_json::Value) -> GeminiResponse {
        serde_json::from_value(json!({"candidates": [{"content": {"parts": parts}}]})).unwrap()
    }

    #[test]
    fn parses_well_formed_drafts() {
        let text = r#"{"linkedin":{"content":"L","imagePrompt":"LP"},"twitter":{"content":"T","imagePrompt":"TP"},"instagram":{"content":"I","imagePrompt":"IP"}}"#;
        let drafts = parse_drafts(text).unwrap();
        assert_eq!(drafts.linkedin.content, "L");
        assert_eq!(drafts.twitter.image_prompt, "TP");
        assert_eq!(drafts.instagram.content, "I");
    }

    #[test]
    fn parses_fenced_drafts() {
        let text = "```json\n{\"linkedin\":{\"content\":\"L\",\"imagePrompt\":\"LP\"},\"twitter\":{\"content\":\"T\",\"imagePrompt\":\"TP\"},\"instagram\":{\"content\":\"I\",\"imagePrompt\":\"IP\"}}\n```";
        assert!(parse_drafts(text).is_ok());
    }

    #[test]
    fn non_conforming_drafts_are_parse_errors() {
        assert!(matches!(parse_drafts("not json"), Err(GeminiError::Parse(_))));
        assert!(matches!(parse_drafts(r#"{"linkedin":{"content":"L","imagePrompt":"LP"}}"#), Err(GeminiError::Parse(_))));
        assert!(matches!(
            parse_drafts(r#"{"linkedin":{"content":1,"imagePrompt":"LP"},"twitter":{"content":"T","imagePrompt":"TP"},"instagram":{"content":"I","imagePrompt":"IP"}}"#),
            Err(GeminiError::Parse(_))
        ));
    }

    #[test]
    fn first_inline_part_becomes_data_url() {
        let resp = response(json!([
            {"text": "here you go"},
            {"inlineData": {"mimeType": "image/jpeg", "data": "AAAA"}},
            {"inlineData": {"mimeType": "image/png", "data": "BBBB"}}
        ]));
        assert_eq!(extract_first_image_data_url(&resp).as_deref(), Some("data:image/jpeg;base64,AAAA"));
    }

    #[test]
    fn missing_inline_part_yields_none() {
        assert!(extract_first_image_data_url(&response(json!([{"text": "sorry"}]))).is_none());
        assert!(extract_first_image_data_url(&GeminiResponse { candidates: vec![] }).is_none());
    }

    #[test]
    fn text_parts_are_concatenated() {
        let resp = response(json!([{"text": "{\"a\":"}, {"text": "1}"}]));
        assert_eq!(extract_text(&resp).as_deref(), Some("{\"a\":1}"));
        assert!(extract_text(&response(json!([]))).is_none());
    }

    #[test]
    fn prompt_carries_topic_tone_and_language() {
        let prompt = build_text_prompt("launch of photo AI feature", Tone::Witty, Language::Turkish);
        assert!(prompt.contains("launch of photo AI feature"));
        assert!(prompt.contains("Tone: \"Witty\""));
        assert!(prompt.contains("written in Turkish"));
    }

    #[test]
    fn inline_data_is_elided_in_logs() {
        let long = "A".repeat(200);
        let mut value = json!({"parts": [{"inlineData": {"data": long}}, {"data": "short"}]});
        elide_inline_data(&mut value);
        let elided = value["parts"][0]["inlineData"]["data"].as_str().unwrap();
        assert!(elided.ends_with("...[200 base64 chars]"));
        assert_eq!(value["parts"][1]["data"], "short");
    }

    // --- In-process stand-in for the Gemini REST endpoint ---

    #[derive(Clone, Default)]
    struct FakeGemini {
        calls: Arc<Mutex<Vec<(String, String, serde_json::Value)>>>,
        replies: Arc<Mutex<HashMap<String, (u16, serde_json::Value)>>>,
    }

    async fn fake_generate(
        State(fake): State<FakeGemini>,
        Path(call): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<serde_json::Value>,
    ) -> (axum::http::StatusCode, Json<serde_json::Value>) {
        let model = call.trim_end_matches(":generateContent").to_string();
        fake.calls.lock().push((model.clone(), query.get("key").cloned().unwrap_or_default(), body));
        let (status, reply) = fake.replies.lock().get(&model).cloned().unwrap_or((404, json!({"error": "unknown model"})));
        (axum::http::StatusCode::from_u16(status).unwrap(), Json(reply))
    }

    async fn start_fake(fake: FakeGemini) -> String {
        let app = Router::new().route("/models/:call", post(fake_generate)).with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn client_for(base_url: String, key: Option<&str>) -> GeminiClient {
        let config = GeminiConfig {
            base_url,
            text_model: "text-model".into(),
            image_model: "image-model".into(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
        };
        let creds = Arc::new(KeyStore::new("SOCIAL_GENIUS_TEST_NEVER_SET", key.map(str::to_string)));
        GeminiClient::new(&config, creds).unwrap()
    }

    #[tokio::test]
    async fn text_call_sends_schema_and_decodes_drafts() {
        let fake = FakeGemini::default();
        let drafts = r#"{"linkedin":{"content":"L","imagePrompt":"LP"},"twitter":{"content":"T","imagePrompt":"TP"},"instagram":{"content":"I","imagePrompt":"IP"}}"#;
        fake.replies.lock().insert("text-model".into(), (200, json!({"candidates": [{"content": {"parts": [{"text": drafts}]}}]})));
        let client = client_for(start_fake(fake.clone()).await, Some("k-123"));

        let result = client.generate_text("topic", Tone::Professional, Language::English).await.unwrap();
        assert_eq!(result.twitter.content, "T");

        let calls = fake.calls.lock();
        let (model, key, body) = &calls[0];
        assert_eq!(model, "text-model");
        assert_eq!(key, "k-123");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["required"], json!(["linkedin", "twitter", "instagram"]));
    }

    #[tokio::test]
    async fn image_call_resolves_aspect_ratio_and_size() {
        let fake = FakeGemini::default();
        fake.replies.lock().insert("image-model".into(), (200, json!({"candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}]}}]})));
        let client = client_for(start_fake(fake.clone()).await, Some("k"));

        let url = client.generate_image("a cat", Platform::Twitter, ImageSize::Size2K, AspectRatio::Auto).await.unwrap();
        assert_eq!(url, "data:image/png;base64,iVBORw0KGgo=");
        client.generate_image("a cat", Platform::LinkedIn, ImageSize::Size1K, AspectRatio::Square1x1).await.unwrap();

        let calls = fake.calls.lock();
        assert_eq!(calls[0].2["generationConfig"]["imageConfig"], json!({"aspectRatio": "16:9", "imageSize": "2K"}));
        assert_eq!(calls[1].2["generationConfig"]["imageConfig"]["aspectRatio"], "1:1");
    }

    #[tokio::test]
    async fn image_without_inline_data_is_upstream_error() {
        let fake = FakeGemini::default();
        fake.replies.lock().insert("image-model".into(), (200, json!({"candidates": [{"content": {"parts": [{"text": "no"}]}}]})));
        let client = client_for(start_fake(fake).await, Some("k"));
        let err = client.generate_image("p", Platform::Instagram, ImageSize::Size1K, AspectRatio::Auto).await.unwrap_err();
        assert!(matches!(err, GeminiError::Upstream(_)));
    }

    #[tokio::test]
    async fn http_failure_is_upstream_error() {
        let fake = FakeGemini::default();
        fake.replies.lock().insert("text-model".into(), (500, json!({"error": "overloaded"})));
        let client = client_for(start_fake(fake).await, Some("k"));
        let err = client.generate_text("t", Tone::Casual, Language::English).await.unwrap_err();
        assert!(matches!(err, GeminiError::Upstream(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let fake = FakeGemini::default();
        let client = client_for(start_fake(fake.clone()).await, None);
        let err = client.generate_text("t", Tone::Casual, Language::English).await.unwrap_err();
        assert_eq!(err, GeminiError::MissingCredential);
        assert!(fake.calls.lock().is_empty());
    }
}
