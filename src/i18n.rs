use crate::models::{Language, Tone};
use serde::Serialize;

/// Every user-visible string the page renders.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct UiStrings {
    pub app_title: &'static str,
    pub connect_key: &'static str,
    pub key_active: &'static str,
    pub headline: &'static str,
    pub subheadline: &'static str,
    pub topic_placeholder: &'static str,
    pub generate: &'static str,
    pub drafting: &'static str,
    pub settings_button: &'static str,
    pub settings_title: &'static str,
    pub resolution_label: &'static str,
    pub resolution_hint: &'static str,
    pub aspect_ratio_label: &'static str,
    pub aspect_ratio_hint: &'static str,
    pub done: &'static str,
    pub empty_state: &'static str,
    pub copy: &'static str,
    pub copied: &'static str,
    pub generating: &'static str,
    pub failed: &'static str,
    pub download: &'static str,
    pub regenerate: &'static str,
    pub prompt: &'static str,
    pub topic_required: &'static str,
    pub credential_failed: &'static str,
    pub generation_failed: &'static str,
}

const ENGLISH: UiStrings = UiStrings {
    app_title: "SocialGenius AI",
    connect_key: "Connect Gemini API",
    key_active: "Gemini Pro Active",
    headline: "What do you want to post about?",
    subheadline: "We'll craft optimized content for every platform instantly.",
    topic_placeholder: "e.g., Just launched a new feature that uses AI to organize photos...",
    generate: "Generate",
    drafting: "Drafting...",
    settings_button: "Image Generation Settings",
    settings_title: "Generation Settings",
    resolution_label: "Image Resolution (Gemini 3 Pro)",
    resolution_hint: "Higher resolutions may take longer to generate.",
    aspect_ratio_label: "Aspect Ratio Preference",
    aspect_ratio_hint: "\"Auto\" selects the optimal ratio for each platform automatically.",
    done: "Done",
    empty_state: "Ready to create content",
    copy: "Copy Text",
    copied: "Copied!",
    generating: "Generating High-Res Image...",
    failed: "Image generation failed",
    download: "Download Image",
    regenerate: "Regenerate Image",
    prompt: "Prompt",
    topic_required: "Please enter a topic for your posts.",
    credential_failed: "Failed to select API Key. Please try again.",
    generation_failed: "An error occurred during generation.",
};

const TURKISH: UiStrings = UiStrings {
    app_title: "SocialGenius AI",
    connect_key: "Gemini API'ye Bağlan",
    key_active: "Gemini Pro Aktif",
    headline: "Ne hakkında paylaşım yapmak istersiniz?",
    subheadline: "Her platform için optimize edilmiş içeriği anında hazırlıyoruz.",
    topic_placeholder: "örn. Fotoğrafları yapay zekâ ile düzenleyen yeni bir özellik yayınladık...",
    generate: "Oluştur",
    drafting: "Taslak hazırlanıyor...",
    settings_button: "Görsel Oluşturma Ayarları",
    settings_title: "Oluşturma Ayarları",
    resolution_label: "Görsel Çözünürlüğü (Gemini 3 Pro)",
    resolution_hint: "Yüksek çözünürlükler daha uzun sürebilir.",
    aspect_ratio_label: "En Boy Oranı Tercihi",
    aspect_ratio_hint: "\"Auto\" her platform için en uygun oranı otomatik seçer.",
    done: "Tamam",
    empty_state: "İçerik oluşturmaya hazır",
    copy: "Metni Kopyala",
    copied: "Kopyalandı!",
    generating: "Yüksek Çözünürlüklü Görsel Oluşturuluyor...",
    failed: "Görsel oluşturulamadı",
    download: "Görseli İndir",
    regenerate: "Görseli Yenile",
    prompt: "İstem",
    topic_required: "Lütfen gönderileriniz için bir konu girin.",
    credential_failed: "API anahtarı seçilemedi. Lütfen tekrar deneyin.",
    generation_failed: "Oluşturma sırasında bir hata oluştu.",
};

pub fn strings(language: Language) -> &'static UiStrings {
    match language {
        Language::English => &ENGLISH,
        Language::Turkish => &TURKISH,
    }
}

/// Tone button label. The model always receives the English label.
pub fn tone_label(tone: Tone, language: Language) -> &'static str {
    match language {
        Language::English => tone.label(),
        Language::Turkish => match tone {
            Tone::Professional => "Profesyonel",
            Tone::Witty => "Esprili",
            Tone::Urgent => "Acil",
            Tone::Inspirational => "İlham Verici",
            Tone::Casual => "Samimi",
        },
    }
}

pub fn language_label(language: Language) -> &'static str {
    match language {
        Language::English => "English",
        Language::Turkish => "Türkçe",
    }
}
