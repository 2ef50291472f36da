//! Gemini API client
//!
//! Two uses of the `generateContent` endpoint:
//! - speech synthesis: text in, base64 inline PCM out (24 kHz mono s16le)
//! - lesson generation: a lesson name in, structured JSON sentences out

use crate::config::SpeechConfig;
use crate::content::LessonSource;
use crate::error::{Error, Result};
use crate::speech::{SpeechClient, SpeechError};
use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use xunting_common::{Lesson, LessonCategory, Sentence};

const USER_AGENT: &str = concat!("xunting/", env!("CARGO_PKG_VERSION"));

/// Gemini API client
pub struct GeminiClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    tts_model: String,
    voice: String,
    content_model: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: Option<String>,
    pub data: String,
}

/// Lesson content as returned by the generation model
#[derive(Debug, Default, Deserialize)]
pub struct GeneratedLesson {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sentences: Vec<GeneratedSentence>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedSentence {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub translation: String,
}

impl GeminiClient {
    pub fn new(config: &SpeechConfig) -> std::result::Result<Self, SpeechError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SpeechError::Network(e.to_string()))?;

        if config.api_key.is_none() {
            warn!("No Gemini API key configured; speech synthesis will fail");
        }

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            tts_model: config.tts_model.clone(),
            voice: config.voice.clone(),
            content_model: config.content_model.clone(),
        })
    }

    async fn generate(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> std::result::Result<GenerateResponse, SpeechError> {
        let api_key = self.api_key.as_deref().ok_or(SpeechError::MissingApiKey)?;
        let url = format!("{}/models/{}:generateContent", self.endpoint, model);

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Api(status.as_u16(), body));
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| SpeechError::Parse(e.to_string()))
    }

    /// Generate a lesson from a free-text lesson name
    pub async fn generate_lesson(&self, name: &str) -> std::result::Result<Lesson, SpeechError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let prompt = format!(
            "请为我提供文言文或英语课文《{}》的内容。\n\
             要求：分成句子，每一句原文对应一句准确的翻译。\n\
             如果是文言文，翻译要直白易懂。\n\
             返回JSON。",
            name
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "category": { "type": "STRING" },
                        "sentences": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "original": { "type": "STRING" },
                                    "translation": { "type": "STRING" }
                                },
                                "required": ["original", "translation"]
                            }
                        }
                    }
                }
            }
        });

        debug!(lesson = name, model = %self.content_model, "Requesting lesson content");
        let response = self.generate(&self.content_model, body).await?;
        let text = extract_text(&response)?;
        let generated: GeneratedLesson =
            serde_json::from_str(&text).map_err(|e| SpeechError::Parse(e.to_string()))?;
        lesson_from_generated(name, generated)
    }
}

#[async_trait]
impl SpeechClient for GeminiClient {
    async fn synthesize(&self, utterance: &str) -> std::result::Result<Vec<u8>, SpeechError> {
        if utterance.trim().is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let body = json!({
            "contents": [{ "parts": [{ "text": utterance }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.voice }
                    }
                }
            }
        });

        debug!(
            chars = utterance.chars().count(),
            model = %self.tts_model,
            "Requesting speech"
        );
        let response = self.generate(&self.tts_model, body).await?;
        extract_audio(&response)
    }
}

#[async_trait]
impl LessonSource for GeminiClient {
    async fn fetch_lesson(&self, key: &str) -> Result<Lesson> {
        if key.trim().is_empty() {
            return Err(Error::InvalidInput("lesson name is empty".to_string()));
        }
        Ok(self.generate_lesson(key).await?)
    }
}

/// Decode the first inline audio part of a response
pub fn extract_audio(response: &GenerateResponse) -> std::result::Result<Vec<u8>, SpeechError> {
    let inline = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|content| content.parts.iter().find_map(|p| p.inline_data.as_ref()))
        .ok_or(SpeechError::NoAudio)?;

    if let Some(mime) = inline.mime_type.as_deref() {
        debug!(mime_type = mime, "Received audio");
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|e| SpeechError::Parse(format!("invalid base64 audio: {}", e)))?;

    if bytes.is_empty() {
        return Err(SpeechError::NoAudio);
    }
    Ok(bytes)
}

/// Concatenated text parts of the first candidate
pub fn extract_text(response: &GenerateResponse) -> std::result::Result<String, SpeechError> {
    let text: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(SpeechError::Parse("response contains no text".to_string()));
    }
    Ok(text)
}

/// Build a custom lesson from generated content.
///
/// Pairs with an empty original or translation are dropped; sentence ids are
/// `s-{index}` over the kept sentences.
pub fn lesson_from_generated(
    name: &str,
    generated: GeneratedLesson,
) -> std::result::Result<Lesson, SpeechError> {
    let sentences: Vec<Sentence> = generated
        .sentences
        .into_iter()
        .filter(|s| !s.original.trim().is_empty() && !s.translation.trim().is_empty())
        .enumerate()
        .map(|(i, s)| Sentence::new(format!("s-{}", i), s.original.trim(), s.translation.trim()))
        .collect();

    if sentences.is_empty() {
        return Err(SpeechError::Parse(format!("no sentences generated for '{}'", name)));
    }
    if let Some(category) = generated.category.as_deref() {
        debug!(category, "Generated lesson category ignored; stored as custom");
    }

    let title = generated
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| name.to_string());

    Ok(Lesson::new(
        uuid::Uuid::new_v4().to_string(),
        title,
        LessonCategory::Custom,
        sentences,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(value: serde_json::Value) -> GenerateResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_extract_audio_decodes_inline_data() {
        let r = response(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "ignored" },
                { "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=24000", "data": "AAAAgA==" } }
            ]}}]
        }));
        assert_eq!(extract_audio(&r).unwrap(), vec![0x00, 0x00, 0x00, 0x80]);
    }

    #[test]
    fn test_extract_audio_missing_is_no_audio() {
        assert_eq!(extract_audio(&response(json!({}))), Err(SpeechError::NoAudio));
        let r = response(json!({ "candidates": [{ "content": { "parts": [{ "text": "hi" }] } }] }));
        assert_eq!(extract_audio(&r), Err(SpeechError::NoAudio));
        let empty = response(json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "data": "" } }] } }]
        }));
        assert_eq!(extract_audio(&empty), Err(SpeechError::NoAudio));
    }

    #[test]
    fn test_extract_audio_rejects_bad_base64() {
        let r = response(json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "data": "!!!" } }] } }]
        }));
        assert!(matches!(extract_audio(&r), Err(SpeechError::Parse(_))));
    }

    #[test]
    fn test_lesson_from_generated() {
        let generated: GeneratedLesson = serde_json::from_value(json!({
            "title": "论语十则",
            "category": "middle",
            "sentences": [
                { "original": "学而时习之", "translation": "学了又时常温习" },
                { "original": "", "translation": "dropped" },
                { "original": "温故而知新", "translation": "温习旧知识从而得到新的理解" }
            ]
        }))
        .unwrap();

        let lesson = lesson_from_generated("论语", generated).unwrap();
        assert_eq!(lesson.title, "论语十则");
        assert_eq!(lesson.category, LessonCategory::Custom);
        assert_eq!(lesson.len(), 2);
        assert_eq!(lesson.sentences[0].id, "s-0");
        assert_eq!(lesson.sentences[1].id, "s-1");
        assert_eq!(lesson.sentences[1].original, "温故而知新");
        assert!(uuid::Uuid::parse_str(&lesson.id).is_ok());
    }

    #[test]
    fn test_lesson_title_falls_back_to_name() {
        let generated: GeneratedLesson = serde_json::from_value(json!({
            "sentences": [{ "original": "a", "translation": "b" }]
        }))
        .unwrap();
        assert_eq!(lesson_from_generated("陋室铭", generated).unwrap().title, "陋室铭");
    }

    #[test]
    fn test_lesson_without_sentences_is_error() {
        let result = lesson_from_generated("x", GeneratedLesson::default());
        assert!(matches!(result, Err(SpeechError::Parse(_))));
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_request() {
        let client = GeminiClient::new(&SpeechConfig::default()).unwrap();
        assert_eq!(client.synthesize("  ").await, Err(SpeechError::EmptyText));
        assert_eq!(client.generate_lesson("").await.err(), Some(SpeechError::EmptyText));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = GeminiClient::new(&SpeechConfig::default()).unwrap();
        assert_eq!(client.synthesize("你好").await, Err(SpeechError::MissingApiKey));
    }
}
