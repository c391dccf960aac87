use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{Language, LocaleError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Translation and language detection through an OpenAI-compatible
/// chat-completions endpoint.
#[derive(Clone)]
pub struct OpenAiTranslator {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    /// `None` when no API key is configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.is_translation_configured() {
            debug!("Translation service not configured");
            return None;
        }
        Some(Self::new(&config.openai_base_url, &config.openai_api_key, &config.openai_model))
    }

    pub async fn translate(&self, text: &str, from: Language, to: Language) -> Result<String, LocaleError> {
        if from == to || text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let system = format!(
            "You are a translator for a medical clinic's chat assistant. Translate the user's text from {} to {}. \
             Keep placeholders in curly braces, line breaks and emoji unchanged. Reply with the translation only.",
            from.english_name(),
            to.english_name()
        );

        self.complete(&system, text).await
    }

    pub async fn detect(&self, text: &str) -> Result<Option<Language>, LocaleError> {
        let system = "Identify the language of the user's text. Reply with its ISO 639-1 code only, e.g. 'ja' or 'en'.";
        let answer = self.complete(system, text).await?;

        let code: String = answer
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphanumeric())
            .chars()
            .take_while(|c| c.is_ascii_alphabetic() || *c == '-')
            .collect();
        let detected = Language::from_code(&code);
        debug!("Detected language '{}' -> {:?}", answer.trim(), detected);
        Ok(detected)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, LocaleError> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ]
        });

        let response = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LocaleError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Translation service returned {}: {}", status, text);
            return Err(LocaleError::ServiceUnavailable(format!("{}: {}", status, text)));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| LocaleError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LocaleError::InvalidResponse("empty completion".to_string()))
    }
}
