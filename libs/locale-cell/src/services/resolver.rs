use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use shared_config::AppConfig;

use crate::models::{Language, LanguageOrigin, LanguageResolution, MessageKey};
use crate::services::catalog::{LanguageCatalog, StaticCatalog};
use crate::services::translator::OpenAiTranslator;

/// Picks the language for a user and turns message keys into text.
///
/// Text lookups never fail: a missing or unavailable catalog degrades to the
/// default language and finally to the built-in English literal.
pub struct LocaleResolver {
    catalog: Arc<dyn LanguageCatalog>,
    default_language: Language,
    translations: RwLock<HashMap<(MessageKey, Language), String>>,
}

impl LocaleResolver {
    pub fn new(catalog: Arc<dyn LanguageCatalog>, default_language: Language) -> Self {
        Self {
            catalog,
            default_language,
            translations: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let default_language = Language::from_code(&config.default_language).unwrap_or_else(|| {
            warn!("DEFAULT_LANGUAGE '{}' is not supported, using ja", config.default_language);
            Language::Ja
        });
        let catalog = StaticCatalog::with_translator(OpenAiTranslator::from_config(config));
        Self::new(Arc::new(catalog), default_language)
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    /// Priority: explicit selection > stored preference > detection > default.
    ///
    /// A detected language is only ever proposed, and never while the user is
    /// in the middle of a flow.
    pub fn resolve_language(
        &self,
        selected: Option<Language>,
        preference: Option<Language>,
        detected: Option<Language>,
        in_flow: bool,
    ) -> LanguageResolution {
        let (language, origin) = match (selected, preference) {
            (Some(language), _) => (language, LanguageOrigin::Selected),
            (None, Some(language)) => (language, LanguageOrigin::Preference),
            (None, None) => match detected {
                Some(language) => (language, LanguageOrigin::Detected),
                None => (self.default_language, LanguageOrigin::Default),
            },
        };

        let proposal = match (origin, detected) {
            (LanguageOrigin::Selected | LanguageOrigin::Preference, Some(found))
                if !in_flow && found != language => Some(found),
            _ => None,
        };

        LanguageResolution { language, origin, proposal }
    }

    /// Catalog detection; an unavailable service reads as "unknown".
    pub async fn detect(&self, text: &str) -> Option<Language> {
        match self.catalog.detect(text).await {
            Ok(language) => language,
            Err(e) => {
                warn!("Language detection unavailable: {}", e);
                None
            }
        }
    }

    pub async fn text(&self, key: MessageKey, language: Language) -> String {
        match self.catalog.resolve(key, language).await {
            Ok(Some(text)) => return text,
            Ok(None) => debug!("No {} entry for {}", language, key),
            Err(e) => warn!("Catalog lookup {} / {} failed: {}", key, language, e),
        }

        if let Some(cached) = self.translations.read().await.get(&(key, language)) {
            return cached.clone();
        }

        let fallback = self.default_text(key).await;
        if language == self.default_language || key.is_keyword_list() {
            return fallback;
        }

        match self.catalog.translate(&fallback, self.default_language, language).await {
            Ok(translated) => {
                self.translations.write().await.insert((key, language), translated.clone());
                translated
            }
            Err(e) => {
                debug!("Translation of {} to {} unavailable: {}", key, language, e);
                fallback
            }
        }
    }

    /// Text with `{name}` placeholders substituted.
    pub async fn render(&self, key: MessageKey, language: Language, values: &[(&str, &str)]) -> String {
        let mut text = self.text(key, language).await;
        for (name, value) in values {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }

    /// Lower-cased alternatives for a keyword key, across the user's
    /// language, the default language and English.
    pub async fn keywords(&self, key: MessageKey, language: Language) -> Vec<String> {
        let mut languages = vec![language, self.default_language, Language::En];
        languages.dedup();

        let mut keywords: Vec<String> = Vec::new();
        for lang in languages {
            let raw = match self.catalog.resolve(key, lang).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Keyword lookup {} / {} failed: {}", key, lang, e);
                    continue;
                }
            };
            for word in raw.split('|').map(|w| w.trim().to_lowercase()).filter(|w| !w.is_empty()) {
                if !keywords.contains(&word) {
                    keywords.push(word);
                }
            }
        }

        if keywords.is_empty() {
            keywords.extend(
                literal(key).split('|').map(|w| w.trim().to_lowercase()).filter(|w| !w.is_empty()),
            );
        }
        keywords
    }

    async fn default_text(&self, key: MessageKey) -> String {
        match self.catalog.resolve(key, self.default_language).await {
            Ok(Some(text)) => text,
            Ok(None) => literal(key).to_string(),
            Err(e) => {
                warn!("Catalog lookup {} / {} failed: {}", key, self.default_language, e);
                literal(key).to_string()
            }
        }
    }
}

/// Built-in English text, independent of any catalog.
fn literal(key: MessageKey) -> &'static str {
    StaticCatalog::lookup(key, Language::En).unwrap_or_else(|| key.as_str())
}
