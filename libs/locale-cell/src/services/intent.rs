use std::sync::Arc;

use tracing::debug;

use crate::models::{Escape, Intent, Language, MessageKey};
use crate::services::resolver::LocaleResolver;

/// Prefixes for values carried by choice buttons, matched before keywords.
pub const LANGUAGE_PREFIX: &str = "lang:";
pub const MENU_PREFIX: &str = "menu:";
pub const NAV_PREFIX: &str = "nav:";
pub const CONFIRM_PREFIX: &str = "confirm:";
pub const DATE_PREFIX: &str = "date:";
pub const TIME_PREFIX: &str = "time:";

/// Order matters: earlier entries win when a message matches several lists.
const INTENT_KEYWORDS: [(MessageKey, Intent); 9] = [
    (MessageKey::KeywordsMyId, Intent::MyId),
    (MessageKey::KeywordsBook, Intent::Book),
    (MessageKey::KeywordsCancel, Intent::CancelAppointment),
    (MessageKey::KeywordsHelp, Intent::Help),
    (MessageKey::KeywordsLanguage, Intent::ChangeLanguage),
    (MessageKey::KeywordsTalk, Intent::TalkToClinic),
    (MessageKey::KeywordsInfo, Intent::ClinicInfo),
    (MessageKey::KeywordsMenu, Intent::Menu),
    (MessageKey::KeywordsGreeting, Intent::Greeting),
];

/// Maps free text and button values onto language-agnostic intents.
pub struct IntentClassifier {
    locale: Arc<LocaleResolver>,
}

impl IntentClassifier {
    pub fn new(locale: Arc<LocaleResolver>) -> Self {
        Self { locale }
    }

    /// Top-level intent of a message, for users not inside a flow.
    pub async fn classify(&self, text: &str, language: Language) -> Intent {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Intent::Unknown;
        }

        if let Some(intent) = structured(&normalized) {
            return intent;
        }
        if let Some(language) = Language::ALL.iter().find(|l| normalized == l.native_name().to_lowercase()) {
            return Intent::SelectLanguage(*language);
        }

        for (key, intent) in INTENT_KEYWORDS {
            let keywords = self.locale.keywords(key, language).await;
            if keywords.iter().any(|keyword| contains_keyword(&normalized, keyword)) {
                debug!("Classified '{}' as {:?}", normalized, intent);
                return intent;
            }
        }

        Intent::Unknown
    }

    /// An explicit cancel or menu request, recognized at every step.
    ///
    /// Only whole-message matches count so that a reason such as "cancel my
    /// previous visit" is still taken as an answer.
    pub async fn escape(&self, text: &str, language: Language) -> Option<Escape> {
        let normalized = normalize(text);
        match normalized.as_str() {
            "nav:cancel" => return Some(Escape::Cancel),
            "nav:menu" | "menu:main" => return Some(Escape::Menu),
            "nav:language" => return Some(Escape::Language),
            _ => {}
        }

        if self.matches_exactly(&normalized, MessageKey::KeywordsCancel, language).await {
            return Some(Escape::Cancel);
        }
        if self.matches_exactly(&normalized, MessageKey::KeywordsMenu, language).await {
            return Some(Escape::Menu);
        }
        None
    }

    /// `Some(true)` for yes, `Some(false)` for no, `None` when unclear.
    pub async fn confirmation(&self, text: &str, language: Language) -> Option<bool> {
        let normalized = normalize(text);
        match normalized.as_str() {
            "confirm:yes" => return Some(true),
            "confirm:no" => return Some(false),
            _ => {}
        }

        if self.matches_exactly(&normalized, MessageKey::KeywordsYes, language).await {
            return Some(true);
        }
        if self.matches_exactly(&normalized, MessageKey::KeywordsNo, language).await {
            return Some(false);
        }
        None
    }

    async fn matches_exactly(&self, normalized: &str, key: MessageKey, language: Language) -> bool {
        self.locale
            .keywords(key, language)
            .await
            .iter()
            .any(|keyword| normalized == keyword)
    }
}

/// True for values sent by choice buttons rather than typed by the user.
pub fn is_button_value(text: &str) -> bool {
    let text = text.trim();
    [LANGUAGE_PREFIX, MENU_PREFIX, NAV_PREFIX, CONFIRM_PREFIX, DATE_PREFIX, TIME_PREFIX]
        .iter()
        .any(|prefix| text.starts_with(prefix))
}

fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?', '。', '！', '？'])
        .trim()
        .to_lowercase()
}

/// Values sent by choice buttons.
fn structured(normalized: &str) -> Option<Intent> {
    if let Some(code) = normalized.strip_prefix(LANGUAGE_PREFIX) {
        return Some(Language::from_code(code).map(Intent::SelectLanguage).unwrap_or(Intent::Unknown));
    }
    if let Some(entry) = normalized.strip_prefix(MENU_PREFIX) {
        return match entry {
            "book" => Some(Intent::Book),
            "info" => Some(Intent::ClinicInfo),
            "talk" => Some(Intent::TalkToClinic),
            "language" => Some(Intent::ChangeLanguage),
            "help" => Some(Intent::Help),
            "myid" => Some(Intent::MyId),
            "main" => Some(Intent::Menu),
            _ => Some(Intent::Unknown),
        };
    }
    match normalized {
        "nav:menu" => Some(Intent::Menu),
        "nav:cancel" => Some(Intent::CancelAppointment),
        "confirm:yes" => Some(Intent::Affirm),
        "confirm:no" => Some(Intent::Deny),
        _ => None,
    }
}

/// ASCII keywords must sit on word boundaries; others match as substrings
/// since languages such as Japanese do not separate words with spaces.
fn contains_keyword(text: &str, keyword: &str) -> bool {
    if keyword.is_empty() {
        return false;
    }
    if !keyword.is_ascii() {
        return text.contains(keyword);
    }

    text.match_indices(keyword).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + keyword.len()..].chars().next();
        !before.map(char::is_alphanumeric).unwrap_or(false) && !after.map(char::is_alphanumeric).unwrap_or(false)
    })
}
