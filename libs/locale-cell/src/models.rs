use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ==============================================================================
// LANGUAGES
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ja,
    En,
    Pt,
    Zh,
    Ko,
    Es,
    Tl,
    Vi,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Ja,
        Language::En,
        Language::Pt,
        Language::Zh,
        Language::Ko,
        Language::Es,
        Language::Tl,
        Language::Vi,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::Ja => "ja",
            Language::En => "en",
            Language::Pt => "pt",
            Language::Zh => "zh",
            Language::Ko => "ko",
            Language::Es => "es",
            Language::Tl => "tl",
            Language::Vi => "vi",
        }
    }

    /// Accepts ISO 639-1 codes and region-tagged variants such as `pt-BR`.
    pub fn from_code(code: &str) -> Option<Language> {
        let primary = code.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        Language::ALL.iter().copied().find(|lang| lang.code() == primary)
    }

    pub fn native_name(&self) -> &'static str {
        match self {
            Language::Ja => "日本語",
            Language::En => "English",
            Language::Pt => "Português",
            Language::Zh => "中文",
            Language::Ko => "한국어",
            Language::Es => "Español",
            Language::Tl => "Tagalog",
            Language::Vi => "Tiếng Việt",
        }
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Language::Ja => "Japanese",
            Language::En => "English",
            Language::Pt => "Portuguese",
            Language::Zh => "Chinese",
            Language::Ko => "Korean",
            Language::Es => "Spanish",
            Language::Tl => "Tagalog",
            Language::Vi => "Vietnamese",
        }
    }

    pub fn flag(&self) -> &'static str {
        match self {
            Language::Ja => "🇯🇵",
            Language::En => "🇺🇸",
            Language::Pt => "🇧🇷",
            Language::Zh => "🇨🇳",
            Language::Ko => "🇰🇷",
            Language::Es => "🇪🇸",
            Language::Tl => "🇵🇭",
            Language::Vi => "🇻🇳",
        }
    }

    /// Label used on language-selection choices, e.g. `🇯🇵 日本語`.
    pub fn label(&self) -> String {
        format!("{} {}", self.flag(), self.native_name())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Language {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::from_code(s).ok_or_else(|| LocaleError::UnsupportedLanguage(s.to_string()))
    }
}

// ==============================================================================
// MESSAGE KEYS
// ==============================================================================

/// Every user-facing string and keyword list the assistant can emit or match.
///
/// Keyword keys resolve to `|`-separated alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Welcome,
    ChooseLanguage,
    LanguageSet,
    SuggestLanguage,
    KeepLanguage,
    MainMenu,
    MenuBook,
    MenuClinicInfo,
    MenuTalk,
    MenuLanguage,
    ClinicInfo,
    Help,
    YourId,
    CancelExisting,
    UnknownCommand,
    AskName,
    AskNameRetry,
    AskPhone,
    AskPhoneRetry,
    AskDate,
    AskDateRetry,
    NoDatesAvailable,
    AskTime,
    AskTimeRetry,
    NoTimesOnDate,
    AskReason,
    AskReasonRetry,
    ConfirmSummary,
    ConfirmRetry,
    ChoiceYes,
    ChoiceNo,
    Booked,
    BookingCancelled,
    SlotTaken,
    CommitFailed,
    BackToMenu,
    TalkStarted,
    TalkForwarded,
    GenericError,
    BackToLanguage,
    NotifyNewAppointment,
    NotifyClinicMessage,
    KeywordsBook,
    KeywordsCancel,
    KeywordsHelp,
    KeywordsLanguage,
    KeywordsMyId,
    KeywordsTalk,
    KeywordsInfo,
    KeywordsGreeting,
    KeywordsMenu,
    KeywordsYes,
    KeywordsNo,
}

impl MessageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKey::Welcome => "welcome",
            MessageKey::ChooseLanguage => "choose_language",
            MessageKey::LanguageSet => "language_set",
            MessageKey::SuggestLanguage => "suggest_language",
            MessageKey::KeepLanguage => "keep_language",
            MessageKey::MainMenu => "main_menu",
            MessageKey::MenuBook => "menu_book",
            MessageKey::MenuClinicInfo => "menu_clinic_info",
            MessageKey::MenuTalk => "menu_talk",
            MessageKey::MenuLanguage => "menu_language",
            MessageKey::ClinicInfo => "clinic_info",
            MessageKey::Help => "help",
            MessageKey::YourId => "your_id",
            MessageKey::CancelExisting => "cancel_existing",
            MessageKey::UnknownCommand => "unknown_command",
            MessageKey::AskName => "ask_name",
            MessageKey::AskNameRetry => "ask_name_retry",
            MessageKey::AskPhone => "ask_phone",
            MessageKey::AskPhoneRetry => "ask_phone_retry",
            MessageKey::AskDate => "ask_date",
            MessageKey::AskDateRetry => "ask_date_retry",
            MessageKey::NoDatesAvailable => "no_dates_available",
            MessageKey::AskTime => "ask_time",
            MessageKey::AskTimeRetry => "ask_time_retry",
            MessageKey::NoTimesOnDate => "no_times_on_date",
            MessageKey::AskReason => "ask_reason",
            MessageKey::AskReasonRetry => "ask_reason_retry",
            MessageKey::ConfirmSummary => "confirm_summary",
            MessageKey::ConfirmRetry => "confirm_retry",
            MessageKey::ChoiceYes => "choice_yes",
            MessageKey::ChoiceNo => "choice_no",
            MessageKey::Booked => "booked",
            MessageKey::BookingCancelled => "booking_cancelled",
            MessageKey::SlotTaken => "slot_taken",
            MessageKey::CommitFailed => "commit_failed",
            MessageKey::BackToMenu => "back_to_menu",
            MessageKey::TalkStarted => "talk_started",
            MessageKey::TalkForwarded => "talk_forwarded",
            MessageKey::GenericError => "generic_error",
            MessageKey::BackToLanguage => "back_to_language",
            MessageKey::NotifyNewAppointment => "notify_new_appointment",
            MessageKey::NotifyClinicMessage => "notify_clinic_message",
            MessageKey::KeywordsBook => "keywords_book",
            MessageKey::KeywordsCancel => "keywords_cancel",
            MessageKey::KeywordsHelp => "keywords_help",
            MessageKey::KeywordsLanguage => "keywords_language",
            MessageKey::KeywordsMyId => "keywords_myid",
            MessageKey::KeywordsTalk => "keywords_talk",
            MessageKey::KeywordsInfo => "keywords_info",
            MessageKey::KeywordsGreeting => "keywords_greeting",
            MessageKey::KeywordsMenu => "keywords_menu",
            MessageKey::KeywordsYes => "keywords_yes",
            MessageKey::KeywordsNo => "keywords_no",
        }
    }

    pub fn is_keyword_list(&self) -> bool {
        self.as_str().starts_with("keywords_")
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==============================================================================
// INTENTS AND RESOLUTION
// ==============================================================================

/// What a message asks for, independent of the language it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Book,
    CancelAppointment,
    Help,
    ChangeLanguage,
    MyId,
    TalkToClinic,
    ClinicInfo,
    Greeting,
    Menu,
    SelectLanguage(Language),
    Affirm,
    Deny,
    Unknown,
}

/// Explicit requests to leave whatever step the user is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    Cancel,
    Menu,
    /// Back to language selection, offered after unexpected failures.
    Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageOrigin {
    Selected,
    Preference,
    Detected,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageResolution {
    pub language: Language,
    pub origin: LanguageOrigin,
    /// A detected language worth offering, never applied automatically.
    pub proposal: Option<Language>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum LocaleError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Language service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Language service returned an unusable response: {0}")]
    InvalidResponse(String),
}
