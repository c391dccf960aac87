pub mod catalog;
pub mod intent;
pub mod resolver;
pub mod translator;

pub use catalog::{LanguageCatalog, StaticCatalog};
pub use intent::{is_button_value, IntentClassifier};
pub use resolver::LocaleResolver;
pub use translator::OpenAiTranslator;
