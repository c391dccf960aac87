pub mod locks;
pub mod machine;
pub mod notifier;
pub mod store;
pub mod validation;

pub use locks::UserLocks;
pub use machine::BookingStateMachine;
pub use notifier::{notifier_from_config, LinePushNotifier, LoggingNotifier, Notifier};
pub use store::{ConversationStore, InMemoryConversationStore, SupabaseConversationStore};
