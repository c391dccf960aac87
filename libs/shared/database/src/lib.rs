pub mod memory;
pub mod store;
pub mod supabase;

pub use memory::InMemoryStore;
pub use store::{AppointmentStore, PatientStore, StoreError, SupabaseStore};
pub use supabase::{DatabaseError, SupabaseClient};
