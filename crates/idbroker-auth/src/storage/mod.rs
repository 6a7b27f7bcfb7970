//! Storage traits for broker data.
//!
//! - [`ConsentStore`] - persisted consent records
//!
//! The in-memory implementation is meant for development and tests; the
//! production store is supplied by the embedding application.

pub mod consent;
pub mod memory;

pub use consent::{ConsentRecord, ConsentStore, consent_key};
pub use memory::InMemoryConsentStore;
