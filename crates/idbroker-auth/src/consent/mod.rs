//! Attribute-release consent.
//!
//! - [`engine`] - consent decisions, persistence and rollback
//! - [`view`] - consent screen view models and form parsing

pub mod engine;
pub mod view;

pub use engine::{ConsentEngine, ConsentOutcome, ConsentState};
pub use view::{ConsentDecision, ConsentPrompt, ConsentRejection, REJECTION_MESSAGE_QUERY};
