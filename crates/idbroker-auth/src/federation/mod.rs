//! External identity provider federation.
//!
//! This module provides:
//!
//! - The closed set of supported identity providers
//! - Pure parsers for provider callback parameters
//! - Binding-checked callback handling and login links

pub mod callback;
pub mod orchestrator;
pub mod provider;

pub use callback::parse_callback;
pub use orchestrator::{CallbackOutcome, FederationOrchestrator, LoginLink};
pub use provider::{IdentityProviderKind, UnknownProvider};
