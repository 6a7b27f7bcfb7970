//! # idbroker-auth
//!
//! Identity federation and consent engine for the idbroker login service.
//!
//! This crate provides:
//! - Binding of provider callbacks to the browser session that started them
//! - Immutable session snapshots with pure merge operations
//! - Resolution of the attributes a service client receives
//! - Consent decisions backed by a pluggable consent store
//! - Linking of users to library registry accounts, with auto-provisioning
//!   and municipality derivation
//!
//! ## Modules
//!
//! - [`binding`] - Binding tokens for provider callbacks
//! - [`session`] - Session snapshot types and state transitions
//! - [`attributes`] - Attribute catalog and values
//! - [`consent`] - Consent engine and view models
//! - [`registry`] - Registry account linking and municipality derivation
//! - [`federation`] - Identity providers and callback handling
//! - [`flow`] - The login flow wiring all of the above
//! - [`storage`] - Consent storage trait and in-memory store
//! - [`health`] - Sanity check of external collaborators
//! - [`config`] - Broker configuration
//! - [`observability`] - Tracing setup

pub mod attributes;
pub mod binding;
pub mod config;
pub mod consent;
pub mod error;
pub mod federation;
pub mod flow;
pub mod health;
pub mod observability;
pub mod registry;
pub mod session;
pub mod storage;

pub use attributes::{AttributeCatalog, AttributeDefinition, AttributeValue};
pub use binding::{BindingToken, TokenBinder};
pub use config::{BrokerConfig, ConfigError};
pub use consent::{
    ConsentDecision, ConsentEngine, ConsentOutcome, ConsentPrompt, ConsentRejection, ConsentState,
};
pub use error::BrokerError;
pub use federation::{CallbackOutcome, FederationOrchestrator, IdentityProviderKind, LoginLink};
pub use flow::{FlowStep, LoginFlow, SubmitOutcome};
pub use health::{HealthReport, sanity_check};
pub use registry::{
    AccountLookup, Municipality, MunicipalityValidator, RegistryClient, RegistryLinker,
    UserAttributes,
};
pub use session::{ServiceClient, Session, SessionUpdate, Ticket, User, UserUpdate};
pub use storage::{ConsentRecord, ConsentStore, InMemoryConsentStore};

/// Type alias for broker results.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use idbroker_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::BrokerResult;
    pub use crate::config::{BrokerConfig, ConfigError};
    pub use crate::error::BrokerError;
    pub use crate::flow::{FlowStep, LoginFlow, SubmitOutcome};
    pub use crate::registry::{MunicipalityValidator, RegistryClient};
    pub use crate::session::{ServiceClient, Session, Ticket, User};
    pub use crate::storage::{ConsentStore, InMemoryConsentStore};
}
