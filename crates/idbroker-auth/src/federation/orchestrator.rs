//! Provider callback handling.
//!
//! A callback is accepted only if its binding token matches the session
//! secret. On a mismatch nothing is parsed and the session is not touched.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::callback::parse_callback;
use super::provider::IdentityProviderKind;
use crate::binding::TokenBinder;
use crate::config::RoutesConfig;
use crate::session::Session;
use crate::{BrokerError, BrokerResult};

/// Result of an accepted provider callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// The provider's identity was merged into the session.
    Authenticated(Session),
    /// The callback carried nothing to merge (unknown provider or no user id).
    Unchanged(Session),
}

impl CallbackOutcome {
    /// Returns the session to store back.
    #[must_use]
    pub fn into_session(self) -> Session {
        match self {
            Self::Authenticated(session) | Self::Unchanged(session) => session,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// A link on the login page that starts authentication with a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginLink {
    pub provider: IdentityProviderKind,
    /// Callback path the provider returns to, carrying the binding token.
    pub callback_path: String,
}

/// Verifies provider callbacks and merges their identity into the session.
#[derive(Debug, Clone)]
pub struct FederationOrchestrator {
    binder: TokenBinder,
    version_prefix: String,
}

impl FederationOrchestrator {
    #[must_use]
    pub fn new(binder: TokenBinder, routes: &RoutesConfig) -> Self {
        Self {
            binder,
            version_prefix: routes.version_prefix.clone(),
        }
    }

    /// Builds the login links for the providers the session's service client
    /// offers, each bound to `session_secret`.
    #[must_use]
    pub fn login_links(&self, session: &Session, session_secret: &str) -> Vec<LoginLink> {
        let Some(service_client) = session.service_client.as_ref() else {
            return Vec::new();
        };

        let token = self.binder.bind(session_secret);
        service_client
            .identity_providers
            .iter()
            .map(|provider| LoginLink {
                provider: *provider,
                callback_path: format!(
                    "{}/login/identityProviderCallback/{}/{}",
                    self.version_prefix, provider, token
                ),
            })
            .collect()
    }

    /// Handles a provider callback.
    ///
    /// # Errors
    ///
    /// Returns `BindingMismatch` if `binding_token` was not produced for
    /// `session_secret`. The caller must answer with 403 and discard the
    /// callback.
    pub fn callback(
        &self,
        session: &Session,
        provider_type: &str,
        binding_token: &str,
        session_secret: &str,
        query: &HashMap<String, String>,
    ) -> BrokerResult<CallbackOutcome> {
        if !self.binder.verify(binding_token, session_secret) {
            warn!(provider = provider_type, "Provider callback with mismatching binding token");
            return Err(BrokerError::BindingMismatch);
        }

        let Ok(provider) = provider_type.parse::<IdentityProviderKind>() else {
            debug!(provider = provider_type, "Callback for unknown provider ignored");
            return Ok(CallbackOutcome::Unchanged(session.clone()));
        };

        match parse_callback(provider, query) {
            Some(update) => Ok(CallbackOutcome::Authenticated(session.with_user(update))),
            None => {
                warn!(%provider, "Provider callback without user id");
                Ok(CallbackOutcome::Unchanged(session.clone()))
            }
        }
    }
}
