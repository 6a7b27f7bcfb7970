//! Pure merge operations over session snapshots.
//!
//! None of these methods mutate `self`; each returns the next snapshot.
//! A session is assumed to be checked out by one request at a time, so the
//! read-modify-write against the caller's snapshot is the whole contract.

use std::collections::{BTreeSet, HashMap};

use super::types::{Session, SessionUpdate, Ticket, User, UserUpdate};
use crate::attributes::{AttributeCatalog, required_attributes};
use crate::federation::IdentityProviderKind;

/// Reads a query parameter, treating absence, the empty string and the
/// literal `"null"` as unset.
fn query_value(query: &HashMap<String, String>, name: &str) -> Option<String> {
    query
        .get(name)
        .filter(|value| !value.is_empty() && value.as_str() != "null")
        .cloned()
}

impl Session {
    /// Starts the state of a new login request.
    ///
    /// Reads `returnurl`, `agency` and `token` from the query, clears the
    /// service client and consent cache, installs `ticket`, and keeps the
    /// user already known to the browser session.
    #[must_use]
    pub fn initialise(&self, query: &HashMap<String, String>, ticket: Ticket) -> Session {
        Session {
            user: self.user.clone(),
            service_client: None,
            ticket,
            consents: Default::default(),
            client_token: query_value(query, "token"),
            return_url: query_value(query, "returnurl"),
            service_agency: query_value(query, "agency"),
        }
    }

    /// Shallow-merges `update` into the session, last write wins per field.
    #[must_use]
    pub fn replace(&self, update: SessionUpdate) -> Session {
        let current = self.clone();
        Session {
            user: update.user.unwrap_or(current.user),
            service_client: update.service_client.unwrap_or(current.service_client),
            ticket: update.ticket.unwrap_or(current.ticket),
            consents: update.consents.unwrap_or(current.consents),
            client_token: update.client_token.unwrap_or(current.client_token),
            return_url: update.return_url.unwrap_or(current.return_url),
            service_agency: update.service_agency.unwrap_or(current.service_agency),
        }
    }

    /// Returns the user of the session.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Returns `true` iff a non-empty user id is present.
    #[must_use]
    pub fn has_user(&self) -> bool {
        self.user.id().is_some()
    }

    /// Merges a partial user into the session.
    ///
    /// The provider of the update is appended to the identity-provider
    /// history unless it is already there; the history is never reordered.
    #[must_use]
    pub fn with_user(&self, update: UserUpdate) -> Session {
        let current = &self.user;

        let mut identity_providers = current.identity_providers.clone();
        if let Some(provider) = update.user_type
            && !identity_providers.contains(&provider)
        {
            identity_providers.push(provider);
        }

        let user = User {
            user_id: update.user_id.or_else(|| current.user_id.clone()),
            user_type: update.user_type.or(current.user_type),
            cpr: update.cpr.or_else(|| current.cpr.clone()),
            agency: update.agency.or_else(|| current.agency.clone()),
            pincode: update.pincode.or_else(|| current.pincode.clone()),
            unilogin_id: update.unilogin_id.or_else(|| current.unilogin_id.clone()),
            identity_providers,
        };

        self.replace(SessionUpdate {
            user: Some(user),
            ..SessionUpdate::default()
        })
    }

    /// Removes one occurrence of `provider` from the identity-provider history.
    ///
    /// All other fields, including the consent cache, are left untouched.
    #[must_use]
    pub fn without_identity_provider(&self, provider: IdentityProviderKind) -> Session {
        let mut user = self.user.clone();
        if let Some(index) = user.identity_providers.iter().position(|p| *p == provider) {
            user.identity_providers.remove(index);
        }

        self.replace(SessionUpdate {
            user: Some(user),
            ..SessionUpdate::default()
        })
    }

    /// Records granted attribute keys for a service client in the local cache.
    #[must_use]
    pub fn with_consent(&self, service_client_id: &str, keys: BTreeSet<String>) -> Session {
        let mut consents = self.consents.clone();
        consents.insert(service_client_id.to_string(), keys);

        self.replace(SessionUpdate {
            consents: Some(consents),
            ..SessionUpdate::default()
        })
    }

    /// Attributes the session's service client receives for the current ticket.
    ///
    /// Empty when no service client is set.
    #[must_use]
    pub fn required_attributes(&self) -> AttributeCatalog {
        self.service_client
            .as_ref()
            .map(|client| required_attributes(client, &self.ticket))
            .unwrap_or_default()
    }
}
