//! Session data model.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeCatalog, AttributeValue};
use crate::federation::IdentityProviderKind;

// =============================================================================
// User
// =============================================================================

/// The authenticated user as known to the session.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    /// Identifier the user authenticated with (national id or library card).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Provider of the most recent authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_type: Option<IdentityProviderKind>,

    /// National id, when the provider supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpr: Option<String>,

    /// Library agency the user authenticated against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,

    /// Library pincode. Present only after a library-card login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,

    /// Institutional login id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unilogin_id: Option<String>,

    /// Providers used in this session, oldest first, without duplicates.
    pub identity_providers: Vec<IdentityProviderKind>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("user_id", &self.user_id)
            .field("user_type", &self.user_type)
            .field("cpr", &self.cpr.as_ref().map(|_| "[redacted]"))
            .field("agency", &self.agency)
            .field("pincode", &self.pincode.as_ref().map(|_| "[redacted]"))
            .field("unilogin_id", &self.unilogin_id)
            .field("identity_providers", &self.identity_providers)
            .finish()
    }
}

impl User {
    /// Returns the user id if it is present and non-empty.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Returns the agency if it is present and non-empty.
    #[must_use]
    pub fn agency_id(&self) -> Option<&str> {
        self.agency.as_deref().filter(|agency| !agency.is_empty())
    }

    /// Returns the most recently used identity provider.
    #[must_use]
    pub fn last_identity_provider(&self) -> Option<IdentityProviderKind> {
        self.identity_providers.last().copied()
    }

    /// Returns `true` if the user carries agency, user id and pincode,
    /// i.e. authenticated with a library card.
    #[must_use]
    pub fn has_library_credentials(&self) -> bool {
        self.agency_id().is_some()
            && self.id().is_some()
            && self.pincode.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Partial user written by a provider callback.
///
/// Fields left `None` keep their current value on merge.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub user_id: Option<String>,
    pub user_type: Option<IdentityProviderKind>,
    pub cpr: Option<String>,
    pub agency: Option<String>,
    pub pincode: Option<String>,
    pub unilogin_id: Option<String>,
}

impl std::fmt::Debug for UserUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserUpdate")
            .field("user_id", &self.user_id)
            .field("user_type", &self.user_type)
            .field("agency", &self.agency)
            .field("unilogin_id", &self.unilogin_id)
            .finish_non_exhaustive()
    }
}

impl UserUpdate {
    /// Starts an update for a login through `provider`.
    #[must_use]
    pub fn new(provider: IdentityProviderKind, user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            user_type: Some(provider),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_cpr(mut self, cpr: impl Into<String>) -> Self {
        self.cpr = Some(cpr.into());
        self
    }

    #[must_use]
    pub fn with_agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = Some(agency.into());
        self
    }

    #[must_use]
    pub fn with_pincode(mut self, pincode: impl Into<String>) -> Self {
        self.pincode = Some(pincode.into());
        self
    }

    #[must_use]
    pub fn with_unilogin_id(mut self, unilogin_id: impl Into<String>) -> Self {
        self.unilogin_id = Some(unilogin_id.into());
        self
    }
}

// =============================================================================
// Service client
// =============================================================================

/// Redirect targets of a service client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceUrls {
    /// Base URL of the client application.
    pub host: String,
    /// Path the user returns to after a completed login.
    pub success: String,
    /// Path the user returns to after a failed or rejected login.
    pub error: String,
}

/// An application registered to log users in through the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceClient {
    /// Client id, unique within the service catalog.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Attributes the client may request, in display order.
    pub attributes: AttributeCatalog,

    /// Redirect targets.
    pub urls: ServiceUrls,

    /// Providers offered on the client's login page.
    pub identity_providers: Vec<IdentityProviderKind>,
}

impl ServiceClient {
    /// Creates a client with no attributes and no providers.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the client id if it is non-empty.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        Some(self.id.as_str()).filter(|id| !id.is_empty())
    }
}

// =============================================================================
// Ticket
// =============================================================================

/// Attributes collected for the user earlier in the flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    /// Ticket id, once issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Ticket token, once issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Attribute values keyed by attribute key.
    pub attributes: IndexMap<String, AttributeValue>,
}

// =============================================================================
// Session
// =============================================================================

/// Per-browser-session state of the login flow.
///
/// Sessions are immutable snapshots: every operation returns a new value and
/// the caller stores the result back into the session store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub user: User,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_client: Option<ServiceClient>,

    pub ticket: Ticket,

    /// Session-local cache of granted attribute keys per service client id.
    pub consents: BTreeMap<String, BTreeSet<String>>,

    /// Token identifying the service client's login request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_agency: Option<String>,
}

/// Top-level replacement of session fields. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub user: Option<User>,
    pub service_client: Option<Option<ServiceClient>>,
    pub ticket: Option<Ticket>,
    pub consents: Option<BTreeMap<String, BTreeSet<String>>>,
    pub client_token: Option<Option<String>>,
    pub return_url: Option<Option<String>>,
    pub service_agency: Option<Option<String>>,
}
