//! Consent decisions and persistence.
//!
//! The engine moves a login through
//! `NoConsentNeeded | ConsentRequired -> ConsentPromptShown -> Granted | Rejected`.
//! The consent store is the only source of truth for earlier grants; the
//! session's consent map is a cache and is never read back.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error};

use super::view::{ConsentDecision, ConsentPrompt, ConsentRejection, REJECTION_MESSAGE_QUERY};
use crate::attributes::required_attributes;
use crate::config::RoutesConfig;
use crate::federation::IdentityProviderKind;
use crate::session::{ServiceClient, Session, Ticket, User};
use crate::storage::{ConsentRecord, ConsentStore, consent_key};
use crate::{BrokerError, BrokerResult};

/// Where a login stands with respect to consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    /// Every requested attribute is already covered by a stored grant.
    NoConsentNeeded,
    /// At least one requested attribute has not been granted.
    ConsentRequired,
    /// The prompt has been rendered and an answer is awaited.
    ConsentPromptShown,
    Granted,
    Rejected,
}

/// Result of a consent submission.
#[derive(Debug, Clone)]
pub enum ConsentOutcome {
    /// Consent was stored; continue the login with this session.
    Granted(Session),
    /// Consent was rejected; the provider that led here was dropped from
    /// the session's history.
    Rejected {
        session: Session,
        view: ConsentRejection,
    },
}

impl ConsentOutcome {
    #[must_use]
    pub fn state(&self) -> ConsentState {
        match self {
            Self::Granted(_) => ConsentState::Granted,
            Self::Rejected { .. } => ConsentState::Rejected,
        }
    }

    /// Returns the session to store back.
    #[must_use]
    pub fn session(&self) -> &Session {
        match self {
            Self::Granted(session) | Self::Rejected { session, .. } => session,
        }
    }
}

/// Decides, records and rolls back attribute-release consent.
#[derive(Clone)]
pub struct ConsentEngine {
    store: Arc<dyn ConsentStore>,
    version_prefix: String,
}

impl ConsentEngine {
    /// Creates an engine over an injected consent store.
    #[must_use]
    pub fn new(store: Arc<dyn ConsentStore>, routes: &RoutesConfig) -> Self {
        Self {
            store,
            version_prefix: routes.version_prefix.clone(),
        }
    }

    /// Reads the granted keys for a user and client.
    ///
    /// A missing record and a failing store both yield the empty set.
    async fn stored_keys(&self, user_id: &str, service_client_id: &str) -> BTreeSet<String> {
        match self.store.read(&consent_key(user_id, service_client_id)).await {
            Ok(record) => record.map(|r| r.keys).unwrap_or_default(),
            Err(e) => {
                error!(
                    user_id,
                    service_client_id,
                    error = %e,
                    "Error while retrieving user consent"
                );
                BTreeSet::new()
            }
        }
    }

    /// Returns `true` if the ticket requests an attribute the user has not
    /// granted to this client.
    pub async fn needs_consent(
        &self,
        user: &User,
        service_client: &ServiceClient,
        ticket: &Ticket,
    ) -> bool {
        let required = required_attributes(service_client, ticket);
        if required.is_empty() {
            return false;
        }

        let granted = match (user.id(), service_client.client_id()) {
            (Some(user_id), Some(client_id)) => self.stored_keys(user_id, client_id).await,
            _ => BTreeSet::new(),
        };

        required.keys().any(|key| !granted.contains(key))
    }

    /// Evaluates the consent state of the session's current login.
    pub async fn evaluate(&self, session: &Session) -> ConsentState {
        let Some(service_client) = session.service_client.as_ref() else {
            return ConsentState::NoConsentNeeded;
        };

        if self
            .needs_consent(&session.user, service_client, &session.ticket)
            .await
        {
            ConsentState::ConsentRequired
        } else {
            ConsentState::NoConsentNeeded
        }
    }

    /// Builds the consent prompt for the session's service client.
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentity` if the session has no service client id.
    pub fn prompt(&self, session: &Session) -> BrokerResult<ConsentPrompt> {
        let service_client = session
            .service_client
            .as_ref()
            .filter(|client| client.client_id().is_some())
            .ok_or_else(|| BrokerError::missing_identity("serviceClient.id"))?;

        let return_url = session
            .return_url
            .as_deref()
            .map(|path| format!("{}{}", service_client.urls.host, path))
            .unwrap_or_default();

        Ok(ConsentPrompt {
            service_name: service_client.name.clone(),
            attributes: session.required_attributes(),
            consent_action: format!(
                "{}/login/consentsubmit/{}",
                self.version_prefix,
                session.client_token.as_deref().unwrap_or_default()
            ),
            return_url,
        })
    }

    /// Stores consent for exactly the attributes currently requested.
    ///
    /// Any previous record for the user and client is replaced, so keys that
    /// are no longer requested are dropped. The grant is mirrored into the
    /// returned session's consent cache. Store failures are logged and do not
    /// affect the returned session.
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentity` if the user id or the service client id is
    /// absent. Nothing is stored in that case.
    pub async fn record_grant(&self, session: &Session) -> BrokerResult<Session> {
        let Some(user_id) = session.user.id() else {
            error!("Can not store consent without a userId");
            return Err(BrokerError::missing_identity("userId"));
        };
        let Some(service_client) = session
            .service_client
            .as_ref()
            .filter(|client| client.client_id().is_some())
        else {
            error!(user_id, "Can not store consent without a serviceClient ID");
            return Err(BrokerError::missing_identity("serviceClient.id"));
        };

        let keys: BTreeSet<String> = required_attributes(service_client, &session.ticket)
            .into_keys()
            .collect();
        let next = session.with_consent(&service_client.id, keys.clone());

        let key = consent_key(user_id, &service_client.id);
        if let Err(e) = self.store.delete(&key).await {
            error!(
                user_id,
                service_client_id = %service_client.id,
                error = %e,
                "Failed deleting previous user consent"
            );
        }
        if let Err(e) = self.store.insert(&key, ConsentRecord { keys }).await {
            error!(
                user_id,
                service_client_id = %service_client.id,
                error = %e,
                "Failed saving of user consent"
            );
        } else {
            debug!(user_id, service_client_id = %service_client.id, "Stored user consent");
        }

        Ok(next)
    }

    /// Rolls back the provider that led to a rejected consent.
    ///
    /// The consent cache is left untouched so the user can retry through a
    /// different provider.
    #[must_use]
    pub fn record_rejection(&self, session: &Session, rejected: IdentityProviderKind) -> Session {
        session.without_identity_provider(rejected)
    }

    /// Builds the page shown after a rejection.
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentity` if the session has no service client.
    pub fn rejection_view(&self, session: &Session) -> BrokerResult<ConsentRejection> {
        let service_client = session
            .service_client
            .as_ref()
            .ok_or_else(|| BrokerError::missing_identity("serviceClient"))?;

        Ok(ConsentRejection {
            service_name: service_client.name.clone(),
            return_url: format!(
                "{}{}{}",
                service_client.urls.host, service_client.urls.error, REJECTION_MESSAGE_QUERY
            ),
        })
    }

    /// Applies the user's answer from the consent form.
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentity` if the session lacks the user or service
    /// client needed by the chosen path.
    pub async fn submit(
        &self,
        session: &Session,
        decision: ConsentDecision,
    ) -> BrokerResult<ConsentOutcome> {
        match decision {
            ConsentDecision::Grant => Ok(ConsentOutcome::Granted(self.record_grant(session).await?)),
            ConsentDecision::Reject => {
                let view = self.rejection_view(session)?;
                let session = match session.user.user_type {
                    Some(provider) => self.record_rejection(session, provider),
                    None => session.clone(),
                };
                Ok(ConsentOutcome::Rejected { session, view })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::attributes::{AttributeDefinition, AttributeValue};
    use crate::session::{ServiceUrls, UserUpdate};
    use crate::storage::InMemoryConsentStore;

    /// Store whose every operation fails, counting the attempts.
    #[derive(Default)]
    struct FailingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConsentStore for FailingStore {
        async fn read(&self, _key: &str) -> BrokerResult<Option<ConsentRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BrokerError::consent_store_unavailable("down"))
        }

        async fn insert(&self, _key: &str, _record: ConsentRecord) -> BrokerResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BrokerError::consent_store_unavailable("down"))
        }

        async fn delete(&self, _key: &str) -> BrokerResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BrokerError::consent_store_unavailable("down"))
        }
    }

    fn service_client() -> ServiceClient {
        let mut client = ServiceClient::new("client-1", "Bibliotek.dk");
        client.urls = ServiceUrls {
            host: "https://client.example".to_string(),
            success: "/ok".to_string(),
            error: "/fail".to_string(),
        };
        for key in ["cpr", "libraries", "birthYear"] {
            client
                .attributes
                .insert(key.to_string(), AttributeDefinition::new(key));
        }
        client
    }

    fn ticket(attributes: serde_json::Value) -> Ticket {
        serde_json::from_value(json!({ "attributes": attributes })).unwrap()
    }

    fn session(ticket: Ticket) -> Session {
        Session {
            service_client: Some(service_client()),
            ticket,
            client_token: Some("tok".to_string()),
            return_url: Some("/back".to_string()),
            ..Session::default()
        }
        .with_user(UserUpdate::new(IdentityProviderKind::NemLogin, "0101011234"))
    }

    fn engine(store: Arc<dyn ConsentStore>) -> ConsentEngine {
        ConsentEngine::new(store, &RoutesConfig::default())
    }

    #[tokio::test]
    async fn test_needs_consent_without_stored_record() {
        let engine = engine(Arc::new(InMemoryConsentStore::new()));
        let session = session(ticket(json!({"cpr": "0101011234"})));

        assert!(
            engine
                .needs_consent(&session.user, &service_client(), &session.ticket)
                .await
        );
        assert_eq!(engine.evaluate(&session).await, ConsentState::ConsentRequired);
    }

    #[tokio::test]
    async fn test_nothing_requested_needs_no_consent() {
        let engine = engine(Arc::new(InMemoryConsentStore::new()));
        let session = session(ticket(json!({"cpr": null, "libraries": []})));

        assert_eq!(engine.evaluate(&session).await, ConsentState::NoConsentNeeded);
        assert_eq!(
            engine.evaluate(&Session::default()).await,
            ConsentState::NoConsentNeeded
        );
    }

    #[tokio::test]
    async fn test_grant_then_no_consent_needed_until_new_key() {
        let store = Arc::new(InMemoryConsentStore::new());
        let engine = engine(store.clone());
        let first = session(ticket(json!({"cpr": "0101011234"})));

        let granted = engine.record_grant(&first).await.unwrap();
        assert_eq!(
            granted.consents.get("client-1"),
            Some(&BTreeSet::from(["cpr".to_string()]))
        );
        assert_eq!(engine.evaluate(&first).await, ConsentState::NoConsentNeeded);

        let wider = session(ticket(json!({"cpr": "0101011234", "birthYear": 1980})));
        assert_eq!(engine.evaluate(&wider).await, ConsentState::ConsentRequired);
    }

    #[tokio::test]
    async fn test_grant_replaces_previous_record() {
        let store = Arc::new(InMemoryConsentStore::new());
        store
            .insert("0101011234:client-1", ConsentRecord::new(["cpr", "libraries"]))
            .await
            .unwrap();
        let engine = engine(store.clone());

        let session = session(ticket(json!({"birthYear": 1980})));
        engine.record_grant(&session).await.unwrap();

        let stored = store.read("0101011234:client-1").await.unwrap().unwrap();
        assert_eq!(stored, ConsentRecord::new(["birthYear"]));
    }

    #[tokio::test]
    async fn test_grant_requires_identity() {
        let store = Arc::new(InMemoryConsentStore::new());
        let engine = engine(store.clone());

        let mut no_user = session(ticket(json!({"cpr": "x"})));
        no_user.user = User::default();
        let err = engine.record_grant(&no_user).await.unwrap_err();
        assert!(matches!(err, BrokerError::MissingIdentity { .. }));

        let mut no_client = session(ticket(json!({"cpr": "x"})));
        no_client.service_client = Some(ServiceClient::new("", "Nameless"));
        let err = engine.record_grant(&no_client).await.unwrap_err();
        assert!(matches!(err, BrokerError::MissingIdentity { .. }));

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let store = Arc::new(FailingStore::default());
        let engine = engine(store.clone());
        let session = session(ticket(json!({"cpr": "0101011234"})));

        // Unreadable store: everything requested counts as new
        assert_eq!(engine.evaluate(&session).await, ConsentState::ConsentRequired);

        let granted = engine.record_grant(&session).await.unwrap();
        assert!(granted.consents.contains_key("client-1"));
        // read + delete + insert
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_submit_reject_rolls_back_provider() {
        let engine = engine(Arc::new(InMemoryConsentStore::new()));
        let session = session(ticket(json!({"cpr": "0101011234"})))
            .with_user(UserUpdate::new(IdentityProviderKind::Borchk, "0101011234"));

        let outcome = engine
            .submit(&session, ConsentDecision::from_form(Some("0")))
            .await
            .unwrap();

        assert_eq!(outcome.state(), ConsentState::Rejected);
        assert_eq!(
            outcome.session().user.identity_providers,
            vec![IdentityProviderKind::NemLogin]
        );
        assert_eq!(outcome.session().consents, session.consents);
        let ConsentOutcome::Rejected { view, .. } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(view.service_name, "Bibliotek.dk");
        assert_eq!(
            view.return_url,
            "https://client.example/fail?message=consent%20was%20rejected"
        );
    }

    #[tokio::test]
    async fn test_submit_grant_stores_consent() {
        let store = Arc::new(InMemoryConsentStore::new());
        let engine = engine(store.clone());
        let session = session(ticket(json!({"cpr": "0101011234"})));

        let outcome = engine
            .submit(&session, ConsentDecision::Grant)
            .await
            .unwrap();

        assert_eq!(outcome.state(), ConsentState::Granted);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_prompt_view_model() {
        let engine = engine(Arc::new(InMemoryConsentStore::new()));
        let mut session = session(ticket(json!({"cpr": "0101011234", "libraries": []})));
        session
            .ticket
            .attributes
            .insert("birthYear".to_string(), AttributeValue::Absent);

        let prompt = engine.prompt(&session).unwrap();
        assert_eq!(prompt.service_name, "Bibliotek.dk");
        assert_eq!(prompt.consent_action, "/v0/login/consentsubmit/tok");
        assert_eq!(prompt.return_url, "https://client.example/back");
        assert_eq!(prompt.attributes.keys().collect::<Vec<_>>(), vec!["cpr"]);

        session.return_url = None;
        assert_eq!(engine.prompt(&session).unwrap().return_url, "");

        session.service_client = None;
        assert!(matches!(
            engine.prompt(&session),
            Err(BrokerError::MissingIdentity { .. })
        ));
    }
}
