//! End-to-end login flow.
//!
//! Wires the components in request order:
//!
//! 1. Provider callback is checked against the session's binding and the
//!    identity is merged into the session
//! 2. Consent is evaluated for the attributes the service client receives
//! 3. Once consent holds, the registry account is resolved (and provisioned
//!    when needed) and municipality fields are derived
//!
//! Token issuance happens outside the broker once [`FlowStep::Proceed`] is
//! reached.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::binding::TokenBinder;
use crate::config::BrokerConfig;
use crate::consent::{
    ConsentDecision, ConsentEngine, ConsentOutcome, ConsentPrompt, ConsentRejection, ConsentState,
};
use crate::federation::{CallbackOutcome, FederationOrchestrator, LoginLink};
use crate::registry::{MunicipalityValidator, RegistryClient, RegistryLinker, UserAttributes};
use crate::session::Session;
use crate::storage::ConsentStore;
use crate::{BrokerError, BrokerResult};

/// What the login service must do next for a session.
#[derive(Debug, Clone)]
pub enum FlowStep {
    /// No user yet: show the provider links.
    NeedsLogin(Vec<LoginLink>),
    /// Show the consent prompt.
    ConsentRequired(ConsentPrompt),
    /// Consent holds: continue to token issuance with these attributes.
    Proceed(UserAttributes),
}

impl FlowStep {
    /// Consent state reached by this step. `None` before login.
    #[must_use]
    pub fn consent_state(&self) -> Option<ConsentState> {
        match self {
            Self::NeedsLogin(_) => None,
            Self::ConsentRequired(_) => Some(ConsentState::ConsentPromptShown),
            Self::Proceed(_) => Some(ConsentState::NoConsentNeeded),
        }
    }
}

/// Result of a consent form submission.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Granted {
        session: Session,
        attributes: UserAttributes,
    },
    Rejected {
        session: Session,
        view: ConsentRejection,
    },
}

impl SubmitOutcome {
    /// Returns the session to store back.
    #[must_use]
    pub fn session(&self) -> &Session {
        match self {
            Self::Granted { session, .. } | Self::Rejected { session, .. } => session,
        }
    }
}

/// The federation and consent engine as used by the login service.
#[derive(Clone)]
pub struct LoginFlow {
    federation: FederationOrchestrator,
    consent: ConsentEngine,
    registry: RegistryLinker,
}

impl LoginFlow {
    /// Builds the flow from configuration and injected collaborators.
    #[must_use]
    pub fn new(
        config: &BrokerConfig,
        consent_store: Arc<dyn ConsentStore>,
        registry: Arc<dyn RegistryClient>,
        validator: Arc<dyn MunicipalityValidator>,
    ) -> Self {
        Self {
            federation: FederationOrchestrator::new(
                TokenBinder::new(config.binding.salt.clone()),
                &config.routes,
            ),
            consent: ConsentEngine::new(consent_store, &config.routes),
            registry: RegistryLinker::new(registry, validator, config.registry.clone()),
        }
    }

    /// Builds the flow from a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the file cannot be read, parsed or
    /// validated.
    pub fn from_config_file(
        path: impl AsRef<Path>,
        consent_store: Arc<dyn ConsentStore>,
        registry: Arc<dyn RegistryClient>,
        validator: Arc<dyn MunicipalityValidator>,
    ) -> BrokerResult<Self> {
        let config = BrokerConfig::from_file(path)?;
        Ok(Self::new(&config, consent_store, registry, validator))
    }

    #[must_use]
    pub fn federation(&self) -> &FederationOrchestrator {
        &self.federation
    }

    #[must_use]
    pub fn consent(&self) -> &ConsentEngine {
        &self.consent
    }

    #[must_use]
    pub fn registry(&self) -> &RegistryLinker {
        &self.registry
    }

    /// Handles a provider callback, using the session's client token as the
    /// binding secret.
    ///
    /// # Errors
    ///
    /// Returns `BindingMismatch` if the session has no client token or the
    /// token does not match.
    pub fn handle_callback(
        &self,
        session: &Session,
        provider_type: &str,
        binding_token: &str,
        query: &HashMap<String, String>,
    ) -> BrokerResult<CallbackOutcome> {
        let secret = session
            .client_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or(BrokerError::BindingMismatch)?;

        self.federation
            .callback(session, provider_type, binding_token, secret, query)
    }

    /// Decides the next step for the session.
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentity` if consent is required but the session has
    /// no service client id to prompt for.
    pub async fn next_step(&self, session: &Session) -> BrokerResult<FlowStep> {
        if !session.has_user() {
            let links = session
                .client_token
                .as_deref()
                .map(|secret| self.federation.login_links(session, secret))
                .unwrap_or_default();
            return Ok(FlowStep::NeedsLogin(links));
        }

        match self.consent.evaluate(session).await {
            ConsentState::ConsentRequired => {
                Ok(FlowStep::ConsentRequired(self.consent.prompt(session)?))
            }
            _ => Ok(FlowStep::Proceed(
                self.registry.get_user_attributes(&session.user).await,
            )),
        }
    }

    /// Applies the `userconsent` form field.
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentity` if the session lacks the user or service
    /// client required by the chosen path.
    pub async fn submit_consent(
        &self,
        session: &Session,
        userconsent: Option<&str>,
    ) -> BrokerResult<SubmitOutcome> {
        match self
            .consent
            .submit(session, ConsentDecision::from_form(userconsent))
            .await?
        {
            ConsentOutcome::Granted(session) => {
                let attributes = self.registry.get_user_attributes(&session.user).await;
                Ok(SubmitOutcome::Granted {
                    session,
                    attributes,
                })
            }
            ConsentOutcome::Rejected { session, view } => {
                Ok(SubmitOutcome::Rejected { session, view })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::attributes::{AttributeDefinition, AttributeValue};
    use crate::federation::IdentityProviderKind;
    use crate::registry::{
        Account, AccountLookup, CreateAccountRequest, ResponseCode, UserIdType, ValidationResult,
    };
    use crate::session::{ServiceClient, ServiceUrls, Ticket, User};
    use crate::storage::InMemoryConsentStore;

    struct Registry;

    #[async_trait]
    impl RegistryClient for Registry {
        async fn lookup_by_global_id(&self, _user_id: &str) -> BrokerResult<AccountLookup> {
            Ok(AccountLookup {
                response_code: ResponseCode::Ok,
                accounts: vec![Account {
                    provider: "710100".to_string(),
                    user_id_type: UserIdType::Local,
                    user_id_value: "card-1".to_string(),
                }],
                municipality_no: Some("101".to_string()),
                guid: Some("guid-1".to_string()),
            })
        }

        async fn lookup_by_local_id(
            &self,
            _user_id: &str,
            _agency_id: &str,
        ) -> BrokerResult<AccountLookup> {
            Ok(AccountLookup::not_found())
        }

        async fn create_account(&self, _request: &CreateAccountRequest) -> BrokerResult<ResponseCode> {
            Ok(ResponseCode::Ok)
        }
    }

    struct Validator;

    #[async_trait]
    impl MunicipalityValidator for Validator {
        async fn validate(&self, _requester: &str, _user: &User) -> BrokerResult<ValidationResult> {
            Ok(ValidationResult::default())
        }
    }

    fn flow() -> (LoginFlow, Arc<InMemoryConsentStore>) {
        let store = Arc::new(InMemoryConsentStore::new());
        let flow = LoginFlow::new(
            &BrokerConfig::default(),
            store.clone(),
            Arc::new(Registry),
            Arc::new(Validator),
        );
        (flow, store)
    }

    fn session() -> Session {
        let mut client = ServiceClient::new("client-1", "Bibliotek.dk");
        client
            .attributes
            .insert("cpr".to_string(), AttributeDefinition::new("CPR-nummer"));
        client.identity_providers = vec![IdentityProviderKind::Borchk];
        client.urls = ServiceUrls {
            host: "https://client.example".to_string(),
            success: "/ok".to_string(),
            error: "/error".to_string(),
        };

        let mut ticket = Ticket::default();
        ticket
            .attributes
            .insert("cpr".to_string(), AttributeValue::from(json!("0101011234")));

        Session {
            service_client: Some(client),
            ticket,
            client_token: Some("client-token".to_string()),
            ..Session::default()
        }
    }

    fn borchk_query() -> HashMap<String, String> {
        [("id", "card-1"), ("libraryId", "710100"), ("pincode", "1234")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn binding(secret: &str) -> String {
        TokenBinder::new(BrokerConfig::default().binding.salt)
            .bind(secret)
            .into_inner()
    }

    #[tokio::test]
    async fn test_anonymous_session_needs_login() {
        let (flow, _) = flow();

        let step = flow.next_step(&session()).await.unwrap();
        assert!(step.consent_state().is_none());
        let FlowStep::NeedsLogin(links) = step else {
            panic!("expected login links");
        };
        assert_eq!(links.len(), 1);
        assert!(links[0].callback_path.ends_with(&binding("client-token")));
    }

    #[test]
    fn test_from_config_file_rejects_invalid_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[binding]\nsalt = \"\"").unwrap();

        let err = LoginFlow::from_config_file(
            file.path(),
            Arc::new(InMemoryConsentStore::new()),
            Arc::new(Registry),
            Arc::new(Validator),
        )
        .err()
        .unwrap();

        assert!(matches!(err, BrokerError::Configuration { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_callback_without_client_token_is_forbidden() {
        let (flow, _) = flow();
        let session = Session {
            client_token: None,
            ..session()
        };

        let err = flow
            .handle_callback(&session, "borchk", &binding(""), &borchk_query())
            .unwrap_err();
        assert!(matches!(err, BrokerError::BindingMismatch));
    }

    #[tokio::test]
    async fn test_login_consent_and_attributes() {
        let (flow, store) = flow();

        let session = flow
            .handle_callback(&session(), "borchk", &binding("client-token"), &borchk_query())
            .unwrap()
            .into_session();
        assert!(session.has_user());

        let step = flow.next_step(&session).await.unwrap();
        assert_eq!(step.consent_state(), Some(ConsentState::ConsentPromptShown));
        let FlowStep::ConsentRequired(prompt) = step else {
            panic!("expected consent prompt");
        };
        assert_eq!(prompt.consent_action, "/v0/login/consentsubmit/client-token");
        assert!(prompt.attributes.contains_key("cpr"));

        let outcome = flow.submit_consent(&session, Some("1")).await.unwrap();
        let SubmitOutcome::Granted { session, attributes } = outcome else {
            panic!("expected grant");
        };
        assert_eq!(store.len(), 1);
        assert_eq!(attributes.registry_id.as_deref(), Some("guid-1"));
        assert_eq!(attributes.municipality_number.as_deref(), Some("101"));

        match flow.next_step(&session).await.unwrap() {
            FlowStep::Proceed(again) => assert_eq!(again, attributes),
            other => panic!("expected proceed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejection_rolls_back_provider() {
        let (flow, store) = flow();
        let session = flow
            .handle_callback(&session(), "borchk", &binding("client-token"), &borchk_query())
            .unwrap()
            .into_session();

        let outcome = flow.submit_consent(&session, None).await.unwrap();

        let SubmitOutcome::Rejected { session, view } = outcome else {
            panic!("expected rejection");
        };
        assert!(store.is_empty());
        assert!(session.user.identity_providers.is_empty());
        assert_eq!(
            view.return_url,
            "https://client.example/error?message=consent%20was%20rejected"
        );
    }
}
