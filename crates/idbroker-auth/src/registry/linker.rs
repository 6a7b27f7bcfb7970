//! Registry account resolution and provisioning.
//!
//! Links the authenticated user to their canonical registry account:
//!
//! 1. **Resolve** - look up by global id, then by local id at the user's agency
//! 2. **Provision** - create the account when a municipality library-card
//!    login has no registry counterpart
//! 3. **Re-resolve** - read back the materialised account
//! 4. **Derive** - compute municipality number and agency
//!
//! The steps run strictly in this order. No registry failure leaves this
//! module; every failure is logged and degraded.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};

use super::client::{
    Account, AccountLookup, CreateAccountRequest, MunicipalityValidator, RegistryClient,
    ResponseCode, UserIdType,
};
use super::municipality::{self, Municipality};
use crate::config::RegistryConfig;
use crate::session::User;
use crate::{BrokerError, BrokerResult};

/// Registry-derived attributes released to the service client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAttributes {
    /// Linked library accounts. Only set when the registry answered OK.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<Account>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality_agency_id: Option<String>,

    /// Registry-wide id. Only set when the registry answered OK.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_id: Option<String>,
}

impl UserAttributes {
    fn municipality_only(municipality: Municipality) -> Self {
        Self {
            municipality_number: municipality.municipality_number,
            municipality_agency_id: municipality.municipality_agency_id,
            ..Self::default()
        }
    }
}

/// Resolves, provisions and enriches registry accounts.
#[derive(Clone)]
pub struct RegistryLinker {
    registry: Arc<dyn RegistryClient>,
    validator: Arc<dyn MunicipalityValidator>,
    config: RegistryConfig,
}

impl RegistryLinker {
    #[must_use]
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        validator: Arc<dyn MunicipalityValidator>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            registry,
            validator,
            config,
        }
    }

    /// Runs a registry call under the configured timeout.
    async fn registry_call<T>(
        &self,
        call: impl Future<Output = BrokerResult<T>>,
    ) -> BrokerResult<T> {
        tokio::time::timeout(self.config.call_timeout, call)
            .await
            .map_err(|_| BrokerError::registry_unavailable("registry call timed out"))?
    }

    /// Looks up the user's account, by global id first and by local id at the
    /// user's agency when the global id is unknown.
    ///
    /// Returns `None` if the registry could not be queried.
    pub async fn resolve_account(&self, user: &User) -> Option<AccountLookup> {
        let Some(user_id) = user.id() else {
            warn!("Can not look up registry account without a userId");
            return None;
        };

        let result = async {
            let lookup = self
                .registry_call(self.registry.lookup_by_global_id(user_id))
                .await?;

            match (&lookup.response_code, user.agency_id()) {
                (ResponseCode::AccountDoesNotExist, Some(agency_id)) => {
                    debug!(user_id, agency_id, "Not found by global id, trying local id");
                    self.registry_call(self.registry.lookup_by_local_id(user_id, agency_id))
                        .await
                }
                _ => Ok(lookup),
            }
        }
        .await;

        match result {
            Ok(lookup) => Some(lookup),
            Err(e) => {
                error!(user_id, error = %e, "Request to registry failed");
                None
            }
        }
    }

    /// Decides whether an account must be created for `library`.
    ///
    /// True only when the library is municipality-enabled, the user's latest
    /// login was the municipality-validating provider, and the registry
    /// either has no account or none held by this library. Accounts listed
    /// alongside any other response code are still checked.
    #[must_use]
    pub fn should_auto_provision(
        &self,
        library: Option<&str>,
        user: &User,
        lookup: Option<&AccountLookup>,
    ) -> bool {
        let Some(library) = library.filter(|l| !l.is_empty()) else {
            return false;
        };
        if !self.config.is_municipality_agency(library) {
            return false;
        }

        if !user
            .last_identity_provider()
            .is_some_and(|provider| provider.validates_municipality())
        {
            return false;
        }

        match lookup {
            Some(lookup) => match lookup.response_code {
                ResponseCode::AccountDoesNotExist => true,
                ResponseCode::Ok => !lookup.has_account_at(library),
                ResponseCode::Other(_) => {
                    !lookup.accounts.is_empty() && !lookup.has_account_at(library)
                }
            },
            None => false,
        }
    }

    /// Municipality number proven by validating the user at a municipality
    /// library.
    ///
    /// Only a municipality agency (`7NNN00`) proves anything, and the number
    /// is read from the agency code. The validator's own number is used only
    /// when the agency code is too short to carry one. `Ok(None)` when the
    /// validation is rejected or the agency is not a municipality library.
    ///
    /// # Errors
    ///
    /// Returns `ValidatorUnavailable` if the validator cannot be reached.
    pub async fn municipality_id(&self, user: &User) -> BrokerResult<Option<String>> {
        let result = tokio::time::timeout(
            self.config.call_timeout,
            self.validator
                .validate(&self.config.municipality_requester, user),
        )
        .await
        .map_err(|_| BrokerError::validator_unavailable("validation timed out"))??;

        let Some(agency_id) = user
            .agency_id()
            .filter(|agency| municipality::is_municipality_agency_code(agency))
        else {
            return Ok(None);
        };
        if !result.is_valid() {
            return Ok(None);
        }

        Ok(municipality::number_from_agency(agency_id).or(result.municipality_number))
    }

    /// Creates a registry account for the user at `library`.
    ///
    /// Uses the national id when known, otherwise the local user id. Returns
    /// `true` only if the registry answered OK; the caller must re-resolve
    /// the account afterwards.
    pub async fn provision_account(&self, user: &User, library: Option<&str>) -> bool {
        let Some(agency_id) = library.filter(|l| !l.is_empty()) else {
            return false;
        };

        let (user_id_type, user_id_value) =
            match (user.cpr.as_deref().filter(|c| !c.is_empty()), user.id()) {
                (Some(cpr), _) => (UserIdType::Cpr, cpr),
                (None, Some(local)) => (UserIdType::Local, local),
                (None, None) => return false,
            };

        let municipality_no = match self.municipality_id(user).await {
            Ok(number) => number,
            Err(e) => {
                warn!(agency_id, error = %e, "Creating account without municipality number");
                None
            }
        };

        let request = CreateAccountRequest {
            user_id_type,
            user_id_value: user_id_value.to_string(),
            agency_id: agency_id.to_string(),
            municipality_no,
        };

        match self
            .registry_call(self.registry.create_account(&request))
            .await
        {
            Ok(code) if code.is_ok() => true,
            Ok(code) => {
                let e = BrokerError::provisioning_failed(format!("registry answered {code}"));
                error!(user_id = ?user.id(), agency_id, error = %e, "Could not create user in registry");
                false
            }
            Err(e) => {
                let e = BrokerError::provisioning_failed(e.to_string());
                error!(user_id = ?user.id(), agency_id, error = %e, "Could not create user in registry");
                false
            }
        }
    }

    /// Derives municipality number and agency for the user.
    ///
    /// A user with library credentials is validated first; a successful
    /// validation wins over the registry's number. A failing validator
    /// yields no municipality at all.
    pub async fn derive_municipality(
        &self,
        registry_municipality_no: Option<&str>,
        user: &User,
    ) -> Municipality {
        let validated = if user.has_library_credentials() {
            match self.municipality_id(user).await {
                Ok(number) => number,
                Err(e) => {
                    error!(user_id = ?user.id(), error = %e, "Could not derive municipality");
                    return Municipality::default();
                }
            }
        } else {
            None
        };

        municipality::derive(validated, registry_municipality_no, user)
    }

    /// Resolves the user's registry account, provisioning it when required,
    /// and returns the attributes derived from it.
    ///
    /// When the registry does not answer OK, only the municipality fields are
    /// returned, derived without registry data.
    pub async fn get_user_attributes(&self, user: &User) -> UserAttributes {
        let library = user.agency_id();
        let mut lookup = self.resolve_account(user).await;

        if self.should_auto_provision(library, user, lookup.as_ref()) {
            // Library-card logins are validated upstream, so the registry
            // should already know this user.
            warn!(user_id = ?user.id(), agency_id = ?library, "Library-card user not in registry");

            if self.provision_account(user, library).await {
                lookup = self.resolve_account(user).await;
            }
        }

        match lookup {
            Some(lookup) if lookup.response_code.is_ok() => {
                let municipality = self
                    .derive_municipality(lookup.municipality_no.as_deref(), user)
                    .await;
                UserAttributes {
                    accounts: Some(lookup.accounts),
                    municipality_number: municipality.municipality_number,
                    municipality_agency_id: municipality.municipality_agency_id,
                    registry_id: lookup.guid,
                }
            }
            _ => UserAttributes::municipality_only(self.derive_municipality(None, user).await),
        }
    }
}
