//! Contracts of the external registry and municipality validation services.
//!
//! The broker only depends on these request/response shapes; the wire
//! clients live with the embedding application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::BrokerResult;
use crate::session::User;

/// Status vocabulary of the registry webservice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseCode {
    /// `OK200`
    Ok,
    /// `ACCOUNT_DOES_NOT_EXIST`
    AccountDoesNotExist,
    /// Any other status.
    Other(String),
}

impl ResponseCode {
    /// Returns the wire representation of the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "OK200",
            Self::AccountDoesNotExist => "ACCOUNT_DOES_NOT_EXIST",
            Self::Other(code) => code,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl From<String> for ResponseCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "OK200" => Self::Ok,
            "ACCOUNT_DOES_NOT_EXIST" => Self::AccountDoesNotExist,
            _ => Self::Other(code),
        }
    }
}

impl From<ResponseCode> for String {
    fn from(code: ResponseCode) -> Self {
        code.as_str().to_string()
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of identifier an account is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserIdType {
    /// National id.
    #[serde(rename = "CPR")]
    Cpr,
    /// Identifier local to one library agency.
    #[serde(rename = "LOCAL")]
    Local,
}

/// A library account linked to the user in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Agency (library) holding the account.
    pub provider: String,
    pub user_id_type: UserIdType,
    pub user_id_value: String,
}

/// Result of a registry account lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountLookup {
    pub response_code: ResponseCode,

    #[serde(default)]
    pub accounts: Vec<Account>,

    /// Municipality number registered for the user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality_no: Option<String>,

    /// Registry-wide id of the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

impl AccountLookup {
    /// A lookup reporting that no account exists.
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            response_code: ResponseCode::AccountDoesNotExist,
            accounts: Vec::new(),
            municipality_no: None,
            guid: None,
        }
    }

    /// Returns `true` if one of the accounts is held by `library`.
    #[must_use]
    pub fn has_account_at(&self, library: &str) -> bool {
        self.accounts.iter().any(|account| account.provider == library)
    }
}

/// Request to create a registry account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub user_id_type: UserIdType,
    pub user_id_value: String,
    pub agency_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality_no: Option<String>,
}

/// The canonical user-account registry.
///
/// Transport and protocol failures are reported as
/// [`BrokerError::RegistryUnavailable`](crate::BrokerError::RegistryUnavailable).
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Looks up accounts by the user's global identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached.
    async fn lookup_by_global_id(&self, user_id: &str) -> BrokerResult<AccountLookup>;

    /// Looks up accounts by an identifier local to `agency_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached.
    async fn lookup_by_local_id(&self, user_id: &str, agency_id: &str)
    -> BrokerResult<AccountLookup>;

    /// Creates an account and returns the registry's status code.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached.
    async fn create_account(&self, request: &CreateAccountRequest) -> BrokerResult<ResponseCode>;
}

/// Answer of the municipality validation webservice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Validation error reported by the library system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Municipality number of the validated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub municipality_number: Option<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Validates a library-card user against a municipality library.
#[async_trait]
pub trait MunicipalityValidator: Send + Sync {
    /// Validates `user` on behalf of `requester`.
    ///
    /// # Errors
    ///
    /// Returns an error if the webservice cannot be reached.
    async fn validate(&self, requester: &str, user: &User) -> BrokerResult<ValidationResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_code_wire_names() {
        assert_eq!(ResponseCode::from("OK200".to_string()), ResponseCode::Ok);
        assert_eq!(
            ResponseCode::from("ACCOUNT_DOES_NOT_EXIST".to_string()),
            ResponseCode::AccountDoesNotExist
        );
        assert_eq!(
            ResponseCode::from("ERROR_IN_REQUEST".to_string()),
            ResponseCode::Other("ERROR_IN_REQUEST".to_string())
        );
        assert!(ResponseCode::Ok.is_ok());
        assert!(!ResponseCode::AccountDoesNotExist.is_ok());
    }

    #[test]
    fn test_lookup_deserializes() {
        let lookup: AccountLookup = serde_json::from_value(serde_json::json!({
            "responseCode": "OK200",
            "accounts": [
                {"provider": "710100", "userIdType": "CPR", "userIdValue": "0101011234"}
            ],
            "municipalityNo": "101",
            "guid": "a1b2"
        }))
        .unwrap();

        assert!(lookup.response_code.is_ok());
        assert!(lookup.has_account_at("710100"));
        assert!(!lookup.has_account_at("715100"));
        assert_eq!(lookup.accounts[0].user_id_type, UserIdType::Cpr);
        assert_eq!(lookup.municipality_no.as_deref(), Some("101"));
    }

    #[test]
    fn test_create_request_serializes() {
        let request = CreateAccountRequest {
            user_id_type: UserIdType::Local,
            user_id_value: "card-1".to_string(),
            agency_id: "710100".to_string(),
            municipality_no: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"userIdType": "LOCAL", "userIdValue": "card-1", "agencyId": "710100"})
        );
    }
}
