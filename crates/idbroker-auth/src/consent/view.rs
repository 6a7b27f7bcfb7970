//! Consent screen view models and form parsing.

use serde::Serialize;

use crate::attributes::AttributeCatalog;

/// Query appended to the client's error URL when consent is rejected.
pub const REJECTION_MESSAGE_QUERY: &str = "?message=consent%20was%20rejected";

/// The user's answer on the consent screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Grant,
    Reject,
}

impl ConsentDecision {
    /// Parses the `userconsent` form field.
    ///
    /// Absent, empty and `"0"` reject; any other value grants.
    #[must_use]
    pub fn from_form(userconsent: Option<&str>) -> Self {
        match userconsent {
            None | Some("" | "0") => Self::Reject,
            Some(_) => Self::Grant,
        }
    }
}

/// Data for rendering the consent prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentPrompt {
    /// Display name of the service client.
    pub service_name: String,
    /// Attributes the user is asked to release.
    pub attributes: AttributeCatalog,
    /// Form action of the consent submission.
    pub consent_action: String,
    /// Where "cancel" leads. Empty when the request had no return URL.
    pub return_url: String,
}

/// Data for rendering the page shown after consent was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRejection {
    /// Display name of the service client.
    pub service_name: String,
    /// The client's error URL carrying the rejection message.
    pub return_url: String,
}
