//! Sanity check of external collaborators.
//!
//! Run at startup and from health endpoints. Failures are logged and
//! reported, never propagated.

use serde::Serialize;
use tracing::error;

use crate::registry::MunicipalityValidator;
use crate::session::User;
use crate::storage::ConsentStore;

/// Key read from the consent store to probe it. Never written.
pub const PROBE_CONSENT_KEY: &str = "sanity:check";

/// Identifier used for every field of the validator probe.
const PROBE_VALUE: &str = "check";

/// Reachability of the broker's collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub consent_store: bool,
    pub municipality_validator: bool,
}

impl HealthReport {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.consent_store && self.municipality_validator
    }
}

/// Probes the consent store and the municipality validator.
///
/// The validator counts as reachable as soon as it answers, even if it
/// rejects the probe user.
pub async fn sanity_check(
    consent_store: &dyn ConsentStore,
    validator: &dyn MunicipalityValidator,
    requester: &str,
) -> HealthReport {
    let consent_store = match consent_store.read(PROBE_CONSENT_KEY).await {
        Ok(_) => true,
        Err(e) => {
            error!(error = %e, "Consent store is failing");
            false
        }
    };

    let probe = User {
        user_id: Some(PROBE_VALUE.to_string()),
        agency: Some(PROBE_VALUE.to_string()),
        pincode: Some(PROBE_VALUE.to_string()),
        ..User::default()
    };
    let municipality_validator = match validator.validate(requester, &probe).await {
        Ok(_) => true,
        Err(e) => {
            error!(error = %e, "Municipality validator is failing");
            false
        }
    };

    HealthReport {
        consent_store,
        municipality_validator,
    }
}
