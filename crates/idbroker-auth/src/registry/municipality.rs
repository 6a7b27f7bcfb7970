//! Municipality derivation.
//!
//! Municipality fields are only trusted when the user proved affiliation
//! through a municipality library login, or when the registry reports a
//! three-digit municipality number. Everything else falls back to what the
//! user's own agency code implies.

use serde::Serialize;

use crate::session::User;

/// Municipality affiliation of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Municipality {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality_agency_id: Option<String>,
}

impl Municipality {
    #[must_use]
    pub fn new(number: Option<String>, agency_id: Option<String>) -> Self {
        Self {
            municipality_number: number,
            municipality_agency_id: agency_id,
        }
    }
}

/// Returns `true` for agency codes of municipality-operated libraries.
#[must_use]
pub fn is_municipality_agency_code(agency_id: &str) -> bool {
    agency_id.starts_with('7')
}

/// Municipality number encoded in a municipality library's agency code
/// (`7NNN00` yields `NNN`).
#[must_use]
pub fn number_from_agency(agency_id: &str) -> Option<String> {
    if !is_municipality_agency_code(agency_id) {
        return None;
    }
    agency_id.get(1..4).map(str::to_string)
}

/// Canonical agency code of a municipality's main library.
#[must_use]
pub fn agency_from_number(number: &str) -> String {
    format!("7{number}00")
}

/// Derives municipality fields once the validation side-channel has been
/// consulted.
///
/// `validated_number` is the number obtained from a successful library-card
/// validation and takes priority over everything else. Then a three-digit
/// registry number is used, then the user's agency code.
#[must_use]
pub fn derive(
    validated_number: Option<String>,
    registry_municipality_no: Option<&str>,
    user: &User,
) -> Municipality {
    let agency = user.agency_id();

    if let (Some(number), Some(agency)) = (validated_number, agency) {
        return Municipality::new(Some(number), Some(agency.to_string()));
    }

    if let Some(number) = registry_municipality_no.filter(|n| n.chars().count() == 3) {
        let agency_id = match agency {
            Some(agency) if is_municipality_agency_code(agency) => agency_from_number(number),
            Some(agency) => agency.to_string(),
            None => agency_from_number(number),
        };
        return Municipality::new(Some(number.to_string()), Some(agency_id));
    }

    match agency {
        Some(agency) => Municipality::new(number_from_agency(agency), Some(agency.to_string())),
        None => Municipality::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::IdentityProviderKind;
    use crate::session::{Session, UserUpdate};

    fn user(agency: Option<&str>) -> User {
        let mut update = UserUpdate::new(IdentityProviderKind::Borchk, "0101011234");
        if let Some(agency) = agency {
            update = update.with_agency(agency);
        }
        Session::default().with_user(update).user
    }

    #[test]
    fn test_validated_number_wins() {
        let result = derive(Some("101".to_string()), Some("851"), &user(Some("710100")));
        assert_eq!(
            result,
            Municipality::new(Some("101".to_string()), Some("710100".to_string()))
        );
    }

    #[test]
    fn test_registry_number_keeps_non_municipality_agency() {
        let result = derive(None, Some("101"), &user(Some("833000")));
        assert_eq!(
            result,
            Municipality::new(Some("101".to_string()), Some("833000".to_string()))
        );
    }

    #[test]
    fn test_registry_number_rewrites_municipality_agency() {
        let result = derive(None, Some("101"), &user(Some("733000")));
        assert_eq!(
            result,
            Municipality::new(Some("101".to_string()), Some("710100".to_string()))
        );
    }

    #[test]
    fn test_registry_number_without_agency() {
        let result = derive(None, Some("851"), &user(None));
        assert_eq!(
            result,
            Municipality::new(Some("851".to_string()), Some("785100".to_string()))
        );
    }

    #[test]
    fn test_registry_number_must_have_three_digits() {
        let result = derive(None, Some("1010"), &user(Some("710100")));
        assert_eq!(
            result,
            Municipality::new(Some("101".to_string()), Some("710100".to_string()))
        );
    }

    #[test]
    fn test_agency_fallback() {
        let result = derive(None, None, &user(Some("710100")));
        assert_eq!(
            result,
            Municipality::new(Some("101".to_string()), Some("710100".to_string()))
        );

        let result = derive(None, None, &user(Some("820010")));
        assert_eq!(result, Municipality::new(None, Some("820010".to_string())));
    }

    #[test]
    fn test_nothing_known() {
        assert_eq!(derive(None, None, &user(None)), Municipality::default());
        assert_eq!(
            derive(Some("101".to_string()), None, &user(None)),
            Municipality::default()
        );
    }

    #[test]
    fn test_number_from_short_agency() {
        assert_eq!(number_from_agency("71"), None);
        assert_eq!(number_from_agency("7101"), Some("101".to_string()));
    }
}
