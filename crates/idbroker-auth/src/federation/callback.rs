//! Provider callback parsers.
//!
//! Each parser extracts the minimal identity shape from the callback query
//! of one provider. Parsers are pure: the query has already been bound to
//! the session and no network call is made.

use std::collections::HashMap;

use super::provider::IdentityProviderKind;
use crate::session::UserUpdate;

/// Query parameter holding the user identifier on every provider callback.
pub const USER_ID_PARAM: &str = "id";

fn param<'a>(query: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    query
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn parse_nemlogin(query: &HashMap<String, String>) -> Option<UserUpdate> {
    let id = param(query, USER_ID_PARAM)?;
    Some(UserUpdate::new(IdentityProviderKind::NemLogin, id).with_cpr(id))
}

fn parse_borchk(query: &HashMap<String, String>) -> Option<UserUpdate> {
    let id = param(query, USER_ID_PARAM)?;
    let mut update = UserUpdate::new(IdentityProviderKind::Borchk, id);
    if let Some(agency) = param(query, "libraryId") {
        update = update.with_agency(agency);
    }
    if let Some(pincode) = param(query, "pincode") {
        update = update.with_pincode(pincode);
    }
    Some(update)
}

fn parse_unilogin(query: &HashMap<String, String>) -> Option<UserUpdate> {
    let id = param(query, USER_ID_PARAM)?;
    let mut update = UserUpdate::new(IdentityProviderKind::UniLogin, id);
    if let Some(unilogin_id) = param(query, "unilogin") {
        update = update.with_unilogin_id(unilogin_id);
    }
    Some(update)
}

/// Parses the callback query of `provider`.
///
/// Returns `None` when the query carries no user identifier.
#[must_use]
pub fn parse_callback(
    provider: IdentityProviderKind,
    query: &HashMap<String, String>,
) -> Option<UserUpdate> {
    match provider {
        IdentityProviderKind::NemLogin => parse_nemlogin(query),
        IdentityProviderKind::Borchk => parse_borchk(query),
        IdentityProviderKind::UniLogin => parse_unilogin(query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_nemlogin() {
        let update = parse_callback(IdentityProviderKind::NemLogin, &query(&[("id", "0101011234")])).unwrap();
        assert_eq!(update.user_id.as_deref(), Some("0101011234"));
        assert_eq!(update.cpr.as_deref(), Some("0101011234"));
        assert_eq!(update.user_type, Some(IdentityProviderKind::NemLogin));
        assert!(update.agency.is_none());
    }

    #[test]
    fn test_parse_borchk() {
        let update = parse_callback(
            IdentityProviderKind::Borchk,
            &query(&[("id", "card-1"), ("libraryId", "710100"), ("pincode", "1234")]),
        )
        .unwrap();
        assert_eq!(update.user_id.as_deref(), Some("card-1"));
        assert_eq!(update.agency.as_deref(), Some("710100"));
        assert_eq!(update.pincode.as_deref(), Some("1234"));
        assert!(update.cpr.is_none());
    }

    #[test]
    fn test_parse_unilogin() {
        let update = parse_callback(
            IdentityProviderKind::UniLogin,
            &query(&[("id", "pupil"), ("unilogin", "uni-42")]),
        )
        .unwrap();
        assert_eq!(update.unilogin_id.as_deref(), Some("uni-42"));
        assert_eq!(update.user_type, Some(IdentityProviderKind::UniLogin));
    }

    #[test]
    fn test_missing_id_yields_nothing() {
        for provider in IdentityProviderKind::ALL {
            assert!(parse_callback(provider, &query(&[])).is_none());
            assert!(parse_callback(provider, &query(&[("id", "")])).is_none());
        }
    }
}
