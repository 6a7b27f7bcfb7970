//! Identity provider kinds.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// External authentication methods the broker federates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityProviderKind {
    /// National login. Yields the user's national id.
    #[serde(rename = "nemlogin")]
    NemLogin,

    /// Library-card validation against the user's library.
    /// This is the provider that validates municipality affiliation.
    #[serde(rename = "borchk")]
    Borchk,

    /// Institutional login for schools.
    #[serde(rename = "unilogin")]
    UniLogin,
}

impl IdentityProviderKind {
    /// All known providers, in the order they are offered on the login page.
    pub const ALL: [Self; 3] = [Self::NemLogin, Self::Borchk, Self::UniLogin];

    /// Returns the wire name of the provider.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NemLogin => "nemlogin",
            Self::Borchk => "borchk",
            Self::UniLogin => "unilogin",
        }
    }

    /// Returns `true` for the provider whose login proves municipality affiliation.
    #[must_use]
    pub fn validates_municipality(&self) -> bool {
        matches!(self, Self::Borchk)
    }
}

impl std::fmt::Display for IdentityProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown identity provider: {0}")]
pub struct UnknownProvider(pub String);

impl FromStr for IdentityProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nemlogin" => Ok(Self::NemLogin),
            "borchk" => Ok(Self::Borchk),
            "unilogin" => Ok(Self::UniLogin),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}
