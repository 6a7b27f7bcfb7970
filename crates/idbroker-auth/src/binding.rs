//! Callback token binding.
//!
//! Provider links carry a token derived from the session's secret. When the
//! provider redirects back, the token in the callback path is recomputed from
//! the session and compared, so a callback can only complete the session that
//! issued the link.
//!
//! ```
//! use idbroker_auth::binding::TokenBinder;
//!
//! let binder = TokenBinder::new("salt");
//! let token = binder.bind("session-secret");
//! assert!(binder.verify(token.as_str(), "session-secret"));
//! assert!(!binder.verify(token.as_str(), "another-session"));
//! ```

use sha2::{Digest, Sha256};

/// A binding token as embedded in provider callback links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingToken(String);

impl BindingToken {
    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the token and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for BindingToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BindingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates and verifies salted one-way bindings of session secrets.
#[derive(Debug, Clone)]
pub struct TokenBinder {
    salt: String,
}

impl TokenBinder {
    /// Creates a binder with a fixed salt.
    #[must_use]
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Computes `HEX(SHA256(secret || salt))`.
    #[must_use]
    pub fn bind(&self, session_secret: &str) -> BindingToken {
        let mut hasher = Sha256::new();
        hasher.update(session_secret.as_bytes());
        hasher.update(self.salt.as_bytes());
        BindingToken(hex::encode(hasher.finalize()))
    }

    /// Returns `true` only if `candidate` is exactly the binding of `session_secret`.
    #[must_use]
    pub fn verify(&self, candidate: &str, session_secret: &str) -> bool {
        let expected = self.bind(session_secret);
        candidate == expected.as_str()
    }
}
