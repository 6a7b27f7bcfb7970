//! Error types for the federation and consent engine.
//!
//! Every external call made by the engine is reduced to one of the variants
//! below. Apart from [`BrokerError::BindingMismatch`], which aborts the
//! current provider callback, all kinds are logged and degraded to
//! best-effort defaults by the component that produced them.

/// Errors that can occur while brokering a login.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The binding token on a provider callback does not match the session.
    #[error("Binding token does not match the session")]
    BindingMismatch,

    /// The user registry could not be reached or answered with a protocol error.
    #[error("Registry unavailable: {message}")]
    RegistryUnavailable {
        /// Description of the registry failure.
        message: String,
    },

    /// The consent store could not be read or written.
    #[error("Consent store unavailable: {message}")]
    ConsentStoreUnavailable {
        /// Description of the storage failure.
        message: String,
    },

    /// The municipality validation webservice could not be reached.
    #[error("Municipality validator unavailable: {message}")]
    ValidatorUnavailable {
        /// Description of the validator failure.
        message: String,
    },

    /// The user id or service client id required by an operation is absent.
    #[error("Missing identity: {message}")]
    MissingIdentity {
        /// Which part of the identity is missing.
        message: String,
    },

    /// Creating a registry account failed.
    #[error("Provisioning failed: {message}")]
    ProvisioningFailed {
        /// Description of the provisioning failure.
        message: String,
    },

    /// The broker configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl BrokerError {
    /// Creates a new `RegistryUnavailable` error.
    #[must_use]
    pub fn registry_unavailable(message: impl Into<String>) -> Self {
        Self::RegistryUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `ConsentStoreUnavailable` error.
    #[must_use]
    pub fn consent_store_unavailable(message: impl Into<String>) -> Self {
        Self::ConsentStoreUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `ValidatorUnavailable` error.
    #[must_use]
    pub fn validator_unavailable(message: impl Into<String>) -> Self {
        Self::ValidatorUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `MissingIdentity` error.
    #[must_use]
    pub fn missing_identity(message: impl Into<String>) -> Self {
        Self::MissingIdentity {
            message: message.into(),
        }
    }

    /// Creates a new `ProvisioningFailed` error.
    #[must_use]
    pub fn provisioning_failed(message: impl Into<String>) -> Self {
        Self::ProvisioningFailed {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the error must abort the current request.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BindingMismatch)
    }

    /// Returns `true` if the error originates from an external collaborator.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Self::RegistryUnavailable { .. }
                | Self::ConsentStoreUnavailable { .. }
                | Self::ValidatorUnavailable { .. }
                | Self::ProvisioningFailed { .. }
        )
    }

    /// HTTP status code the transport boundary should answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BindingMismatch => 403,
            Self::MissingIdentity { .. } => 400,
            Self::RegistryUnavailable { .. }
            | Self::ConsentStoreUnavailable { .. }
            | Self::ValidatorUnavailable { .. } => 503,
            Self::ProvisioningFailed { .. } | Self::Configuration { .. } => 500,
        }
    }
}

impl From<crate::config::ConfigError> for BrokerError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}
