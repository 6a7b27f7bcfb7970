//! Central user registry integration.
//!
//! - [`client`] - contracts of the registry and municipality validation services
//! - [`municipality`] - municipality number/agency derivation rules
//! - [`linker`] - account resolution, auto-provisioning and attribute derivation

pub mod client;
pub mod linker;
pub mod municipality;

pub use client::{
    Account, AccountLookup, CreateAccountRequest, MunicipalityValidator, RegistryClient,
    ResponseCode, UserIdType, ValidationResult,
};
pub use linker::{RegistryLinker, UserAttributes};
pub use municipality::Municipality;
