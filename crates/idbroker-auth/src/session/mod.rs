//! Session state of the login flow.
//!
//! The broker does not persist sessions itself. It receives a [`Session`]
//! snapshot from the session store, derives the next snapshot through the
//! merge operations in [`state`], and hands the result back.

pub mod state;
pub mod types;

pub use types::{ServiceClient, ServiceUrls, Session, SessionUpdate, Ticket, User, UserUpdate};
