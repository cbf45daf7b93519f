//! `quotedesk-auth`: authorization boundary for offer operations.
//!
//! Authentication happens upstream; this crate only receives an already
//! authenticated [`Actor`] and decides whether it may touch an offer.

pub mod actor;
pub mod authorize;
pub mod roles;

pub use actor::Actor;
pub use authorize::{authorize_owner, AuthzError};
pub use roles::Role;
