//! Authentication module: the session lifecycle core.
//!
//! This module provides:
//! - `SessionManager`: the session state machine (login, restore,
//!   refresh, logout) and sole owner of the credential store
//! - `CredentialStore`: durable token + profile-snapshot persistence
//! - `token`: JWT claim extraction (no signature verification)
//! - `gate`: the view-level access gate
//! - `Keychain`: optional remember-me password storage via the OS keyring

pub mod gate;
pub mod keychain;
pub mod session;
pub mod store;
pub mod token;

pub use gate::GateDecision;
pub use keychain::Keychain;
pub use session::{AuthBackend, AuthError, SessionManager, TokenPair};
pub use store::CredentialStore;
