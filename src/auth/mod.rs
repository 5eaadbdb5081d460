//! Authentication module for sign-in and session persistence.
//!
//! This module provides:
//! - `SessionStore`: File-backed token cache with a 7 day lifetime
//! - `Authenticator`: One-shot exchange of credentials for a token
//! - `SignInCredentials` / `CredentialStore`: Sign-in input and OS keychain storage

pub mod credentials;
pub mod session;
pub mod signin;

pub use credentials::{CredentialStore, SignInCredentials};
pub use session::{Credential, SessionStore, TOKEN_EXPIRY_DAYS};
pub use signin::Authenticator;
