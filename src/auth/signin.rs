use serde::Deserialize;
use tracing::{debug, info};

use super::credentials::SignInCredentials;
use super::session::{Credential, SessionStore};
use crate::api::{ApiRequest, DispatchOptions, Dispatcher};
use crate::config::ResponseFormat;
use crate::error::{Error, Result};

/// Sign-in endpoint, relative to the API root
const SIGN_IN_PATH: &str = "signin";

#[derive(Debug, Deserialize)]
struct SignInResponse {
    token: String,
}

/// Exchanges user credentials for a session token.
pub struct Authenticator<'a> {
    dispatcher: &'a Dispatcher,
    options: &'a DispatchOptions,
}

impl<'a> Authenticator<'a> {
    pub fn new(dispatcher: &'a Dispatcher, options: &'a DispatchOptions) -> Self {
        Self {
            dispatcher,
            options,
        }
    }

    /// Sign in with one request and persist the resulting credential.
    ///
    /// Invalid credentials fail before anything is sent. Failures are not retried.
    pub async fn authenticate(
        &self,
        credentials: &SignInCredentials,
        store: &mut SessionStore,
    ) -> Result<Credential> {
        credentials.validate()?;

        let body = serde_json::to_value(credentials)
            .map_err(|e| Error::Validation(format!("Cannot encode credentials: {}", e)))?;
        let request = ApiRequest::post(SIGN_IN_PATH, body, ResponseFormat::Json);

        debug!(identifier = credentials.identifier(), "Signing in");
        let raw = self
            .dispatcher
            .send(&request, self.options)
            .await
            .map_err(|e| Error::Authentication(format!("Sign-in request failed: {}", e)))?;

        let response: SignInResponse = serde_json::from_str(&raw)
            .map_err(|e| Error::Authentication(format!("Malformed sign-in response: {}", e)))?;
        if response.token.trim().is_empty() {
            return Err(Error::Authentication(
                "Sign-in response contained an empty token".to_string(),
            ));
        }

        let credential = Credential::new(response.token);
        store.save(credential.clone())?;
        info!(identifier = credentials.identifier(), "Signed in");
        Ok(credential)
    }
}
