use std::fmt;

use keyring::Entry;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

const SERVICE_NAME: &str = "simaland-sdk";

/// User credentials exchanged for a session token at sign-in.
///
/// Serializes to the sign-in request body; absent identifiers are omitted.
#[derive(Clone, Default, Serialize)]
pub struct SignInCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub password: Option<String>,
    /// Unset means accepted
    #[serde(rename = "regulation", serialize_with = "regulation_or_default")]
    pub accept_regulation: Option<bool>,
}

fn regulation_or_default<S: Serializer>(
    value: &Option<bool>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_bool(value.unwrap_or(true))
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

impl fmt::Debug for SignInCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInCredentials")
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("accept_regulation", &self.accept_regulation)
            .finish()
    }
}

impl SignInCredentials {
    pub fn with_email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    pub fn with_phone(phone: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// Set the user-agreement acceptance flag sent with sign-in
    pub fn accept_regulation(mut self, accept: bool) -> Self {
        self.accept_regulation = Some(accept);
        self
    }

    /// Read `SIMALAND_EMAIL` / `SIMALAND_PHONE` / `SIMALAND_PASSWORD`,
    /// loading a `.env` file first if one is present.
    /// Blank values count as unset.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let credentials = Self {
            email: var("SIMALAND_EMAIL"),
            phone: var("SIMALAND_PHONE"),
            password: var("SIMALAND_PASSWORD"),
            accept_regulation: None,
        };
        credentials.validate()?;
        Ok(credentials)
    }

    /// Build credentials from a password kept in the OS keychain.
    /// An identifier containing `@` is treated as an email, anything else as a phone.
    pub fn from_keyring(identifier: &str) -> Result<Self> {
        let password = CredentialStore::get_password(identifier)?;
        if identifier.contains('@') {
            Ok(Self::with_email(identifier, password))
        } else {
            Ok(Self::with_phone(identifier, password))
        }
    }

    /// Check that an identifier and a password are present
    pub fn validate(&self) -> Result<()> {
        let present = |v: &Option<String>| non_blank(v).is_some();

        if !present(&self.email) && !present(&self.phone) {
            return Err(Error::Validation(
                "Email or phone needed for authorization".to_string(),
            ));
        }
        if !present(&self.password) {
            return Err(Error::Validation(
                "Password should be set for authorization".to_string(),
            ));
        }
        Ok(())
    }

    /// Email if set, phone otherwise (for log fields)
    pub fn identifier(&self) -> &str {
        non_blank(&self.email)
            .or(non_blank(&self.phone))
            .unwrap_or_default()
    }
}

/// OS keychain access for stored sign-in passwords.
pub struct CredentialStore;

impl CredentialStore {
    /// Store the password for an email or phone in the OS keychain
    pub fn store(identifier: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, identifier)?;
        entry.set_password(password)?;
        Ok(())
    }

    /// Retrieve the password for an email or phone from the OS keychain
    pub fn get_password(identifier: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, identifier)?;
        Ok(entry.get_password()?)
    }

    /// Delete stored credentials for an identifier
    pub fn delete(identifier: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, identifier)?;
        entry.delete_credential()?;
        Ok(())
    }

    /// Check if credentials exist for an identifier
    pub fn has_credentials(identifier: &str) -> bool {
        if let Ok(entry) = Entry::new(SERVICE_NAME, identifier) {
            entry.get_password().is_ok()
        } else {
            false
        }
    }
}
