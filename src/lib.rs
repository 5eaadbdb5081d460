//! Async client SDK for the sima-land.ru catalog API.
//!
//! A [`Client`] signs in once (caching the token on disk for seven days),
//! builds endpoint paths for the catalog resources, and fetches them either
//! one at a time or as a concurrent, rate-paced batch.
//!
//! ```no_run
//! use simaland_sdk::{Client, ClientConfig, RequestOptions, SignInCredentials};
//!
//! # async fn run() -> simaland_sdk::Result<()> {
//! let client = Client::new(
//!     ClientConfig::default(),
//!     SignInCredentials::with_email("user@example.com", "secret"),
//! )
//! .await?;
//!
//! let item = client.item().id(1).send().await?;
//! println!("{:?}", item);
//!
//! let paths: Vec<String> = (1..=3).map(|id| client.item().id(id).prepare()).collect();
//! for entry in client.send_batch(paths, &RequestOptions::default()).await {
//!     println!("{} -> {:?}", entry.path, entry.result.is_ok());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;

pub use api::{
    BatchItem, Client, ClientBuilder, DispatchOptions, Endpoint, EndpointRequest, HttpTransport,
    Payload, RequestOptions, Resource,
};
pub use auth::{Credential, CredentialStore, SessionStore, SignInCredentials};
pub use config::{ClientConfig, ResponseFormat};
pub use error::{Error, Result};
