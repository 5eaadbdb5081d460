//! Client facade for the sima-land.ru catalog API.
//!
//! This module provides the `Client` struct: it signs in (or reuses a stored
//! session) on construction, exposes one builder method per catalog
//! resource, and routes requests to the single or batch dispatcher.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::batch::{BatchDispatcher, BatchItem};
use super::dispatch::{Dispatcher, Payload};
use super::endpoint::{Endpoint, Resource};
use super::options::{DispatchOptions, RequestOptions};
use super::transport::{ApiRequest, HttpTransport, ReqwestTransport};
use crate::auth::{Authenticator, Credential, SessionStore, SignInCredentials};
use crate::config::{ClientConfig, ResponseFormat};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    credentials: Option<SignInCredentials>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Credentials used when no valid stored session exists
    pub fn credentials(mut self, credentials: SignInCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn format(mut self, format: ResponseFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = Some(cache_dir.into());
        self
    }

    pub fn options(mut self, options: DispatchOptions) -> Self {
        self.config.options = options;
        self
    }

    /// Replace the reqwest transport, e.g. with an in-memory one for tests
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client, signing in unless a valid session is stored.
    ///
    /// Supplied credentials are validated before any file or network access.
    pub async fn build(self) -> Result<Client> {
        if let Some(ref credentials) = self.credentials {
            credentials.validate()?;
        }
        self.config.validate()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let dispatcher = Dispatcher::new(transport);
        let mut session = SessionStore::new(self.config.cache_dir()?);

        let credential = if session.exists()? {
            debug!("Reusing stored session");
            session.load()?
        } else {
            let credentials = self.credentials.ok_or_else(|| {
                Error::Validation("No stored session and no credentials to sign in with".to_string())
            })?;
            Authenticator::new(&dispatcher, &self.config.options)
                .authenticate(&credentials, &mut session)
                .await?
        };

        Ok(Client {
            batch: BatchDispatcher::new(dispatcher.clone()),
            dispatcher,
            session,
            credential: Some(credential),
            format: self.config.format,
            options: self.config.options,
        })
    }
}

/// Authenticated client for the catalog API.
///
/// Owns one transport (and its connection pool) for its whole lifetime.
pub struct Client {
    dispatcher: Dispatcher,
    batch: BatchDispatcher,
    session: SessionStore,
    credential: Option<Credential>,
    format: ResponseFormat,
    options: DispatchOptions,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client from config and credentials
    pub async fn new(config: ClientConfig, credentials: SignInCredentials) -> Result<Self> {
        Self::builder()
            .config(config)
            .credentials(credentials)
            .build()
            .await
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    /// Set the format for subsequent responses
    pub fn set_format(&mut self, format: ResponseFormat) {
        self.format = format;
    }

    /// Set the format by name, `json` or `xml`
    pub fn set_return_format(&mut self, format: &str) -> Result<()> {
        self.format = format.parse()?;
        Ok(())
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Default transport options, before per-call overrides
    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    // ===== Resources =====

    pub fn endpoint(&self, endpoint: Endpoint) -> EndpointRequest<'_> {
        EndpointRequest {
            client: self,
            endpoint,
            overrides: RequestOptions::default(),
        }
    }

    fn resource(&self, resource: Resource) -> EndpointRequest<'_> {
        self.endpoint(Endpoint::new(resource))
    }

    pub fn attribute(&self) -> EndpointRequest<'_> {
        self.resource(Resource::Attribute)
    }

    pub fn category(&self) -> EndpointRequest<'_> {
        self.resource(Resource::Category)
    }

    pub fn country(&self) -> EndpointRequest<'_> {
        self.resource(Resource::Country)
    }

    pub fn data_type(&self) -> EndpointRequest<'_> {
        self.resource(Resource::DataType)
    }

    pub fn item(&self) -> EndpointRequest<'_> {
        self.resource(Resource::Item)
    }

    pub fn item_attribute(&self) -> EndpointRequest<'_> {
        self.resource(Resource::ItemAttribute)
    }

    pub fn item_category(&self) -> EndpointRequest<'_> {
        self.resource(Resource::ItemCategory)
    }

    pub fn item_modifier(&self) -> EndpointRequest<'_> {
        self.resource(Resource::ItemModifier)
    }

    pub fn modifier(&self) -> EndpointRequest<'_> {
        self.resource(Resource::Modifier)
    }

    pub fn option(&self) -> EndpointRequest<'_> {
        self.resource(Resource::Option)
    }

    /// Photo size catalog. The API serves it as one unpaged list, so an
    /// `id` or `page` set on this request is sent but ignored by the server.
    pub fn photo_size(&self) -> EndpointRequest<'_> {
        self.resource(Resource::PhotoSize)
    }

    pub fn trademark(&self) -> EndpointRequest<'_> {
        self.resource(Resource::Trademark)
    }

    pub fn unit(&self) -> EndpointRequest<'_> {
        self.resource(Resource::Unit)
    }

    // ===== Dispatch =====

    fn token(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.token.as_str())
    }

    fn get_request(&self, path: impl Into<String>) -> ApiRequest {
        ApiRequest::get(path, self.format).with_authorization(self.token())
    }

    /// Send a GET for a prepared path and decode the response
    pub async fn send_path(&self, path: &str, overrides: &RequestOptions) -> Result<Payload> {
        let options = self.options.merged(overrides);
        self.dispatcher
            .send_decoded(&self.get_request(path), &options)
            .await
    }

    /// Fetch many prepared paths concurrently.
    ///
    /// Returns one decoded result per path, in the order the paths were given.
    pub async fn send_batch<I, S>(
        &self,
        paths: I,
        overrides: &RequestOptions,
    ) -> Vec<BatchItem<Payload>>
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: ExactSizeIterator + Send,
        S: Into<String>,
    {
        let options = self.options.merged(overrides);
        let format = self.format;
        self.batch
            .send_batch(self.batch_requests(paths), &options)
            .await
            .into_iter()
            .map(|item| item.map(|raw| Payload::decode(format, raw)))
            .collect()
    }

    /// Like [`send_batch`](Self::send_batch) but yields results as they complete.
    pub fn send_batch_unordered<'a, I, S>(
        &'a self,
        paths: I,
        overrides: &RequestOptions,
    ) -> impl Stream<Item = BatchItem<Payload>> + Send + 'a
    where
        I: IntoIterator<Item = S> + 'a,
        I::IntoIter: ExactSizeIterator + Send + 'a,
        S: Into<String> + 'a,
    {
        let options = self.options.merged(overrides);
        let format = self.format;
        self.batch
            .stream(self.batch_requests(paths), &options)
            .map(move |item| item.map(|raw| Payload::decode(format, raw)))
    }

    fn batch_requests<I, S>(&self, paths: I) -> impl ExactSizeIterator<Item = ApiRequest> + Send
    where
        I: IntoIterator<Item = S>,
        I::IntoIter: ExactSizeIterator + Send,
        S: Into<String>,
    {
        let format = self.format;
        let token = self.token().map(str::to_string);
        paths
            .into_iter()
            .map(move |path| ApiRequest::get(path, format).with_authorization(token.as_deref()))
    }

    // ===== Session =====

    /// Sign in again and replace the current credential
    pub async fn reauthenticate(&mut self, credentials: &SignInCredentials) -> Result<()> {
        let credential = Authenticator::new(&self.dispatcher, &self.options)
            .authenticate(credentials, &mut self.session)
            .await?;
        self.credential = Some(credential);
        Ok(())
    }

    /// Forget the credential and remove the stored session
    pub fn sign_out(&mut self) -> Result<()> {
        self.credential = None;
        self.session.clear()?;
        info!("Signed out");
        Ok(())
    }
}

/// One endpoint lookup being prepared against a client.
pub struct EndpointRequest<'a> {
    client: &'a Client,
    endpoint: Endpoint,
    overrides: RequestOptions,
}

impl<'a> EndpointRequest<'a> {
    pub fn id(mut self, id: u64) -> Self {
        self.endpoint.id = Some(id);
        self
    }

    /// Page number; pages at or below 1 are not sent
    pub fn page(mut self, page: u32) -> Self {
        self.endpoint.page = page;
        self
    }

    pub fn brief(mut self) -> Self {
        self.endpoint.brief = true;
        self
    }

    pub fn by_sid(mut self) -> Self {
        self.endpoint.by_sid = true;
        self
    }

    /// Transport overrides for this request only
    pub fn options(mut self, overrides: RequestOptions) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The relative path, for inclusion in a batch
    pub fn prepare(&self) -> String {
        self.endpoint.path()
    }

    pub async fn send(self) -> Result<Payload> {
        self.client
            .send_path(&self.endpoint.path(), &self.overrides)
            .await
    }

    /// Send and deserialize a JSON response into `T`
    pub async fn send_as<T: DeserializeOwned>(self) -> Result<T> {
        self.send().await?.deserialize()
    }

    /// Walk pages starting at the current one until an empty page.
    ///
    /// Each element is one page of records. The stream ends after the first error.
    pub fn pages(self) -> impl Stream<Item = Result<Vec<serde_json::Value>>> + 'a {
        let EndpointRequest {
            client,
            endpoint,
            overrides,
        } = self;
        let first = endpoint.page.max(1);

        stream::unfold(Some(first), move |page| {
            let endpoint = endpoint.clone();
            let overrides = overrides.clone();
            async move {
                let page = page?;
                let current = Endpoint { page, ..endpoint };
                let records = client
                    .send_path(&current.path(), &overrides)
                    .await
                    .and_then(Payload::deserialize::<Vec<serde_json::Value>>);
                match records {
                    Ok(records) if records.is_empty() => None,
                    Ok(records) => Some((Ok(records), Some(page + 1))),
                    Err(e) => Some((Err(e), None)),
                }
            }
        })
    }
}
