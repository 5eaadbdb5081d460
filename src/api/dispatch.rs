//! Single-request dispatch and response decoding.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::transport::{ApiRequest, HttpTransport};
use super::DispatchOptions;
use crate::config::ResponseFormat;
use crate::error::{Error, Result};

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    /// XML is passed through untouched
    Xml(String),
}

impl Payload {
    /// Decode a raw body according to the requested format.
    /// An empty JSON body decodes to `null`.
    pub fn decode(format: ResponseFormat, raw: String) -> Result<Self> {
        match format {
            ResponseFormat::Json if raw.trim().is_empty() => {
                Ok(Payload::Json(serde_json::Value::Null))
            }
            ResponseFormat::Json => Ok(Payload::Json(serde_json::from_str(&raw)?)),
            ResponseFormat::Xml => Ok(Payload::Xml(raw)),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Xml(_) => None,
        }
    }

    pub fn as_xml(&self) -> Option<&str> {
        match self {
            Payload::Xml(text) => Some(text),
            Payload::Json(_) => None,
        }
    }

    /// Deserialize a JSON payload into a typed value
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            Payload::Json(value) => Ok(serde_json::from_value(value)?),
            Payload::Xml(_) => Err(Error::Validation(
                "Typed decoding requires the json response format".to_string(),
            )),
        }
    }
}

/// Issues single requests through the shared transport.
/// Clone is cheap - the transport sits behind an `Arc`.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn HttpTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Send one request and return the raw body. No retries.
    pub async fn send(&self, request: &ApiRequest, options: &DispatchOptions) -> Result<String> {
        if let Some(delay) = options.delay() {
            tokio::time::sleep(delay).await;
        }
        debug!(method = request.method.as_str(), path = %request.path, "Dispatching request");
        self.transport.execute(request, options).await
    }

    /// Send and decode according to the request's format
    pub async fn send_decoded(
        &self,
        request: &ApiRequest,
        options: &DispatchOptions,
    ) -> Result<Payload> {
        let raw = self.send(request, options).await?;
        Payload::decode(request.format, raw)
    }
}
