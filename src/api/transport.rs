//! HTTP transport abstraction.
//!
//! [`HttpTransport`] executes one fully described [`ApiRequest`] and returns
//! the raw response body. The production implementation wraps a pooled
//! `reqwest::Client`; tests plug in deterministic in-memory transports.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, redirect, Client};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::DispatchOptions;
use crate::config::{ClientConfig, ResponseFormat};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Everything needed to issue one request against the API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API root, query string included
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Raw token sent as the `Authorization` header
    pub authorization: Option<String>,
    pub format: ResponseFormat,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>, format: ResponseFormat) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
            authorization: None,
            format,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value, format: ResponseFormat) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
            authorization: None,
            format,
        }
    }

    pub fn with_authorization(mut self, token: Option<&str>) -> Self {
        self.authorization = token.filter(|t| !t.is_empty()).map(str::to_string);
        self
    }

    /// JSON body to send, if this is a POST with a non-empty payload
    fn json_body(&self) -> Option<&serde_json::Value> {
        if self.method != Method::Post {
            return None;
        }
        self.body.as_ref().filter(|body| match body {
            serde_json::Value::Null => false,
            serde_json::Value::Object(map) => !map.is_empty(),
            serde_json::Value::Array(items) => !items.is_empty(),
            _ => true,
        })
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute a request and return the response body.
    ///
    /// # Errors
    /// `Error::Transport` for connection failures and non-2xx statuses.
    async fn execute(&self, request: &ApiRequest, options: &DispatchOptions) -> Result<String>;
}

/// Production transport over a pooled reqwest client.
/// The certificate-skipping client is only built if a request asks for it.
pub struct ReqwestTransport {
    client: Client,
    insecure: OnceCell<Client>,
    api_root: String,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        Ok(Self {
            client: Self::build_client(timeout, true)?,
            insecure: OnceCell::new(),
            api_root: config.api_root(),
            timeout,
        })
    }

    fn build_client(timeout: Duration, verify_tls: bool) -> Result<Client> {
        Ok(Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .danger_accept_invalid_certs(!verify_tls)
            .build()?)
    }

    async fn client_for(&self, options: &DispatchOptions) -> Result<&Client> {
        if options.verify_tls {
            return Ok(&self.client);
        }
        self.insecure
            .get_or_try_init(|| async { Self::build_client(self.timeout, false) })
            .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest, options: &DispatchOptions) -> Result<String> {
        let url = self.url(&request.path);
        let client = self.client_for(options).await?;

        let mut builder = match request.method {
            Method::Get => client.get(&url),
            Method::Post => client.post(&url),
        };
        builder = builder.header(header::ACCEPT, request.format.accept_header());
        if let Some(ref token) = request.authorization {
            builder = builder.header(header::AUTHORIZATION, token);
        }
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.json_body() {
            builder = builder.json(body);
        }

        debug!(method = request.method.as_str(), url = %url, "Sending request");
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if options.debug {
            info!(
                method = request.method.as_str(),
                url = %url,
                status = status.as_u16(),
                response_len = body.len(),
                "Request completed"
            );
        }

        if !status.is_success() {
            return Err(Error::from_status(status, &body));
        }
        Ok(body)
    }
}
