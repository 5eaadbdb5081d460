//! REST API client module for the sima-land.ru catalog.
//!
//! This module provides the [`Client`] facade plus the pieces it is built
//! from: endpoint paths, transport options, the HTTP transport, and the
//! single and batch dispatchers.
//!
//! The API uses a JWT obtained from the `signin` endpoint, sent verbatim in
//! the `Authorization` header.

pub mod batch;
pub mod client;
pub mod dispatch;
pub mod endpoint;
pub mod options;
pub mod transport;

pub use batch::{BatchDispatcher, BatchItem};
pub use client::{Client, ClientBuilder, EndpointRequest};
pub use dispatch::{Dispatcher, Payload};
pub use endpoint::{Endpoint, Resource};
pub use options::{DispatchOptions, RequestOptions, CONNECTION_LIMIT, DEFAULT_CONCURRENCY};
pub use transport::{ApiRequest, HttpTransport, Method, ReqwestTransport};
