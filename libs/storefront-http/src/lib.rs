#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for the storefront back-office client
//!
//! This crate provides a hyper-based HTTP client with:
//! - Automatic TLS via rustls (HTTPS only by default)
//! - Connection pooling
//! - A per-request timeout enforced by a tower `TimeoutLayer`
//! - User-Agent header injection
//! - Fully buffered responses with a body size limit
//!
//! Retries, redirects and decompression are intentionally absent: replay
//! decisions belong to the authenticated layer above this crate.
//!
//! The [`HttpTransport`] trait is the seam consumed by `storefront-auth`;
//! [`HttpClient`] is the production implementation.
//!
//! # Example
//!
//! ```ignore
//! use storefront_http::{HttpClient, HttpTransport};
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .user_agent("storefront-backoffice/0.3")
//!     .build()?;
//!
//! let request = http::Request::get("https://api.example.com/orders")
//!     .body(bytes::Bytes::new())?;
//! let orders: Vec<Order> = client.execute(request).await?.json()?;
//! ```

mod builder;
mod client;
mod config;
mod error;
pub mod humantime_serde;
mod layers;
mod response;
mod tls;
mod transport;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, TlsRootConfig, TransportSecurity};
pub use error::{HttpError, InvalidUriKind};
pub use layers::{UserAgentLayer, UserAgentService};
pub use response::{ERROR_BODY_PREVIEW_LIMIT, HttpResponse};
pub use transport::HttpTransport;
