//! Typed client for Grafana's data source and query HTTP API.
//!
//! All calls go through a [`Transport`]; [`GrafanaClient::from_config`]
//! wires up the reqwest-backed [`HttpTransport`]. Custom data source headers
//! are encoded into the `jsonData`/`secureJsonData` maps by [`headers`].

pub mod client;
pub mod config;
pub mod datasource;
pub mod error;
pub mod headers;
pub mod query;
pub mod transport;

pub use client::GrafanaClient;
pub use config::{Auth, TransportConfig};
pub use datasource::{Access, DataSource, DataSourceId, JsonData, SecureJsonData, SecureJsonFields};
pub use error::{ApiError, ConfigError, HeaderDecodeError};
pub use headers::{DecodedHeaders, SecretPresence};
pub use query::{QueryRequest, QueryResponse, QueryResults, QueryTarget, SubQuery, TimeRange};
pub use transport::{FakeTransport, HttpTransport, Method, Transport};
