//! [`GrafanaClient`]: the handle every API operation hangs off.
//!
//! The client owns no state beyond the shared transport, so it is cheap to
//! clone and safe to use from concurrent tasks.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::TransportConfig;
use crate::error::{ApiError, ConfigError};
use crate::transport::{HttpTransport, Method, Transport};

#[derive(Clone)]
pub struct GrafanaClient {
    transport: Arc<dyn Transport>,
}

impl GrafanaClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Build a client backed by [`HttpTransport`].
    pub fn from_config(config: &TransportConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    /// Issue a call and return the raw response body.
    pub(crate) async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ApiError> {
        self.transport.execute(method, path, None, body).await
    }

    /// `GET` a JSON document.
    pub(crate) async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let bytes = self.call(Method::Get, path, None).await?;
        serde_json::from_slice(&bytes).map_err(ApiError::Decode)
    }

    /// Send `body` as JSON and decode the JSON reply.
    pub(crate) async fn send_json<B, R>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let bytes = self.call(method, path, Some(encode_body(body)?)).await?;
        serde_json::from_slice(&bytes).map_err(ApiError::Decode)
    }
}

pub(crate) fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(body).map_err(ApiError::Encode)
}
