//! Forwarding validated faces to the external solving backend.
//!
//! The backend is a black box reached over HTTP: it accepts the same six-part multipart body the
//! relay receives and answers with JSON. [`Solver`] abstracts that call so handlers can be
//! exercised against any implementation; [`HttpSolver`] is the reqwest-backed one used in
//! production. There is exactly one attempt per client request.

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::BackendConfig;
use crate::errors::{Error, Result};
use crate::uploads::FaceSet;

/// Successful backend answer, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverReply {
    pub status: StatusCode,
    /// Raw JSON body exactly as the backend sent it
    pub body: Bytes,
}

/// Anything that can turn six validated faces into a solve response.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Forward the faces once.
    ///
    /// # Errors
    /// - [`Error::BackendTimeout`] when no complete answer arrives in time
    /// - [`Error::BackendError`] for transport failures, non-2xx statuses and non-JSON bodies
    /// - [`Error::Internal`] when the outbound body cannot be assembled
    async fn solve(&self, faces: &FaceSet) -> Result<SolverReply>;
}

/// Production solver using reqwest.
#[derive(Clone, Debug)]
pub struct HttpSolver {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpSolver {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create solver HTTP client: {}", e))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            timeout: config.timeout,
        })
    }

    fn transport_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::BackendTimeout { after: self.timeout }
        } else {
            Error::BackendError {
                status: error.status().map(|s| s.as_u16()),
                message: format!("Failed to reach solving backend: {}", error),
            }
        }
    }
}

#[async_trait]
impl Solver for HttpSolver {
    #[instrument(skip_all, fields(url = %self.url, faces = faces.len(), bytes = faces.total_bytes()))]
    async fn solve(&self, faces: &FaceSet) -> Result<SolverReply> {
        let form = faces.multipart_form().await.map_err(|e| Error::Internal {
            operation: format!("prepare face uploads for the backend: {:#}", e),
        })?;

        debug!("Forwarding faces to solving backend");

        let response = self
            .client
            .post(self.url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        info!(status = status.as_u16(), response_len = body.len(), "Solving backend responded");

        interpret_response(status, body)
    }
}

/// Accept a backend answer only when it is JSON with a success status.
pub fn interpret_response(status: StatusCode, body: Bytes) -> Result<SolverReply> {
    let parsed: Value = serde_json::from_slice(&body).map_err(|_| Error::BackendError {
        status: Some(status.as_u16()),
        message: "Invalid JSON response from backend".to_string(),
    })?;

    if !status.is_success() {
        return Err(Error::BackendError {
            status: Some(status.as_u16()),
            message: backend_message(&parsed),
        });
    }

    Ok(SolverReply { status, body })
}

/// Pull a human readable message out of a backend failure body.
fn backend_message(body: &Value) -> String {
    match body.get("detail") {
        Some(Value::String(detail)) => return detail.clone(),
        Some(Value::Null) | None => {}
        // Validation failures carry a structured detail
        Some(structured) => return structured.to_string(),
    }

    ["details", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| "Backend error".to_string())
}
