use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use super::form::{FormError, Submission};
use crate::api::models::solve::SolveResponse;

/// Path of the relay endpoint, relative to the relay's base URL.
pub const ANALYZE_PATH: &str = "/api/analyze-cube";

/// Slightly longer than the relay's own backend timeout so the relay's timeout error wins.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(35);

/// HTTP client for the relay's analyze endpoint.
#[derive(Clone, Debug)]
pub struct RelayClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl RelayClient {
    /// Client for a relay served at `base_url`.
    pub fn new(base_url: &Url) -> anyhow::Result<Self> {
        let endpoint = base_url
            .join(ANALYZE_PATH)
            .map_err(|e| anyhow::anyhow!("Invalid relay URL {}: {}", base_url, e))?;
        Self::with_endpoint(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_endpoint(endpoint: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create relay HTTP client: {}", e))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Post the six faces and parse the solution.
    ///
    /// Failure bodies are read as `{error, details}`; `details` is preferred as the message.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn analyze(&self, submission: &Submission) -> Result<SolveResponse, FormError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(submission.to_form()?)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Relay responded");

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&body)
                .ok()
                .and_then(|value| {
                    ["details", "error"]
                        .iter()
                        .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
                })
                .unwrap_or_else(|| format!("Failed to analyze cube (HTTP {})", status.as_u16()));

            return Err(FormError::Relay {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| FormError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Face;
    use crate::client::{SelectedFace, UploadForm};
    use crate::test_utils::{PNG_BYTES, SOLVE_BODY};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn submission() -> Submission {
        let mut form = UploadForm::default();
        for face in Face::ALL {
            form.select_face(face, SelectedFace::new(format!("{face}.png"), "image/png", PNG_BYTES));
        }
        form.validate().unwrap()
    }

    async fn client_for(server: &MockServer) -> RelayClient {
        RelayClient::new(&Url::parse(&server.uri()).unwrap()).unwrap()
    }

    #[test]
    fn test_endpoint_replaces_base_path() {
        let client = RelayClient::new(&Url::parse("http://relay.local:3000/app/").unwrap()).unwrap();
        assert_eq!(client.endpoint().as_str(), "http://relay.local:3000/api/analyze-cube");
    }

    #[tokio::test]
    async fn test_posts_renamed_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ANALYZE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_raw(SOLVE_BODY, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let solution = client_for(&server).await.analyze(&submission()).await.unwrap();
        assert_eq!(solution.steps[1].mv, "U'");
        assert_eq!(solution.status.as_deref(), Some("ok"));

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body);
        for face in Face::ALL {
            assert!(body.contains(&format!("name=\"{face}\"; filename=\"{face}_face.png\"")));
        }
    }

    #[tokio::test]
    async fn test_error_without_details_uses_category() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(405).set_body_raw(r#"{"error":"Method not allowed"}"#, "application/json"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.analyze(&submission()).await.unwrap_err();
        assert_eq!(err.to_string(), "Method not allowed");
    }

    #[tokio::test]
    async fn test_error_with_unreadable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.analyze(&submission()).await.unwrap_err();
        assert!(matches!(err, FormError::Relay { status: 502, .. }));
        assert_eq!(err.to_string(), "Failed to analyze cube (HTTP 502)");
    }

    #[tokio::test]
    async fn test_success_with_unexpected_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"solution":"R U"}"#, "application/json"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.analyze(&submission()).await.unwrap_err();
        assert!(matches!(err, FormError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_relay() {
        let server = MockServer::start().await;
        let client = client_for(&server).await;
        drop(server);

        let err = client.analyze(&submission()).await.unwrap_err();
        assert!(matches!(err, FormError::Transport(_)));
    }
}
