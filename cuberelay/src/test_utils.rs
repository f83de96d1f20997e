//! Shared fixtures for unit and HTTP tests.

use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use bytes::Bytes;
use std::convert::Infallible;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{Config, UploadConfig};
use crate::types::Face;
use crate::uploads::{FaceCollector, FaceSet};
use crate::{AppState, build_router};

/// Smallest plausible PNG header plus a few bytes of IHDR.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00, 0x00, 0x00, 0x03,
];
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x00];
pub const GIF_BYTES: &[u8] = b"GIF89a\x03\x00\x03\x00\x80\x00\x00";
pub const WEBP_BYTES: &[u8] = b"RIFF\x1a\x00\x00\x00WEBPVP8 \x0e\x00\x00\x00";

/// A body the mock solver returns for every successful request.
pub const SOLVE_BODY: &str = r#"{"status":"ok","steps":[{"move":"R","description":"Turn right face clockwise","reason":"Setting up white cross","targetPieces":["white edge","red-white edge"]},{"move":"U'","reason":"Align edge","targetPieces":["red-white edge"]}]}"#;

/// Six PNG faces named `<face>.png`, validated through the normal collector.
pub async fn face_set(config: &UploadConfig) -> FaceSet {
    let mut collector = FaceCollector::new(config);
    for face in Face::ALL {
        let chunks = futures::stream::iter(vec![Ok::<_, Infallible>(Bytes::from_static(PNG_BYTES))]);
        collector
            .ingest(face, Some(format!("{face}.png")), Some("image/png".to_string()), chunks)
            .await
            .expect("fixture face is valid");
    }
    collector.finish().expect("fixture face set is complete")
}

pub fn png_part(face: Face) -> Part {
    Part::bytes(PNG_BYTES.to_vec()).file_name(format!("{face}.png")).mime_type("image/png")
}

/// A multipart form with every face except those in `omit`.
pub fn face_form_without(omit: &[Face]) -> MultipartForm {
    Face::ALL
        .into_iter()
        .filter(|face| !omit.contains(face))
        .fold(MultipartForm::new(), |form, face| form.add_part(face.code(), png_part(face)))
}

pub fn six_face_form() -> MultipartForm {
    face_form_without(&[])
}

/// Start a mock solving backend that answers every POST with `body`.
pub async fn mock_backend(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analyze-cube"))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body.to_string(), "application/json"))
        .mount(&server)
        .await;
    server
}

/// Configuration pointing at `backend`, with metrics off so tests can build many routers.
pub fn test_config(backend: &MockServer) -> Config {
    let mut config = Config::default();
    config.enable_metrics = false;
    config.backend.url = Url::parse(&format!("{}/api/analyze-cube", backend.uri())).expect("mock server URI is valid");
    config.backend.timeout = Duration::from_secs(5);
    config
}

pub fn create_test_server(config: Config) -> TestServer {
    let state = AppState::from_config(config).expect("Failed to build app state");
    let router = build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}
