use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

use super::http::RelayClient;
use crate::api::models::solve::{SolveResponse, SolveStep};
use crate::image_type::ImageKind;
use crate::types::{Face, join_faces};

#[derive(ThisError, Debug)]
pub enum FormError {
    #[error("Missing faces: {}", join_faces(.0))]
    MissingFaces(Vec<Face>),

    #[error("File for face {face} is not an image")]
    NotAnImage { face: Face, declared: String },

    #[error("Invalid image type for face {face}. Supported types: {}", ImageKind::SUPPORTED_LABEL)]
    InvalidFaceType { face: Face, declared: String },

    #[error("A submission is already in progress")]
    AlreadyProcessing,

    /// The relay answered with a failure; `message` is its `details` text
    #[error("{message}")]
    Relay { status: u16, message: String },

    #[error("Failed to reach the relay: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from the relay: {0}")]
    InvalidResponse(String),
}

/// A photo picked for one face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFace {
    pub file_name: String,
    /// MIME type as reported by the file picker
    pub content_type: String,
    pub data: Bytes,
    /// `data:` URL for showing the photo before upload
    pub preview: String,
}

impl SelectedFace {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let content_type = content_type.into();
        let data = data.into();
        let preview = format!("data:{};base64,{}", content_type, STANDARD.encode(&data));
        Self {
            file_name: file_name.into(),
            content_type,
            data,
            preview,
        }
    }
}

/// A face as it will be sent, renamed to `<face>_face.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFace {
    pub face: Face,
    pub file_name: String,
    pub content_type: ImageKind,
    pub data: Bytes,
}

/// Snapshot of a validated form, taken when a submission starts.
#[derive(Debug, Clone)]
pub struct Submission {
    pub faces: Vec<OutboundFace>,
}

impl Submission {
    /// Multipart body with one part per face, in canonical order.
    pub fn to_form(&self) -> Result<Form, FormError> {
        let mut form = Form::new();
        for outbound in &self.faces {
            let part = Part::bytes(outbound.data.to_vec())
                .file_name(outbound.file_name.clone())
                .mime_str(outbound.content_type.mime_type())?;
            form = form.part(outbound.face.code(), part);
        }
        Ok(form)
    }
}

/// State of the face upload page.
#[derive(Debug, Default)]
pub struct UploadForm {
    faces: BTreeMap<Face, SelectedFace>,
    processing: bool,
    error: Option<String>,
    steps: Vec<SolveStep>,
    cursor: usize,
}

impl UploadForm {
    /// Pick (or replace) the photo for a face.
    pub fn select_face(&mut self, face: Face, selected: SelectedFace) {
        self.faces.insert(face, selected);
        self.error = None;
    }

    pub fn clear_face(&mut self, face: Face) -> Option<SelectedFace> {
        self.faces.remove(&face)
    }

    pub fn selected(&self, face: Face) -> Option<&SelectedFace> {
        self.faces.get(&face)
    }

    pub fn missing_faces(&self) -> Vec<Face> {
        Face::ALL.into_iter().filter(|f| !self.faces.contains_key(f)).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.faces.len() == Face::ALL.len()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Check the selection without touching any state.
    pub fn validate(&self) -> Result<Submission, FormError> {
        let missing = self.missing_faces();
        if !missing.is_empty() {
            return Err(FormError::MissingFaces(missing));
        }

        let mut faces = Vec::with_capacity(Face::ALL.len());
        for (&face, selected) in &self.faces {
            if !selected.content_type.to_ascii_lowercase().starts_with("image/") {
                return Err(FormError::NotAnImage {
                    face,
                    declared: selected.content_type.clone(),
                });
            }
            let kind = ImageKind::from_mime(&selected.content_type).ok_or_else(|| FormError::InvalidFaceType {
                face,
                declared: selected.content_type.clone(),
            })?;

            faces.push(OutboundFace {
                face,
                file_name: format!("{}_face.{}", face, kind.extension()),
                content_type: kind,
                data: selected.data.clone(),
            });
        }

        Ok(Submission { faces })
    }

    /// Start a submission: fails without side effects if one is already in flight, otherwise
    /// validates (recording any error) and marks the form as processing.
    pub fn begin_submission(&mut self) -> Result<Submission, FormError> {
        if self.processing {
            return Err(FormError::AlreadyProcessing);
        }

        self.error = None;
        match self.validate() {
            Ok(submission) => {
                self.processing = true;
                Ok(submission)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Apply the outcome of a submission started with [`begin_submission`](Self::begin_submission).
    ///
    /// Success replaces the steps and rewinds the cursor; failure only records the error.
    pub fn finish_submission(&mut self, outcome: Result<SolveResponse, FormError>) -> Result<&[SolveStep], FormError> {
        self.processing = false;
        match outcome {
            Ok(solution) => {
                self.steps = solution.steps;
                self.cursor = 0;
                Ok(&self.steps)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Validate, send to the relay, and apply the result.
    pub async fn submit(&mut self, client: &RelayClient) -> Result<&[SolveStep], FormError> {
        let submission = self.begin_submission()?;
        let outcome = client.analyze(&submission).await;
        self.finish_submission(outcome)
    }

    pub fn steps(&self) -> &[SolveStep] {
        &self.steps
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_step(&self) -> Option<&SolveStep> {
        self.steps.get(self.cursor)
    }

    pub fn has_next(&self) -> bool {
        self.cursor + 1 < self.steps.len()
    }

    pub fn has_previous(&self) -> bool {
        self.cursor > 0
    }

    /// Advance one step, stopping at the last one.
    pub fn next_step(&mut self) -> usize {
        if self.has_next() {
            self.cursor += 1;
        }
        self.cursor
    }

    /// Go back one step, stopping at the first one.
    pub fn previous_step(&mut self) -> usize {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{GIF_BYTES, JPEG_BYTES, PNG_BYTES, SOLVE_BODY, WEBP_BYTES};
    use url::Url;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png(face: Face) -> SelectedFace {
        SelectedFace::new(format!("{face}.png"), "image/png", PNG_BYTES)
    }

    fn full_form() -> UploadForm {
        let mut form = UploadForm::default();
        for face in Face::ALL {
            form.select_face(face, png(face));
        }
        form
    }

    fn step(mv: &str) -> SolveStep {
        SolveStep {
            mv: mv.to_string(),
            reason: String::new(),
            description: None,
            target_pieces: vec![],
        }
    }

    fn solution(moves: &[&str]) -> SolveResponse {
        SolveResponse {
            steps: moves.iter().map(|m| step(m)).collect(),
            status: None,
            faces: None,
        }
    }

    fn client_for(server: &MockServer) -> RelayClient {
        RelayClient::new(&Url::parse(&server.uri()).unwrap()).unwrap()
    }

    #[test]
    fn test_preview_is_data_url() {
        let selected = SelectedFace::new("u.gif", "image/gif", GIF_BYTES);
        assert!(selected.preview.starts_with("data:image/gif;base64,R0lGODlh"));
    }

    #[test]
    fn test_selection_replaces_and_clears() {
        let mut form = UploadForm::default();
        assert!(!form.is_complete());
        assert!(form.selected(Face::U).is_none());

        form.select_face(Face::U, png(Face::U));
        form.select_face(Face::U, SelectedFace::new("retake.jpg", "image/jpeg", JPEG_BYTES));
        assert_eq!(form.selected(Face::U).unwrap().file_name, "retake.jpg");
        assert_eq!(form.missing_faces(), vec![Face::R, Face::F, Face::D, Face::L, Face::B]);

        for face in Face::ALL {
            form.select_face(face, png(face));
        }
        assert!(form.is_complete());
        assert_eq!(form.selected(Face::U).unwrap().file_name, "U.png");

        let cleared = form.clear_face(Face::L).unwrap();
        assert_eq!(cleared.data.as_ref(), PNG_BYTES);
        assert!(!form.is_complete());
        assert!(form.selected(Face::L).is_none());
    }

    #[test]
    fn test_selecting_a_face_clears_previous_error() {
        let mut form = UploadForm::default();
        assert!(form.begin_submission().is_err());
        assert!(form.error().is_some());

        form.select_face(Face::F, png(Face::F));
        assert_eq!(form.error(), None);
    }

    #[test]
    fn test_missing_face_aborts_with_face_named() {
        let mut form = full_form();
        form.clear_face(Face::B);

        let err = form.begin_submission().unwrap_err();
        assert!(matches!(err, FormError::MissingFaces(ref missing) if missing == &vec![Face::B]));
        assert_eq!(err.to_string(), "Missing faces: B");
        assert_eq!(form.error(), Some("Missing faces: B"));
        assert!(!form.is_processing());
    }

    #[test]
    fn test_unsupported_types_rejected() {
        let mut form = full_form();
        form.select_face(Face::R, SelectedFace::new("r.bmp", "image/bmp", PNG_BYTES));
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid image type for face R. Supported types: JPG, PNG, GIF, WebP");

        form.select_face(Face::R, SelectedFace::new("r.txt", "text/plain", b"hi".to_vec()));
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), "File for face R is not an image");
    }

    #[test]
    fn test_outbound_files_are_renamed() {
        let mut form = full_form();
        form.select_face(Face::U, SelectedFace::new("IMG_0001.JPEG", "image/jpeg", JPEG_BYTES));
        form.select_face(Face::B, SelectedFace::new("back", "image/webp", WEBP_BYTES));

        let submission = form.validate().unwrap();
        let names: Vec<&str> = submission.faces.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["U_face.jpg", "R_face.png", "F_face.png", "D_face.png", "L_face.png", "B_face.webp"]);
    }

    #[test]
    fn test_second_submission_suppressed_while_processing() {
        let mut form = full_form();
        form.begin_submission().unwrap();
        assert!(form.is_processing());

        assert!(matches!(form.begin_submission(), Err(FormError::AlreadyProcessing)));
        assert!(form.is_processing());
        assert_eq!(form.error(), None);

        form.finish_submission(Ok(solution(&["R"]))).unwrap();
        assert!(!form.is_processing());
        assert!(form.begin_submission().is_ok());
    }

    #[test]
    fn test_failure_keeps_previous_steps() {
        let mut form = full_form();
        form.begin_submission().unwrap();
        form.finish_submission(Ok(solution(&["R", "U", "F"]))).unwrap();
        form.next_step();
        form.next_step();

        form.begin_submission().unwrap();
        let err = form
            .finish_submission(Err(FormError::Relay {
                status: 500,
                message: "Backend request timed out after 30s".to_string(),
            }))
            .unwrap_err();

        assert_eq!(err.to_string(), "Backend request timed out after 30s");
        assert_eq!(form.error(), Some("Backend request timed out after 30s"));
        assert_eq!(form.steps().len(), 3);
        assert_eq!(form.cursor(), 2);
    }

    #[test]
    fn test_success_replaces_steps_and_resets_cursor() {
        let mut form = full_form();
        form.begin_submission().unwrap();
        form.finish_submission(Ok(solution(&["R", "U", "F"]))).unwrap();
        form.next_step();
        assert_eq!(form.cursor(), 1);

        form.begin_submission().unwrap();
        form.finish_submission(Ok(solution(&["L", "D"]))).unwrap();
        assert_eq!(form.cursor(), 0);
        assert_eq!(form.current_step().unwrap().mv, "L");
    }

    #[test]
    fn test_cursor_is_clamped() {
        let mut form = full_form();
        assert_eq!(form.previous_step(), 0);
        assert_eq!(form.next_step(), 0);
        assert!(form.current_step().is_none());

        form.begin_submission().unwrap();
        form.finish_submission(Ok(solution(&["R", "U", "F", "D"]))).unwrap();

        for _ in 0..5 {
            form.previous_step();
        }
        assert_eq!(form.cursor(), 0);
        assert!(!form.has_previous());

        // A fixed but irregular sequence of presses never escapes [0, len - 1]
        let presses = "nnpnnnnnppnpnnnnnpppppppn";
        for press in presses.chars() {
            match press {
                'n' => form.next_step(),
                _ => form.previous_step(),
            };
            assert!(form.cursor() < form.steps().len());
        }

        for _ in 0..10 {
            form.next_step();
        }
        assert_eq!(form.cursor(), 3);
        assert!(!form.has_next());
        assert_eq!(form.current_step().unwrap().mv, "D");
    }

    #[tokio::test]
    async fn test_submit_omitting_face_makes_no_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(SOLVE_BODY, "application/json"))
            .expect(0)
            .mount(&server)
            .await;

        let mut form = full_form();
        form.clear_face(Face::B);

        let err = form.submit(&client_for(&server)).await.unwrap_err();
        assert!(err.to_string().contains('B'));
    }

    #[tokio::test]
    async fn test_submit_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(SOLVE_BODY, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let mut form = full_form();
        let steps = form.submit(&client_for(&server)).await.unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].target_pieces, vec!["white edge", "red-white edge"]);
        assert_eq!(form.cursor(), 0);
        assert!(!form.is_processing());
    }

    #[tokio::test]
    async fn test_submit_surfaces_relay_details() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_raw(
                r#"{"error":"Invalid file type","details":"Invalid file type for face F. Got: unknown. Supported types: JPG, PNG, GIF, WebP"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let mut form = full_form();
        let err = form.submit(&client_for(&server)).await.unwrap_err();

        assert!(matches!(err, FormError::Relay { status: 400, .. }));
        assert_eq!(
            form.error(),
            Some("Invalid file type for face F. Got: unknown. Supported types: JPG, PNG, GIF, WebP")
        );
        assert!(form.steps().is_empty());
    }
}
