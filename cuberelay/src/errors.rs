use crate::api::models::solve::ErrorResponse;
use crate::image_type::ImageKind;
use crate::types::{Face, join_faces};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// One or more of the six face parts were not supplied
    #[error("Missing faces: {}", join_faces(.missing))]
    MissingFaces { missing: Vec<Face> },

    /// A face part's type could not be resolved to a supported image format
    #[error("Invalid file type for face {face}. Got: {}. Supported types: {}", got_label(.got), ImageKind::SUPPORTED_LABEL)]
    InvalidFaceType { face: Face, got: Option<String> },

    /// The same face key appeared more than once
    #[error("Face {face} was uploaded more than once")]
    DuplicateFace { face: Face },

    /// A face part carried no bytes
    #[error("No data for face {face}")]
    EmptyFace { face: Face },

    /// A face part exceeded the configured per-file limit
    #[error("File for face {face} exceeds maximum allowed size of {limit} bytes")]
    FaceTooLarge { face: Face, limit: u64 },

    /// The multipart body itself could not be read
    #[error("{message}")]
    MalformedUpload { message: String },

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// The solving backend did not answer within the configured bound
    #[error("Backend request timed out after {}", humantime::format_duration(*after))]
    BackendTimeout { after: Duration },

    /// The solving backend answered with a failure status or an unusable body
    #[error("{message}")]
    BackendError { status: Option<u16>, message: String },

    /// Generic internal relay failure
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn got_label(got: &Option<String>) -> &str {
    got.as_deref().unwrap_or("unknown")
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MissingFaces { .. }
            | Error::InvalidFaceType { .. }
            | Error::DuplicateFace { .. }
            | Error::EmptyFace { .. }
            | Error::FaceTooLarge { .. }
            | Error::MalformedUpload { .. } => StatusCode::BAD_REQUEST,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::BackendTimeout { .. } | Error::BackendError { .. } | Error::Internal { .. } | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short category shown in the `error` field of the response body.
    pub fn category(&self) -> &'static str {
        match self {
            Error::MissingFaces { .. } => "Missing faces",
            Error::InvalidFaceType { .. } => "Invalid file type",
            Error::DuplicateFace { .. } => "Duplicate face",
            Error::EmptyFace { .. } => "Empty face",
            Error::FaceTooLarge { .. } => "File too large",
            Error::MalformedUpload { .. } => "Malformed upload",
            Error::MethodNotAllowed => "Method not allowed",
            Error::BackendTimeout { .. } => "Backend timeout",
            Error::BackendError { .. } => "Backend error",
            Error::Internal { .. } | Error::Other(_) => "Failed to process request",
        }
    }

    /// Label used for the relay outcome metric.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::MissingFaces { .. } => "missing_faces",
            Error::InvalidFaceType { .. } => "invalid_face_type",
            Error::DuplicateFace { .. } | Error::EmptyFace { .. } | Error::FaceTooLarge { .. } | Error::MalformedUpload { .. } => {
                "bad_upload"
            }
            Error::MethodNotAllowed => "method_not_allowed",
            Error::BackendTimeout { .. } => "backend_timeout",
            Error::BackendError { .. } => "backend_error",
            Error::Internal { .. } | Error::Other(_) => "internal_relay_error",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Internal { .. } | Error::Other(_) => "Internal relay error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn to_response_body(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.category().to_string(),
            details: self.user_message(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal relay error: {:#}", self);
            }
            Error::BackendTimeout { .. } | Error::BackendError { .. } => {
                tracing::warn!("Backend failure: {}", self);
            }
            Error::MissingFaces { .. } | Error::InvalidFaceType { .. } => {
                tracing::info!("Rejected upload: {}", self);
            }
            _ => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), Json(self.to_response_body())).into_response()
    }
}

/// Type alias for relay operation results
pub type Result<T> = std::result::Result<T, Error>;
