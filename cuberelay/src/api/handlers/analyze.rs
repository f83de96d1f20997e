//! The face upload relay endpoint.

use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::AppState;
use crate::api::models::solve::{ErrorResponse, SolveResponse};
use crate::errors::{Error, Result};
use crate::solver::SolverReply;
use crate::uploads::FaceSet;

#[utoipa::path(
    post,
    path = "/api/analyze-cube",
    tag = "solve",
    summary = "Analyze and solve a cube",
    description = "Upload one photo per cube face under the part names U, R, F, D, L and B. \
        The photos are validated and forwarded to the solving backend, whose JSON answer is returned unchanged.",
    request_body(
        content_type = "multipart/form-data",
        description = "Six image parts named U, R, F, D, L, B (JPEG, PNG, GIF or WebP)"
    ),
    responses(
        (status = 200, description = "Backend solution, relayed verbatim", body = SolveResponse),
        (status = 400, description = "Missing faces, unsupported image type or malformed upload", body = ErrorResponse),
        (status = 405, description = "Method not allowed", body = ErrorResponse),
        (status = 500, description = "Backend timeout, backend failure or internal relay error", body = ErrorResponse),
    )
)]
#[instrument(skip_all, fields(relay_id = %Uuid::new_v4()))]
pub async fn analyze_cube(State(state): State<AppState>, multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<Response> {
    let outcome = relay(&state, multipart).await;

    let label = match &outcome {
        Ok(_) => "success",
        Err(e) => e.metric_label(),
    };
    metrics::counter!("cuberelay_relay_requests_total", "outcome" => label).increment(1);

    let reply = outcome?;
    Ok((reply.status, [(header::CONTENT_TYPE, "application/json")], reply.body).into_response())
}

async fn relay(state: &AppState, multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<SolverReply> {
    let mut multipart = multipart.map_err(|rejection| Error::MalformedUpload {
        message: rejection.body_text(),
    })?;

    // Dropped at the end of this function, which removes any spooled files
    let faces = FaceSet::from_multipart(&mut multipart, &state.config.uploads).await?;
    info!(faces = faces.len(), bytes = faces.total_bytes(), spooled = faces.spool_dir().is_some(), "Received all faces");

    state.solver.solve(&faces).await
}

/// Any method other than POST on the relay route.
pub async fn method_not_allowed() -> Error {
    Error::MethodNotAllowed
}
