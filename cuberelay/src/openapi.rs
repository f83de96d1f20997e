//! OpenAPI documentation for the relay, served at `/api-docs/openapi.json` and browsable at `/docs`.

use utoipa::OpenApi;

use crate::api::handlers;
use crate::api::models::solve::{ErrorResponse, SolveResponse, SolveStep};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cube Relay API",
        description = "Validates six Rubik's cube face photos and forwards them to the solving backend."
    ),
    paths(handlers::analyze::analyze_cube, handlers::health::healthz),
    components(schemas(SolveResponse, SolveStep, ErrorResponse)),
    tags(
        (name = "solve", description = "Face upload and solution relay"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;
