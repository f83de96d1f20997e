//! Wire shapes of the solve exchange.
//!
//! The relay never interprets a successful backend body; these types exist so the
//! upload client can read it and so the OpenAPI document can describe it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// One instruction of a returned solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolveStep {
    /// Move in standard notation, e.g. `R`, `U'`, `F2`
    #[serde(rename = "move")]
    pub mv: String,
    /// Why the move is made
    #[serde(default)]
    pub reason: String,
    /// Optional longer description of the move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Pieces affected by the move
    #[serde(default)]
    pub target_pieces: Vec<String>,
}

/// Successful body returned by the solving backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SolveResponse {
    pub steps: Vec<SolveStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Colours recognised on each face, keyed by face code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faces: Option<BTreeMap<String, Vec<String>>>,
}

/// Body of every relay failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Failure category, e.g. `Missing faces` or `Backend timeout`
    pub error: String,
    /// Human readable explanation
    pub details: String,
}
