//! HTTP surface of the relay.
//!
//! - [`handlers`]: axum handlers for the relay endpoint and health probe
//! - [`models`]: request/response shapes exchanged with browsers and the solving backend

pub mod handlers;
pub mod models;
