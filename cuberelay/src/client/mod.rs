//! Client half of the upload flow.
//!
//! [`UploadForm`] keeps the state behind the upload page: which face photos are selected, whether
//! a submission is in flight, the last error, and the returned steps with a cursor for
//! step-by-step navigation. [`RelayClient`] sends a prepared [`Submission`] to the relay.
//!
//! ```no_run
//! use cuberelay::client::{RelayClient, SelectedFace, UploadForm};
//! use cuberelay::Face;
//!
//! # async fn run(photos: Vec<(Face, Vec<u8>)>) -> Result<(), Box<dyn std::error::Error>> {
//! let client = RelayClient::new(&"http://localhost:3000".parse()?)?;
//! let mut form = UploadForm::default();
//! for (face, bytes) in photos {
//!     form.select_face(face, SelectedFace::new(format!("{face}.jpg"), "image/jpeg", bytes));
//! }
//!
//! form.submit(&client).await?;
//! while let Some(step) = form.current_step() {
//!     println!("{}: {}", step.mv, step.reason);
//!     if !form.has_next() {
//!         break;
//!     }
//!     form.next_step();
//! }
//! # Ok(())
//! # }
//! ```

mod form;
mod http;

pub use form::{FormError, OutboundFace, SelectedFace, Submission, UploadForm};
pub use http::RelayClient;
