#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Qualitative review of a graded submission by an external service.

/// HTTP client and the [`Reviewer`] seam.
pub mod client;
/// Request and response bodies.
pub mod wire;

pub use self::{
    client::{ReviewClient, Reviewer, digest},
    wire::{AiReview, ReviewRequest, ReviewResponse},
};
