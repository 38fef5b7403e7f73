//! Core domain concepts shared across all subdomains.
//!
//! - [`request::CollaborationRequest`] — the immutable input fanned out to providers
//! - [`response::ProviderResponse`] — one successful provider completion
//! - [`error::ErrorKind`] — classification of failed provider calls

pub mod error;
pub mod request;
pub mod response;
