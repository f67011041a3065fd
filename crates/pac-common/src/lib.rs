//! Platform Access Control Common - shared types for the admin control plane
//!
//! This crate provides the error taxonomy shared by every component of the
//! access control core:
//! - Validation failures (bad CIDR, unknown permission codes)
//! - Break-glass guardrail rejections
//! - Lookup failures
//!
//! All errors are terminal decisions surfaced to the caller; nothing here is
//! retried internally.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

pub use error::{AccessError, AccessResult};
