//! `tavern-core` — domain primitives shared by every crate.
//!
//! No infrastructure concerns live here: only identifiers and the domain
//! error model.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{JobId, TenantKey};
