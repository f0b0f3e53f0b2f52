//! Infrastructure layer: counter stores, admission control, background jobs,
//! and configuration.

pub mod admission;
pub mod config;
pub mod jobs;
