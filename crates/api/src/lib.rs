//! HTTP API: server wiring, routing, and content-negotiated responses.

pub mod app;
pub mod context;
pub mod middleware;
