//! HTTP API: router, request/response mapping, and the claim middleware.

pub mod app;
pub mod middleware;
