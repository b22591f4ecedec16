//! HTTP API Handlers and Routes
//!
//! The REST surface of the run host, built on Axum.
//!
//! # API Endpoints
//!
//! ## Runs (`/api/runs`)
//! - `POST /api/runs/{id}` - Start a run; returns pending clarification questions or the finished report
//! - `POST /api/runs/{id}/clarifications` - Answer one question
//! - `POST /api/runs/{id}/complete` - Proceed with the answers given so far
//! - `POST /api/runs/{id}/direct` - Run without triage or clarifications
//! - `GET /api/runs/{id}` - Run status
//! - `POST /api/runs/{id}/cancel` - Cancel a run
//!
//! ## Other
//! - `GET /api/openapi.json` - OpenAPI document
//! - `GET /health` - Health check endpoint
//!
//! Errors are returned as `{"error": "..."}` with a status code derived from
//! [`AppError`](crate::types::AppError).

/// Request handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;
