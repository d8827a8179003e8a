//! HTTP server for the explanation pipeline.
//!
//! # Endpoints
//!
//! - `GET  /health` : Liveness probe
//! - `POST /explain`: Explain one move

pub mod routes;

pub use routes::{app_router, AppState, ExplainBody};
