//! Observability surface: health endpoints.
//!
//! The `/metrics` endpoint is served separately by the Prometheus exporter
//! installed in `main`.

pub mod health;

pub use health::{health_router, HealthState};
