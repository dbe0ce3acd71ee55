//! HTTP API handlers for apex-intake
//!
//! Thin JSON layer over the detection orchestrator plus SSE progress.

pub mod detection;
pub mod health;
pub mod sse;
pub mod uploads;

pub use detection::detection_routes;
pub use health::health_routes;
pub use sse::event_routes;
pub use uploads::upload_routes;
