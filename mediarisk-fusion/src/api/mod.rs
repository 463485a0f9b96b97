//! HTTP API handlers for the fusion service
//!
//! Endpoints accept signals that detectors already produced; the service owns
//! fusion, classification and the decision envelope.

pub mod analysis;
pub mod health;
pub mod liveness;
pub mod weights;

pub use analysis::analysis_routes;
pub use health::health_routes;
pub use liveness::liveness_routes;
pub use weights::weight_routes;
