//! Axum HTTP API for the reel pipeline.
//!
//! Every stage is one POST endpoint; the server keeps no pipeline state of
//! its own beyond the data directory.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, IndexConnector, PineconeConnector};
