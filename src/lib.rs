//! `TripPlan` - travel plan aggregation service
//!
//! Routing, weather and ticket providers are queried concurrently and fused
//! into HTML and Markdown itineraries. Dish lookups and article crawls run
//! through a bounded worker pool.

pub mod aggregator;
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod housekeeping;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod providers;
pub mod render;
pub mod store;
pub mod web;
pub mod worker_pool;

// Re-export core types for public API
pub use aggregator::PlanAggregator;
pub use api::AppState;
pub use config::TripPlanConfig;
pub use error::PlannerError;
pub use lifecycle::{GeneratedPlan, PlanLifecycle, PlanRequest};
pub use models::{PlanQuery, PlanRecord, TravelPlan};
pub use store::{FjallPlanStore, InMemoryPlanStore, PlanStore};
pub use worker_pool::WorkerPool;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
