//! Data models for the TripPlan application
//!
//! This module contains the core domain models organized by concern:
//! - Location: Geocoded endpoints used by the routing provider
//! - Route: Transport options, their steps and path polylines
//! - Weather: Daily forecast entries with lifestyle advisories
//! - Ticket, Dish, Article: Enrichment data from the secondary providers
//! - Plan: The aggregated travel plan and its persisted record

pub mod article;
pub mod dish;
pub mod location;
pub mod plan;
pub mod route;
pub mod ticket;
pub mod weather;

// Re-export all public types for convenient access
pub use article::Article;
pub use dish::DishDetail;
pub use location::Location;
pub use plan::{PlanArtifacts, PlanQuery, PlanRecord, TravelPlan};
pub use route::{RouteStep, TransportMode, TravelOption};
pub use ticket::TicketInfo;
pub use weather::WeatherDay;
