//! HTTP API handlers for ssb-api

pub mod bill;
pub mod estimator;
pub mod events;
pub mod goals;
pub mod health;

pub use bill::bill_routes;
pub use estimator::estimator_routes;
pub use events::event_stream;
pub use goals::goal_routes;
pub use health::health_routes;
