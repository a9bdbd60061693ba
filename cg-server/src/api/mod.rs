//! HTTP API handlers for cardgraph

pub mod actor;
pub mod ebay;
pub mod health;
pub mod lifecycle;
pub mod paypal;
pub mod records;
pub mod reference;
pub mod scheduler;
pub mod sessions;
pub mod settings;

pub use ebay::ebay_routes;
pub use health::health_routes;
pub use lifecycle::lifecycle_routes;
pub use paypal::paypal_routes;
pub use records::record_routes;
pub use reference::reference_routes;
pub use scheduler::scheduler_routes;
pub use sessions::session_routes;
pub use settings::settings_routes;
