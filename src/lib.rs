// HTTP relay in front of the Cal.com bookings API

pub mod cache;
pub mod calcom;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
mod handlers;
pub mod models;
pub mod router;
pub mod server;
pub mod service;
pub mod validation;

// Re-export key types for convenience
pub use cache::{BookingCache, BookingStatus, CachedBooking, WebhookEvent};
pub use calcom::{CalcomClient, SchedulingApi};
pub use config::{LogFormat, RelayConfig};
pub use credentials::{ApiKey, CredentialTable, EQUIPMENT_TYPES};
pub use envelope::{ErrorEnvelope, Operation};
pub use error::{ConfigError, RelayError, ServerError, WebhookError};
pub use router::build_router;
pub use server::{AppState, RelayServer};
pub use service::BookingRelay;
