pub mod auth;
pub mod clock;
pub mod configuration;
pub mod email_client;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod startup;
pub mod store;
pub mod telemetry;
pub mod validators;
