pub mod auth;
pub mod health_check;
pub mod user;

pub use health_check::health_check;
