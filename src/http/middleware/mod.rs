pub mod auth;

pub use auth::{authenticate_user, verify_service_key};
