//! Client for the Sistema de Control Electoral REST API.

mod cached_client;
mod client;
mod error;
mod types;

pub use cached_client::CachedApiClient;
pub use client::ApiClient;
pub use error::ApiError;
pub use types::{Credentials, RegisterRequest, User};
