//! REST client module for the identity service.
//!
//! This module provides:
//! - `Transport`: shared HTTP transport with rate-limit retries
//! - `BearerAuth`: the default `Authorization` value attached to every request
//! - `IdentityClient` / `HttpIdentityClient`: login, register, refresh, logout

pub mod error;
pub mod identity;
pub mod transport;

pub use error::ApiError;
pub use identity::{HttpIdentityClient, IdentityClient};
pub use transport::{BearerAuth, Transport};
