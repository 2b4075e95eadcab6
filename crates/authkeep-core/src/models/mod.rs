//! Data models for the authenticated user and the identity service wire format.

pub mod identity;
pub mod requests;

pub use identity::{Identity, IdentityPatch, KycStatus};
pub use requests::{AuthResponse, Credentials, LoginRequest, RefreshResponse, RegisterRequest};
