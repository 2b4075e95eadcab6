//! Core library for authkeep.
//!
//! Client-side lifecycle of an authenticated session: login, register,
//! refresh and logout against a remote identity service, with the session
//! persisted between runs and the current access credential attached to
//! every outgoing request made through the shared [`api::Transport`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiError, BearerAuth, HttpIdentityClient, IdentityClient, Transport};
pub use auth::{Session, SessionManager, SessionSnapshot, SessionState};
pub use config::{Config, StorageBackend};
pub use models::{Identity, IdentityPatch, RegisterRequest};
pub use storage::{SnapshotStore, SNAPSHOT_KEY};
