//! Authentication module for managing the user's session.
//!
//! This module provides:
//! - `Session`: in-memory identity, credential pair and flags
//! - `SessionSnapshot`: the durable projection written after every change
//! - `SessionManager`: login, register, logout, refresh and profile updates

pub mod manager;
pub mod session;

pub use manager::{SessionManager, DEFAULT_LOGOUT_TIMEOUT_SECS};
pub use session::{Session, SessionSnapshot, SessionState, SNAPSHOT_VERSION};
