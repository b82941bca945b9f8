//! Session management for conversation history
//!
//! Sessions live in memory only and are lost on restart.

pub mod manager;
pub mod store;

pub use manager::{SessionHandle, SessionStore};
pub use store::{Role, Session, Turn};
