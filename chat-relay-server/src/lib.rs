//! HTTP relay between chat clients and an Ollama-compatible inference server

pub mod handlers;
pub mod relay;
pub mod server;
pub mod state;

pub use relay::{ChatRelay, ChatReply, HealthStatus, RelayError, RelaySettings};
pub use server::{router, run_server};
pub use state::AppState;
