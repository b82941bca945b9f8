//! Inference server integrations for chat-relay
//!
//! This crate provides the backend abstraction the relay forwards to and an
//! implementation for Ollama-compatible servers.

pub mod base;
pub mod ollama;

pub use base::{
    ChatOptions, InferenceBackend, InferenceRequest, Message, ProviderError, ProviderResult,
};
pub use ollama::OllamaClient;
