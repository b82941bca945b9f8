//! Core types and utilities for chat-relay
//!
//! This crate provides the configuration layer, logging setup, error type
//! and the in-memory session store shared by the relay server and CLI.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use error::{Error, Result};
