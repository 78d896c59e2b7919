#![forbid(unsafe_code)]

//! Agent Client Protocol adapter.
//!
//! Connects an external conversation engine to a host editor speaking ACP
//! over stdio. Conversations run either in a local engine process
//! ([`session::LocalProvider`]) or in a cloud sandbox
//! ([`session::CloudProvider`]); both sit behind the same protocol handler,
//! [`session::AcpAgent`].

pub mod acp;
pub mod cloud;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod mode;
pub mod session;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
