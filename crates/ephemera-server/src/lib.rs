//! HTTP server for Ephemera.
//!
//! Exposes an [`ephemera_store::EphemeralStore`] over HTTP: upload a payload,
//! download it by id until its retention window closes, or evict it early.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::EphemeraServer;
pub use state::AppState;
