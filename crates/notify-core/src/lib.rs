/// Notify Core - Shared library for the notification worker
///
/// This crate contains the domain types, error taxonomy, and I/O
/// capability traits (idempotency store, template renderer, email
/// gateway) used by the broker-facing `notify-worker` binary.
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gateway;
pub mod renderer;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use error::ProcessingError;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
