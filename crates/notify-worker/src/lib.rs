/// Notify Worker - broker-driven notification worker binary
///
/// Consumes domain events from the broker, dispatches them through
/// `notify_core::dispatcher::EventDispatcher`, and resolves each
/// delivery by acking, retrying, or dead-lettering per its outcome.
pub mod amqp;
pub mod config;
pub mod context;

pub use config::WorkerConfig;
