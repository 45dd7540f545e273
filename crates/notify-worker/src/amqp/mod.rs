pub mod consumer;
pub mod topology;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use lapin::{Connection, ConnectionProperties};
use notify_core::dispatcher::EventDispatcher;
use tracing::{error, info};

use crate::config::AmqpConfig;

/// Connects to the broker, retrying on a fixed interval until it
/// succeeds, matching the original consumer's `connect()` loop.
pub async fn connect_with_retry(amqp_url: &str) -> Connection {
    loop {
        let options = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        match Connection::connect(amqp_url, options).await {
            Ok(conn) => {
                info!("connected to broker");
                return conn;
            }
            Err(e) => {
                error!(error = %e, retry_in_seconds = 5, "failed to connect to broker, retrying");
                tokio::time::sleep(Duration::from_secs(
                    notify_core::constants::AMQP_CONNECT_RETRY_SECONDS,
                ))
                .await;
            }
        }
    }
}

/// Declares topology and drives the consume loop until the connection
/// drops, at which point the caller is expected to reconnect.
pub async fn run(
    connection: &Connection,
    config: &AmqpConfig,
    dispatcher: Arc<EventDispatcher>,
) -> Result<()> {
    let channel = connection.create_channel().await?;
    let topology = topology::declare(&channel, config).await?;
    consumer::run(channel, &topology, config, dispatcher).await
}
