/// Broker topology declaration (C6)
///
/// Declares the `main`/`retry`/`dlq` direct exchanges and their bound,
/// durable queues. The retry queue's `x-message-ttl` +
/// `x-dead-letter-exchange` + `x-dead-letter-routing-key` arguments give
/// delayed redelivery back onto the main exchange without any
/// in-process timer. Declarations are naturally idempotent against a
/// compatible pre-existing topology, as AMQP guarantees.
use anyhow::{Context, Result};
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};

use crate::config::AmqpConfig;

pub struct Topology {
    pub main_exchange: String,
    pub retry_exchange: String,
    pub dlq_exchange: String,
    pub main_queue: String,
    pub routing_key: String,
}

pub async fn declare(channel: &Channel, config: &AmqpConfig) -> Result<Topology> {
    channel
        .exchange_declare(
            &config.exchange_retry,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("declaring retry exchange")?;

    let mut retry_args = FieldTable::default();
    retry_args.insert("x-message-ttl".into(), (config.retry_delay_ms as i64).into());
    retry_args.insert(
        "x-dead-letter-exchange".into(),
        config.exchange_main.clone().into(),
    );
    retry_args.insert(
        "x-dead-letter-routing-key".into(),
        config.routing_key.clone().into(),
    );

    channel
        .queue_declare(
            &config.queue_retry,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            retry_args,
        )
        .await
        .context("declaring retry queue")?;

    channel
        .queue_bind(
            &config.queue_retry,
            &config.exchange_retry,
            &config.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("binding retry queue")?;

    channel
        .exchange_declare(
            &config.exchange_dlq,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("declaring dlq exchange")?;

    channel
        .queue_declare(
            &config.queue_dlq,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("declaring dlq queue")?;

    channel
        .queue_bind(
            &config.queue_dlq,
            &config.exchange_dlq,
            &config.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("binding dlq queue")?;

    channel
        .exchange_declare(
            &config.exchange_main,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("declaring main exchange")?;

    channel
        .queue_declare(
            &config.queue_main,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .context("declaring main queue")?;

    channel
        .queue_bind(
            &config.queue_main,
            &config.exchange_main,
            &config.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("binding main queue")?;

    tracing::debug!(
        main = %config.exchange_main,
        retry = %config.exchange_retry,
        dlq = %config.exchange_dlq,
        "broker topology declared"
    );

    Ok(Topology {
        main_exchange: config.exchange_main.clone(),
        retry_exchange: config.exchange_retry.clone(),
        dlq_exchange: config.exchange_dlq.clone(),
        main_queue: config.queue_main.clone(),
        routing_key: config.routing_key.clone(),
    })
}
