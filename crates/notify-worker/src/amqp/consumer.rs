/// Broker consumer (C6): per-delivery state machine.
///
/// `EventDispatcher::process`'s result drives the ack/retry/dead-letter
/// decision: success acks; a terminal error republishes to the DLQ then
/// acks; a transient error republishes to the retry exchange (or, past
/// the retry ceiling, to the DLQ) then acks. If the republish itself
/// fails the delivery is left un-acked so the broker redelivers the
/// original body — the same "do not ack, rely on broker redelivery"
/// fallback the original consumer's bare exception handler falls
/// through to.
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel};
use notify_core::dispatcher::EventDispatcher;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::topology::Topology;
use crate::config::AmqpConfig;

fn retry_count(headers: Option<&FieldTable>) -> u32 {
    let Some(headers) = headers else {
        return 0;
    };
    let Some(AMQPValue::FieldArray(deaths)) = headers.inner().get("x-death") else {
        return 0;
    };
    let Some(AMQPValue::FieldTable(first)) = deaths.as_slice().first() else {
        return 0;
    };
    match first.inner().get("count") {
        Some(AMQPValue::LongLongInt(n)) => *n as u32,
        Some(AMQPValue::LongInt(n)) => *n as u32,
        _ => 0,
    }
}

fn republish_properties(original: &BasicProperties) -> BasicProperties {
    let mut props = BasicProperties::default()
        .with_delivery_mode(original.delivery_mode().unwrap_or(2));
    if let Some(ct) = original.content_type() {
        props = props.with_content_type(ct.clone());
    }
    if let Some(cid) = original.correlation_id() {
        props = props.with_correlation_id(cid.clone());
    }
    if let Some(headers) = original.headers() {
        props = props.with_headers(headers.clone());
    }
    props
}

async fn republish(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    body: &[u8],
    properties: BasicProperties,
) -> Result<()> {
    channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            body,
            properties,
        )
        .await
        .context("publishing republished message")?
        .await
        .context("awaiting republish confirmation")?;
    Ok(())
}

/// Drives one lapin `Consumer` stream to completion, processing each
/// delivery through the dispatcher and resolving it per the state
/// machine above. Returns when the stream ends (connection dropped).
pub async fn run(
    channel: Channel,
    topology: &Topology,
    config: &AmqpConfig,
    dispatcher: Arc<EventDispatcher>,
) -> Result<()> {
    channel
        .basic_qos(config.prefetch_count, BasicQosOptions::default())
        .await
        .context("setting prefetch")?;

    let mut consumer = channel
        .basic_consume(
            &topology.main_queue,
            "notify-worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .context("starting consumer")?;

    info!(queue = %topology.main_queue, "consumer ready, awaiting deliveries");

    while let Some(delivery_result) = consumer.next().await {
        let delivery = match delivery_result {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, "error receiving delivery");
                continue;
            }
        };

        let correlation_id = delivery
            .properties
            .correlation_id()
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let attempts = retry_count(delivery.properties.headers().as_ref());
        let result = dispatcher.process(&delivery.data, &correlation_id).await;

        match result {
            Ok(_) => {
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    error!(error = %e, "failed to ack delivery");
                }
            }
            Err(err) if err.is_terminal() => {
                warn!(
                    correlation_id = %correlation_id,
                    error = %err,
                    "terminal error, routing to dead-letter exchange"
                );
                let props = republish_properties(&delivery.properties);
                match republish(
                    &channel,
                    &topology.dlq_exchange,
                    &topology.routing_key,
                    &delivery.data,
                    props,
                )
                .await
                {
                    Ok(()) => {
                        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                            error!(error = %e, "failed to ack after dead-lettering");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "failed to republish to dlq, leaving delivery un-acked");
                    }
                }
            }
            Err(err) => {
                let (target_exchange, reason) = if attempts < config.max_retries {
                    (&topology.retry_exchange, "retry_scheduled")
                } else {
                    (&topology.dlq_exchange, "max_retries_exhausted")
                };

                warn!(
                    correlation_id = %correlation_id,
                    error = %err,
                    attempts = attempts,
                    max_retries = config.max_retries,
                    reason = reason,
                    "transient error"
                );

                let props = republish_properties(&delivery.properties);
                match republish(
                    &channel,
                    target_exchange,
                    &topology.routing_key,
                    &delivery.data,
                    props,
                )
                .await
                {
                    Ok(()) => {
                        if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                            error!(error = %e, "failed to ack after republish");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "failed to republish, leaving delivery un-acked");
                    }
                }
            }
        }
    }

    Ok(())
}
