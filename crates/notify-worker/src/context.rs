/// Wires the capability implementations (idempotency store, renderer,
/// email gateway) into an `EventDispatcher`.
use std::sync::Arc;

use anyhow::{Context as _, Result};
use notify_core::dispatcher::EventDispatcher;
use notify_core::gateway::{SmtpConfig, SmtpEmailGateway};
use notify_core::renderer::TeraRenderer;
use notify_core::services::idempotency::RedisIdempotencyStore;

use crate::config::WorkerConfig;

pub async fn build_dispatcher(config: &WorkerConfig) -> Result<Arc<EventDispatcher>> {
    let idempotency = RedisIdempotencyStore::connect(&config.redis_url)
        .await
        .context("connecting to idempotency store")?;

    let renderer = TeraRenderer::new(&config.templates_dir).context("loading templates")?;

    let gateway = SmtpEmailGateway::new(SmtpConfig {
        host: config.smtp_host.clone(),
        port: config.smtp_port,
        login: config.smtp_login.clone(),
        password: config.smtp_password.clone(),
        from_email: config.smtp_from_email.clone(),
        from_name: config.smtp_from_name.clone(),
        use_implicit_tls: config.smtp_use_implicit_tls,
    })
    .context("building SMTP gateway")?;

    Ok(Arc::new(EventDispatcher::new(
        Arc::new(idempotency),
        Arc::new(renderer),
        Arc::new(gateway),
    )))
}
