use notify_worker::{amqp, context, WorkerConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    info!("starting notify-worker");

    let config = WorkerConfig::from_env()?;
    let dispatcher = context::build_dispatcher(&config).await?;

    loop {
        let connection = amqp::connect_with_retry(&config.amqp.url).await;

        if let Err(e) = amqp::run(&connection, &config.amqp, dispatcher.clone()).await {
            error!(error = %e, "consumer loop exited, reconnecting");
        }

        let _ = connection.close(0, "reconnecting").await;
    }
}
