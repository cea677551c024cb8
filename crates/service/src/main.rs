use anyhow::Context;
use clap::Parser;
use tracing::{Instrument, info};

use propagator_infra::config::PropagatorConfig;
use propagator_infra::db::{self, ConnectOptions};
use propagator_infra::dispatch::build_http_client;
use propagator_infra::status_query::PostgresStatusQuery;
use propagator_observability::{LogConfig, service_span};
use propagator_service::app::{self, SERVICE_NAME};
use propagator_service::cli::Cli;
use propagator_service::signal::shutdown_signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = PropagatorConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?
        .apply(cli.overrides())
        .validate()
        .context("invalid configuration")?;

    propagator_observability::init(&LogConfig::default().with_format(config.log_format))?;

    let span = service_span(SERVICE_NAME);
    info!(
        parent: &span,
        version = env!("CARGO_PKG_VERSION"),
        callbacks_uri = %config.callbacks_uri,
        retries = %config.retry_ceiling,
        batch_size = %config.batch_size,
        "starting"
    );

    let pool = db::connect(&config.db_uri, &ConnectOptions::default())
        .instrument(span.clone())
        .await
        .context("failed to connect to database")?;
    let query = PostgresStatusQuery::new(pool);
    let client = build_http_client(config.request_timeout)?;

    let service = app::start(query, &config, client, span.clone()).await?;

    let signal = shutdown_signal().context("failed to install signal handlers")?;
    service.run_until(signal).await?;

    info!(parent: &span, "stopped");
    Ok(())
}
