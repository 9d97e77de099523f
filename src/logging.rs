use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub fn init_logging(default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| anyhow::anyhow!("failed to set tracing subscriber: {err}"))?;
    Ok(())
}
