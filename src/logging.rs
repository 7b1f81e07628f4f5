use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_DIRECTIVE: &str = "nutribridge=info";

/// Install a console subscriber filtered by `RUST_LOG`, or by
/// [`DEFAULT_DIRECTIVE`] when it is unset or invalid.
///
/// Fails if a global subscriber is already installed.
pub fn init() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(env_filter))
        .try_init()?;

    tracing::debug!("logging initialized");
    Ok(())
}
