use tracing::metadata::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Stdout logging, filter taken from the environment with the given default
pub fn init(default_level: LevelFilter) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_target(true)
        .and_then(env_filter);
    tracing_subscriber::registry().with(stdout_layer).init();
}

#[cfg(test)]
pub fn test_init(default_level: LevelFilter) {
    use std::sync::OnceLock;
    static INITIALIZED: OnceLock<()> = OnceLock::new();

    INITIALIZED.get_or_init(|| {
        init(default_level);
    });
}
