use tracing_subscriber::EnvFilter;

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Panics if one is already installed.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .init();
}

/// Variant for embedders and tests that may already own a subscriber.
pub fn try_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .try_init();
}
