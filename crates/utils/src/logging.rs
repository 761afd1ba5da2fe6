use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_DIRECTIVES: &str = "info,server=info,services=info,db=info";

/// Install the global tracing subscriber. `RUST_LOG` overrides the default directives.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
