use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter, e.g. `debug` or `services=trace`.
pub const LOG_ENV: &str = "COURSE_LOG";

/// Install the global subscriber. Logs go to stderr so command output stays clean.
pub fn init_tracing() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|raw| EnvFilter::try_new(raw).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
