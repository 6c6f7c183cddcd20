use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter (e.g. `FASTDEC_LOG=fastdec=debug`).
pub const LOG_ENV_VAR: &str = "FASTDEC_LOG";

/// Initialize structured JSON logging on stderr at `error` level.
pub fn init() {
    init_with_default(LevelFilter::ERROR);
}

/// Initialize structured JSON logging on stderr.
///
/// `default_level` applies when `FASTDEC_LOG` is unset or unparsable. Stdout is left to the
/// decode output. Calling this again after a subscriber is installed does nothing.
pub fn init_with_default(default_level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV_VAR)
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(true),
        )
        .try_init();
}

/// Map a `-v` repeat count onto a default level: none → error, 1 → info, 2 → debug, more → trace.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
