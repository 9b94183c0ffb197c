use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Targets that follow `--log-level`. Matching is by prefix, so this also
/// covers `rmserial_link`, `rmserial_frame` and `rmserial_transport`.
const OWN_TARGET: &str = "rmserial";

/// Dependencies never log below this, whatever `--log-level` says.
const DEPENDENCY_CEILING: LevelFilter = LevelFilter::WARN;

/// `level` for the rmserial crates, capped at [`DEPENDENCY_CEILING`] for
/// everything else.
pub fn targets(level: LogLevel) -> Targets {
    let level = level.as_filter();
    Targets::new()
        .with_default(level.min(DEPENDENCY_CEILING))
        .with_target(OWN_TARGET, level)
}

/// Logs go to stderr so stdout stays a clean data stream. Thread names are
/// kept to tell the receive loop (`rmserial-rx`) from the send path.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = targets(level);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);

    let registry = tracing_subscriber::registry();
    let _ = match format {
        LogFormat::Text => registry.with(layer.with_filter(filter)).try_init(),
        LogFormat::Json => registry.with(layer.json().with_filter(filter)).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(LogLevel::Off.as_filter(), LevelFilter::OFF);
        assert_eq!(LogLevel::Warn.as_filter(), LevelFilter::WARN);
        assert_eq!(LogLevel::Trace.as_filter(), LevelFilter::TRACE);
    }

    #[test]
    fn own_crates_follow_level() {
        let filter = targets(LogLevel::Debug);
        assert!(filter.would_enable("rmserial_link::bridge", &Level::DEBUG));
        assert!(filter.would_enable("rmserial::cmd::run", &Level::DEBUG));
        assert!(!filter.would_enable("rmserial_frame::reader", &Level::TRACE));
    }

    #[test]
    fn dependencies_are_capped_at_warn() {
        let filter = targets(LogLevel::Trace);
        assert!(filter.would_enable("ctrlc", &Level::WARN));
        assert!(!filter.would_enable("ctrlc", &Level::INFO));

        let quiet = targets(LogLevel::Error);
        assert!(!quiet.would_enable("ctrlc", &Level::WARN));
        assert!(!targets(LogLevel::Off).would_enable("rmserial_link", &Level::ERROR));
    }
}
