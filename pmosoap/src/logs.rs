// logs.rs
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::LogConfig;

/// Installe le subscriber global : filtre de niveau puis, si demandé, sortie
/// console.
///
/// Sans effet si un subscriber est déjà installé.
pub fn init_logging(config: &LogConfig) {
    let log_level = match string_to_level(&config.min_level) {
        Some(lev) => level_to_levelfilter(lev),
        None => LevelFilter::TRACE,
    };

    let subscriber = Registry::default().with(log_level);

    let result = if config.enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .try_init()
    } else {
        subscriber.try_init()
    };

    if let Err(e) = result {
        eprintln!("❌ Failed to install log subscriber: {}", e);
    }
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.to_ascii_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" | "WARNING" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}

fn level_to_levelfilter(level: Level) -> LevelFilter {
    match level {
        Level::ERROR => LevelFilter::ERROR,
        Level::WARN => LevelFilter::WARN,
        Level::INFO => LevelFilter::INFO,
        Level::DEBUG => LevelFilter::DEBUG,
        Level::TRACE => LevelFilter::TRACE,
    }
}
