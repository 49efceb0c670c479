//! Logger initialization.

use std::env;
use std::io::Write;

use env_logger::{Builder, DEFAULT_FILTER_ENV};
use log::LevelFilter;

// Chatty HTTP client internals, capped at `info` unless RUST_LOG says otherwise
const HTTP_MODULES: &[&str] = &["reqwest", "hyper", "hyper_util", "rustls"];

/// Initializes `env_logger` on stderr.
///
/// `level` is the global filter. Per-module directives come from `RUST_LOG`
/// when it is set (`RUST_LOG=reqwest=trace`); otherwise HTTP client internals
/// are capped at `info`.
pub fn init_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let directives = env::var(DEFAULT_FILTER_ENV).ok();
    builder(level, directives.as_deref()).try_init()
}

fn builder(level: LevelFilter, directives: Option<&str>) -> Builder {
    let mut builder = Builder::new();

    match directives {
        Some(directives) => {
            builder.parse_filters(directives);
        }
        None => {
            for module in HTTP_MODULES {
                builder.filter_module(module, LevelFilter::Info.min(level));
            }
        }
    }
    builder.filter_level(level);

    builder.format(|buf, record| {
        writeln!(
            buf,
            "geotrace: {} [{}] {}",
            record.level().as_str().to_lowercase(),
            record.target(),
            record.args()
        )
    });

    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log, Metadata};

    fn enabled(logger: &env_logger::Logger, target: &str, level: Level) -> bool {
        logger.enabled(&Metadata::builder().target(target).level(level).build())
    }

    #[test]
    fn http_modules_capped_by_default() {
        let logger = builder(LevelFilter::Trace, None).build();
        assert!(enabled(&logger, "geotrace::rdap", Level::Trace));
        assert!(enabled(&logger, "reqwest::connect", Level::Info));
        assert!(!enabled(&logger, "reqwest::connect", Level::Debug));
        assert!(!enabled(&logger, "hyper_util::client", Level::Debug));
    }

    #[test]
    fn cap_never_raises_the_level() {
        let logger = builder(LevelFilter::Warn, None).build();
        assert!(!enabled(&logger, "reqwest", Level::Info));
        assert!(enabled(&logger, "geotrace", Level::Warn));
        assert!(!enabled(&logger, "geotrace", Level::Info));
    }

    #[test]
    fn rust_log_directives_are_kept() {
        let logger = builder(LevelFilter::Warn, Some("reqwest=trace,geotrace::rdap=debug")).build();
        assert!(enabled(&logger, "reqwest::connect", Level::Trace));
        assert!(enabled(&logger, "geotrace::rdap", Level::Debug));
        assert!(!enabled(&logger, "geotrace::pipeline", Level::Info));
    }

    #[test]
    fn level_overrides_rust_log_global() {
        let logger = builder(LevelFilter::Error, Some("debug")).build();
        assert!(!enabled(&logger, "geotrace", Level::Warn));
        assert!(enabled(&logger, "geotrace", Level::Error));
    }

    #[test]
    fn second_init_is_an_error_not_a_panic() {
        let _ = init_logger(LevelFilter::Debug);
        assert!(init_logger(LevelFilter::Warn).is_err());
    }
}
