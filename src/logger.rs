//! Logging setup for kiln.
//! Installs `env_logger` and maps the `kiln.log_level` setting onto a filter.

use log::LevelFilter;

/// Maps a `kiln.log_level` setting onto a filter, defaulting to `Info`.
pub fn level_from_setting(level: Option<&str>) -> LevelFilter {
    match level.map(str::to_ascii_lowercase).as_deref() {
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        Some("off") => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Installs the logger. With `enabled` unset nothing is ever printed, which
/// keeps rendered output on STDOUT clean; otherwise records pass up to the
/// level later chosen with [`set_level`].
pub fn init_logger(enabled: bool, level: LevelFilter) {
    env_logger::Builder::new()
        .filter_level(if enabled {
            LevelFilter::Trace
        } else {
            LevelFilter::Off
        })
        .init();
    if enabled {
        set_level(level);
    }
}

/// Adjusts the level once the configured `kiln.log_level` is known.
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_setting() {
        assert_eq!(level_from_setting(None), LevelFilter::Info);
        assert_eq!(level_from_setting(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(level_from_setting(Some("warn")), LevelFilter::Warn);
        assert_eq!(level_from_setting(Some("bogus")), LevelFilter::Info);
    }
}
