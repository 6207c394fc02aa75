use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "quadview_engine=debug,wgpu_core=warn").
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,

    /// Default level for wgpu/naga crates when no explicit filter is given.
    /// Their info output is noisy enough to drown the frame loop logs.
    pub gpu_level: log::LevelFilter,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            gpu_level: log::LevelFilter::Warn,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// Subsequent calls are ignored. Call early in `main`, before the window opens.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.filter_level(log::LevelFilter::Info);
            for module in ["wgpu_core", "wgpu_hal", "naga"] {
                builder.filter_module(module, config.gpu_level);
            }
        }

        builder.write_style(config.write_style);
        builder.format_timestamp_millis();

        // `try_init` so a logger installed by a test harness does not abort us.
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_ignored() {
        init_logging(LoggingConfig {
            env_filter: Some("quadview_engine=trace".to_string()),
            ..LoggingConfig::default()
        });
        init_logging(LoggingConfig::default());
        log::trace!("still alive");
    }
}
