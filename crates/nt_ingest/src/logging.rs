use std::collections::VecDeque;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Prefix-carrying logger so per-feed lines read `[TechCrunch] ...`.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    prefixes: VecDeque<String>,
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push_back(prefix.into());
        self
    }

    fn prefixed(&self, message: &str) -> String {
        let mut line = String::new();
        for prefix in &self.prefixes {
            line.push_str(prefix);
            line.push(' ');
        }
        line.push_str(message);
        line
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{}", self.prefixed(message));
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{}", self.prefixed(message));
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}", self.prefixed(message));
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!("{}", self.prefixed(message));
    }
}

/// Install the global `fmt` subscriber once. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_logging() -> Logger {
    if !tracing::dispatcher::has_been_set() {
        INIT.call_once(|| {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
            let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        });
    }
    Logger::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_stack_in_order() {
        let logger = Logger::new().with_prefix("[feed]").with_prefix("🔗");
        assert_eq!(logger.prefixed("stored"), "[feed] 🔗 stored");
        assert_eq!(Logger::new().prefixed("plain"), "plain");
    }

    #[test]
    fn test_init_is_idempotent() {
        init_logging();
        init_logging().info("still fine");
    }
}
