//! Service configuration, environment-driven.

/// Knobs for the application service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// How many times a command is retried when an optimistic write loses
    /// the race before the caller sees a retryable contention error.
    pub max_commit_attempts: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 4,
        }
    }
}

impl ServiceConfig {
    /// Read configuration from the environment, falling back to defaults
    /// on missing or unparseable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_commit_attempts = match std::env::var("WEIGHPOINT_MAX_COMMIT_ATTEMPTS") {
            Ok(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(
                        value = %raw,
                        default = defaults.max_commit_attempts,
                        "invalid WEIGHPOINT_MAX_COMMIT_ATTEMPTS, using default"
                    );
                    defaults.max_commit_attempts
                }
            },
            Err(_) => defaults.max_commit_attempts,
        };

        Self { max_commit_attempts }
    }
}
