use std::env;
use std::time::Duration;

/// Limits applied to every native interpreter run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Hard wall-clock ceiling for one run.
    pub timeout: Duration,
    /// Interpreter operation ceiling; 0 leaves only the wall-clock limit.
    pub max_operations: u64,
    /// Captured `print` lines beyond this count are dropped.
    pub max_output_lines: usize,
    /// Total bytes of captured text; the first line that would exceed it ends
    /// capture.
    pub max_output_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3_000),
            max_operations: 0,
            max_output_lines: 1_000,
            max_output_bytes: 64 * 1024,
        }
    }
}

impl SandboxConfig {
    /// Read overrides from `DRILL_EXEC_TIMEOUT_MS`, `DRILL_EXEC_MAX_OPERATIONS`,
    /// `DRILL_EXEC_MAX_OUTPUT_LINES` and `DRILL_EXEC_MAX_OUTPUT_BYTES`; unset or
    /// unparsable values keep the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: env_parse::<u64>("DRILL_EXEC_TIMEOUT_MS")
                .filter(|ms| *ms > 0)
                .map_or(defaults.timeout, Duration::from_millis),
            max_operations: env_parse("DRILL_EXEC_MAX_OPERATIONS")
                .unwrap_or(defaults.max_operations),
            max_output_lines: env_parse("DRILL_EXEC_MAX_OUTPUT_LINES")
                .unwrap_or(defaults.max_output_lines),
            max_output_bytes: env_parse("DRILL_EXEC_MAX_OUTPUT_BYTES")
                .unwrap_or(defaults.max_output_bytes),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}
