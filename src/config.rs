use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::retry::RetryPolicy;

pub const DEFAULT_ROW_CAP: u32 = 1000;
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(90);

/// Runtime tunables for a report invocation. Defaults come first, then
/// `FM_*` environment variables, then CLI flags applied by `main`.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub row_cap: u32,
    pub retry: RetryPolicy,
    pub render_timeout: Duration,
    pub out_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            row_cap: DEFAULT_ROW_CAP,
            retry: RetryPolicy::default(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
            out_dir: PathBuf::from("reports"),
        }
    }
}

impl ReportConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(cap) = env_parse::<u32>("FM_ROW_CAP") {
            config.row_cap = cap;
        }
        if let Some(retries) = env_parse::<f64>("FM_MAX_RETRIES") {
            config.retry.max_retries = retries;
        }
        if let Some(millis) = env_parse::<u64>("FM_RETRY_DELAY_MS") {
            config.retry.base_delay = Duration::from_millis(millis);
        }
        if let Some(secs) = env_parse::<u64>("FM_RENDER_TIMEOUT_SECS") {
            config.render_timeout = Duration::from_secs(secs);
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(%name, %raw, "ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_contract() {
        let config = ReportConfig::default();
        assert_eq!(config.row_cap, 1000);
        assert_eq!(config.render_timeout, Duration::from_secs(90));
        assert_eq!(config.retry.attempts(), 3);
        assert_eq!(config.out_dir, PathBuf::from("reports"));
    }
}
