use clap::Parser;
use std::time::Duration;

/// Near-live game sync with a JSON view
#[derive(Parser, Debug, Clone)]
#[command(name = "courtside", version, about)]
pub struct Config {
    /// Game-data provider base URL
    #[arg(long, env = "PROVIDER_URL", default_value = "http://127.0.0.1:8000")]
    pub provider_url: String,

    /// Game to follow; defaults to the first game on today's scoreboard
    #[arg(long, env = "GAME_ID")]
    pub game_id: Option<String>,

    /// Delay between poll cycles in seconds
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "15")]
    pub poll_interval_secs: u64,

    /// Ceiling for a single provider request in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "15")]
    pub fetch_timeout_secs: u64,

    /// View server listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
    pub dashboard_addr: String,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be positive");
        }
        if !(1..=60).contains(&self.fetch_timeout_secs) {
            anyhow::bail!("fetch_timeout_secs must be between 1 and 60");
        }
        if let Err(e) = url::Url::parse(&self.provider_url) {
            anyhow::bail!("provider_url '{}' is invalid: {}", self.provider_url, e);
        }
        if matches!(self.game_id.as_deref(), Some(id) if id.trim().is_empty()) {
            anyhow::bail!("game_id must not be empty");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("courtside").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = parse(&[]);
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse(&["--poll-interval-secs", "0"]).validate().is_err());
        assert!(parse(&["--fetch-timeout-secs", "0"]).validate().is_err());
        assert!(parse(&["--fetch-timeout-secs", "120"]).validate().is_err());
        assert!(parse(&["--provider-url", "nope"]).validate().is_err());
        assert!(parse(&["--game-id", " "]).validate().is_err());
    }
}
