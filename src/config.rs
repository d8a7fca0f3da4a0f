use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use crate::game::constants::timing::{MATCH_DURATION_SECS, TICK_RATE};
use crate::game::game_loop::GameLoopConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Maximum number of concurrent matches
    pub max_matches: usize,
    /// Length of one match
    pub match_duration_secs: u64,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Allow practice matches against the server-driven opponent
    pub ai_opponent: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4433,
            max_matches: 100,
            match_duration_secs: MATCH_DURATION_SECS,
            tick_rate: TICK_RATE,
            ai_opponent: cfg!(feature = "ai_opponent"),
        }
    }
}

/// Parse `value`, keeping `current` when it is malformed or out of range
fn parse_or_keep<T>(name: &str, value: &str, current: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if valid(&parsed) => parsed,
        Ok(_) => {
            tracing::warn!("{} '{}' out of range, using default", name, value);
            current
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", name, value);
            current
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("BIND_ADDRESS") {
            config.bind_address =
                parse_or_keep("BIND_ADDRESS", &addr, config.bind_address, |_| true);
        }

        if let Some(port) = lookup("PORT") {
            config.port = parse_or_keep("PORT", &port, config.port, |p| *p > 0);
        }

        if let Some(max) = lookup("MAX_MATCHES") {
            config.max_matches = parse_or_keep("MAX_MATCHES", &max, config.max_matches, |m| {
                (1..=10_000).contains(m)
            });
        }

        if let Some(secs) = lookup("MATCH_DURATION_SECS") {
            config.match_duration_secs = parse_or_keep(
                "MATCH_DURATION_SECS",
                &secs,
                config.match_duration_secs,
                |s| (1..=3600).contains(s),
            );
        }

        if let Some(rate) = lookup("TICK_RATE") {
            config.tick_rate = parse_or_keep("TICK_RATE", &rate, config.tick_rate, |r| {
                (1..=1000).contains(r)
            });
        }

        if let Some(ai) = lookup("AI_OPPONENT") {
            config.ai_opponent = match ai.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    tracing::warn!("Invalid AI_OPPONENT '{}', using default", ai);
                    config.ai_opponent
                }
            };
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        if self.max_matches == 0 {
            return Err("max_matches must be at least 1".to_string());
        }
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        if self.match_duration_secs == 0 {
            return Err("match_duration_secs must be at least 1".to_string());
        }
        if self.ai_opponent && !cfg!(feature = "ai_opponent") {
            return Err("AI_OPPONENT requires the ai_opponent feature".to_string());
        }
        Ok(())
    }

    /// Per-match simulation settings. The AI flag is chosen per room.
    pub fn game_loop_config(&self) -> GameLoopConfig {
        GameLoopConfig {
            tick_rate: self.tick_rate,
            match_duration: Duration::from_secs(self.match_duration_secs),
            ..Default::default()
        }
    }
}
