use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use outpost::{FetcherConfig, HeartbeatConfig, ResourcePolicy};
use outpost_core::{ContactInfo, NodeIdentity};
use thiserror::Error;

use crate::routes::Resource;

/// Error raised when an environment variable cannot be parsed.
///
/// A malformed value aborts startup; silently falling back to a default
/// would hide the typo until the node misbehaves in the field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable was set but does not parse.
    #[error("invalid value {value:?} for {var}")]
    Invalid {
        /// Environment variable name.
        var: &'static str,
        /// The rejected raw value.
        value: String,
    },
}

/// Freshness policy per proxied resource.
#[derive(Debug, Clone)]
pub struct PolicySet {
    /// Relief requests listing.
    pub requests: ResourcePolicy,
    /// News feed.
    pub news: ResourcePolicy,
    /// Emergency phone directory.
    pub phones: ResourcePolicy,
    /// Rescue point listing.
    pub rescue_points: ResourcePolicy,
    /// Map tiles.
    pub tiles: ResourcePolicy,
}

impl PolicySet {
    /// Policy for a listing resource.
    pub fn resource(&self, resource: Resource) -> &ResourcePolicy {
        match resource {
            Resource::Requests => &self.requests,
            Resource::News => &self.news,
            Resource::Phones => &self.phones,
            Resource::RescuePoints => &self.rescue_points,
        }
    }
}

/// Process configuration, read once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on.
    pub bind_addr: SocketAddr,
    /// Base URL of the authoritative Registry, without a trailing slash.
    pub registry_url: String,
    /// Redis connection URL; absent means the in-memory backend.
    pub redis_url: Option<String>,
    /// What this node registers as.
    pub identity: NodeIdentity,
    /// Per-resource freshness policies.
    pub policies: PolicySet,
    /// Store and upstream timeouts for the fetch pipeline.
    pub fetcher: FetcherConfig,
    /// Registration heartbeat cadence and backoff.
    pub heartbeat: HeartbeatConfig,
    /// Timeout for each side of a speedtest probe.
    pub probe_timeout: Duration,
}

impl Config {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let max_stale = env_secs("MAX_STALE_SECS", 30 * 60)?;
        let policy = |ttl: Duration| ResourcePolicy::new(ttl, max_stale);

        let identity = NodeIdentity::new(
            env_string("NODE_NAME", "Community Node"),
            env_string("MY_URL", "http://localhost:8003"),
            ContactInfo {
                name: env_string("CONTACT_NAME", ""),
                phone: env_string("CONTACT_PHONE", ""),
                zalo: env_string("CONTACT_ZALO", ""),
                email: env_string("CONTACT_EMAIL", ""),
                facebook: env_string("CONTACT_FB", ""),
            },
        );

        let bind_raw = env_string("BIND_ADDR", "0.0.0.0:8003");
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            var: "BIND_ADDR",
            value: bind_raw,
        })?;

        Ok(Config {
            bind_addr,
            registry_url: env_string("REGISTRY_URL", "http://127.0.0.1:8001")
                .trim_end_matches('/')
                .to_owned(),
            redis_url: env_opt("REDIS_URL"),
            identity,
            policies: PolicySet {
                requests: policy(env_secs("TTL_REQUESTS_SECS", 60)?),
                news: policy(env_secs("TTL_NEWS_SECS", 120)?),
                phones: policy(env_secs("TTL_PHONES_SECS", 600)?),
                rescue_points: policy(env_secs("TTL_RESCUE_POINTS_SECS", 600)?),
                tiles: policy(env_secs("TTL_TILES_SECS", 86_400)?),
            },
            fetcher: FetcherConfig {
                store_timeout: env_millis("STORE_TIMEOUT_MS", 1_000)?,
                upstream_timeout: env_secs("UPSTREAM_TIMEOUT_SECS", 10)?,
            },
            heartbeat: HeartbeatConfig {
                interval: env_secs("HEARTBEAT_SECS", 30)?,
                initial_backoff: env_secs("BACKOFF_INITIAL_SECS", 1)?,
                max_backoff: env_secs("BACKOFF_MAX_SECS", 300)?,
                ..HeartbeatConfig::default()
            },
            probe_timeout: env_secs("PROBE_TIMEOUT_SECS", 5)?,
        })
    }
}

fn env_string(var: &str, default: &str) -> String {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_owned(),
    }
}

fn env_opt(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

fn env_secs(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    env_duration(var, default, Duration::from_secs)
}

fn env_millis(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    env_duration(var, default, Duration::from_millis)
}

fn env_duration(
    var: &'static str,
    default: u64,
    unit: fn(u64) -> Duration,
) -> Result<Duration, ConfigError> {
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(unit)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        _ => Ok(unit(default)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global, so everything touching them
    // runs inside this single test.
    #[test]
    fn from_env_reads_defaults_overrides_and_rejects_garbage() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.registry_url, "http://127.0.0.1:8001");
        assert_eq!(config.identity.name, "Community Node");
        assert_eq!(config.identity.url, "http://localhost:8003");
        assert_eq!(config.identity.tag, "Community");
        assert_eq!(config.redis_url, None);
        assert_eq!(config.policies.news.ttl, Duration::from_secs(120));
        assert_eq!(config.policies.news.max_stale, Duration::from_secs(1800));
        assert_eq!(config.heartbeat.interval, Duration::from_secs(30));
        assert_eq!(config.fetcher.store_timeout, Duration::from_millis(1000));

        unsafe {
            env::set_var("REGISTRY_URL", "http://registry.relief.vn/");
            env::set_var("NODE_NAME", "Quang Tri Node");
            env::set_var("CONTACT_PHONE", "0123456789");
            env::set_var("TTL_NEWS_SECS", "300");
            env::set_var("MAX_STALE_SECS", "900");
            env::set_var("REDIS_URL", "redis://cache.local:6379");
        }
        let config = Config::from_env().unwrap();
        // Trailing slash is stripped so path concatenation stays predictable.
        assert_eq!(config.registry_url, "http://registry.relief.vn");
        assert_eq!(config.identity.name, "Quang Tri Node");
        assert_eq!(config.identity.contact.phone, "0123456789");
        assert_eq!(config.policies.news.ttl, Duration::from_secs(300));
        assert_eq!(config.policies.news.max_stale, Duration::from_secs(900));
        assert_eq!(
            config.redis_url.as_deref(),
            Some("redis://cache.local:6379")
        );

        unsafe {
            env::set_var("TTL_NEWS_SECS", "five minutes");
        }
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid {
                var: "TTL_NEWS_SECS",
                ..
            })
        ));

        unsafe {
            env::remove_var("REGISTRY_URL");
            env::remove_var("NODE_NAME");
            env::remove_var("CONTACT_PHONE");
            env::remove_var("TTL_NEWS_SECS");
            env::remove_var("MAX_STALE_SECS");
            env::remove_var("REDIS_URL");
        }
    }
}
