use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use std::env;
use std::str::FromStr;

const DEFAULT_BASE_URL: &str = "https://api.odds-api.io/v3";

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_per_hour: u32,
    pub max_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_hour: 100,
            max_per_minute: 20,
        }
    }
}

/// Time-to-live of each cache tier.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub live_ttl: Duration,
    pub today_ttl: Duration,
    pub week_ttl: Duration,
    pub long_term_ttl: Duration,
    pub sports_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            live_ttl: Duration::seconds(60),
            today_ttl: Duration::minutes(10),
            week_ttl: Duration::minutes(30),
            long_term_ttl: Duration::hours(2),
            sports_ttl: Duration::hours(1),
        }
    }
}

impl CacheConfig {
    /// Every tier (sports list included) expires after the same `ttl`.
    #[cfg(test)]
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            live_ttl: ttl,
            today_ttl: ttl,
            week_ttl: ttl,
            long_term_ttl: ttl,
            sports_ttl: ttl,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    pub max_sports: usize,
    pub events_per_sport: usize,
    pub odds_call_delay: std::time::Duration,
    pub refresh_budget: std::time::Duration,
    pub max_errors: usize,
    pub max_bookmakers: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_sports: 20,
            events_per_sport: 8,
            odds_call_delay: std::time::Duration::from_millis(200),
            refresh_budget: std::time::Duration::from_secs(25),
            max_errors: 5,
            max_bookmakers: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
    /// Keep games whose odds had to be synthesized (they are flagged `synthetic`).
    pub allow_synthetic_odds: bool,
    /// Serve demo fixtures when neither fresh nor stale data is available.
    pub demo_fallback: bool,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let api_key = match env::var("ODDS_API_KEY") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            Ok(_) => return Err(anyhow!("ODDS_API_KEY is set but empty")),
            Err(_) => return Err(anyhow!("ODDS_API_KEY not set in environment or .env file")),
        };

        let fetch_defaults = FetchConfig::default();
        let cache_defaults = CacheConfig::default();
        let limit_defaults = RateLimitConfig::default();

        Ok(Self {
            provider: ProviderConfig {
                api_key,
                base_url: env::var("ODDS_API_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                timeout_secs: env_or("ODDS_API_TIMEOUT_SECS", 8)?,
            },
            rate_limit: RateLimitConfig {
                max_per_hour: env_or("RATE_LIMIT_PER_HOUR", limit_defaults.max_per_hour)?,
                max_per_minute: env_or("RATE_LIMIT_PER_MINUTE", limit_defaults.max_per_minute)?,
            },
            cache: CacheConfig {
                live_ttl: env_secs("CACHE_TTL_LIVE_SECS", cache_defaults.live_ttl)?,
                today_ttl: env_secs("CACHE_TTL_TODAY_SECS", cache_defaults.today_ttl)?,
                week_ttl: env_secs("CACHE_TTL_WEEK_SECS", cache_defaults.week_ttl)?,
                long_term_ttl: env_secs("CACHE_TTL_LONG_TERM_SECS", cache_defaults.long_term_ttl)?,
                sports_ttl: env_secs("CACHE_TTL_SPORTS_SECS", cache_defaults.sports_ttl)?,
            },
            fetch: FetchConfig {
                max_sports: env_or("MAX_SPORTS", fetch_defaults.max_sports)?,
                events_per_sport: env_or("EVENTS_PER_SPORT", fetch_defaults.events_per_sport)?,
                odds_call_delay: std::time::Duration::from_millis(env_or(
                    "ODDS_CALL_DELAY_MS",
                    fetch_defaults.odds_call_delay.as_millis() as u64,
                )?),
                refresh_budget: std::time::Duration::from_secs(env_or(
                    "REFRESH_BUDGET_SECS",
                    fetch_defaults.refresh_budget.as_secs(),
                )?),
                max_errors: env_or("MAX_ERRORS", fetch_defaults.max_errors)?,
                max_bookmakers: env_or("MAX_BOOKMAKERS", fetch_defaults.max_bookmakers)?,
            },
            allow_synthetic_odds: env_or("ALLOW_SYNTHETIC_ODDS", true)?,
            demo_fallback: env_or("DEMO_FALLBACK", false)?,
            port: env_or("PORT", 3000)?,
        })
    }

    /// Settings with defaults everywhere.
    #[cfg(test)]
    pub fn with_api_key(api_key: &str) -> Self {
        Self {
            provider: ProviderConfig {
                api_key: api_key.to_string(),
                base_url: DEFAULT_BASE_URL.to_string(),
                timeout_secs: 8,
            },
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            fetch: FetchConfig::default(),
            allow_synthetic_odds: true,
            demo_fallback: false,
            port: 3000,
        }
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .to_lowercase()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", name, raw)),
        _ => Ok(default),
    }
}

fn env_secs(name: &str, default: Duration) -> Result<Duration> {
    let secs: i64 = env_or(name, default.num_seconds())?;
    Ok(Duration::seconds(secs))
}
