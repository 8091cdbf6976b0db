use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::Settings;
use crate::error::FetchError;
use crate::models::{RateLimitStatus, Sport};
use crate::services::cache::TieredCache;
use crate::services::normalizer::{GameNormalizer, OddsSynthesizer, RandomOddsSynthesizer};
use crate::services::odds_client::{OddsApiClient, OddsProvider};
use crate::services::rate_limiter::RateLimiter;

/// Process-wide state shared by every request: the game cache, the upstream
/// call budget, and the collaborators used to refill the cache.
///
/// Built once by the composition root (`serve`, CLI commands, tests) and
/// handed to handlers as axum state.
pub struct AppContext {
    pub settings: Settings,
    pub provider: Arc<dyn OddsProvider>,
    pub normalizer: GameNormalizer,
    pub cache: RwLock<TieredCache>,
    pub rate_limiter: Mutex<RateLimiter>,
}

impl AppContext {
    pub fn new(
        settings: Settings,
        provider: Arc<dyn OddsProvider>,
        synthesizer: Arc<dyn OddsSynthesizer>,
    ) -> Self {
        let normalizer = GameNormalizer::new(
            synthesizer,
            settings.fetch.max_bookmakers,
            settings.allow_synthetic_odds,
        );
        let cache = TieredCache::new(settings.cache);
        let rate_limiter = RateLimiter::new(settings.rate_limit, Utc::now());

        Self {
            settings,
            provider,
            normalizer,
            cache: RwLock::new(cache),
            rate_limiter: Mutex::new(rate_limiter),
        }
    }

    /// Context backed by the real HTTP provider and random synthetic odds.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let provider = OddsApiClient::new(&settings.provider)?;
        Ok(Self::new(
            settings,
            Arc::new(provider),
            Arc::new(RandomOddsSynthesizer),
        ))
    }

    pub async fn rate_limit_status(&self, now: DateTime<Utc>) -> RateLimitStatus {
        self.rate_limiter.lock().await.status(now)
    }

    /// Provider sports list outside a refresh. The call still takes a permit.
    pub async fn list_provider_sports(&self) -> Result<Option<Vec<Sport>>, FetchError> {
        if !self.rate_limiter.lock().await.try_acquire(Utc::now()) {
            return Err(FetchError::RateLimited);
        }
        Ok(self.provider.list_sports().await)
    }
}
