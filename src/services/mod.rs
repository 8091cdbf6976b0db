pub mod cache;
pub mod context;
pub mod demo;
pub mod normalizer;
pub mod odds_client;
pub mod orchestrator;
pub mod rate_limiter;

pub use cache::{Tier, TierSummary};
pub use context::AppContext;
pub use odds_client::{fallback_sports, EventStatus};
pub use orchestrator::{FetchOrchestrator, RefreshFilters, Truncation};

/// Test doubles shared by the service and API tests.
#[cfg(test)]
pub mod testing {
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::context::AppContext;
    use super::normalizer::{H2hPrices, OddsSynthesizer};
    use super::odds_client::{EventStatus, OddsProvider};
    use crate::config::Settings;
    use crate::models::Sport;

    /// Deterministic synthetic odds.
    pub struct FixedOddsSynthesizer;

    impl OddsSynthesizer for FixedOddsSynthesizer {
        fn synthesize(&self, draw_eligible: bool) -> H2hPrices {
            H2hPrices {
                home: 2.1,
                away: 3.3,
                draw: draw_eligible.then_some(3.05),
            }
        }
    }

    /// Canned provider. Unknown sports and events behave like failed calls.
    #[derive(Default)]
    pub struct MockProvider {
        sports: Option<Vec<Sport>>,
        events: HashMap<String, Vec<Value>>,
        odds: HashMap<String, Value>,
        pub sports_calls: AtomicUsize,
        pub events_calls: AtomicUsize,
        pub odds_calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_sports(mut self, sports: Vec<Sport>) -> Self {
            self.sports = Some(sports);
            self
        }

        pub fn with_events(mut self, sport_key: &str, events: Vec<Value>) -> Self {
            self.events.insert(sport_key.to_string(), events);
            self
        }

        pub fn with_odds(mut self, event_id: &str, odds: Value) -> Self {
            self.odds.insert(event_id.to_string(), odds);
            self
        }

        /// Total provider calls of any kind.
        pub fn total_calls(&self) -> usize {
            self.sports_calls.load(Ordering::SeqCst)
                + self.events_calls.load(Ordering::SeqCst)
                + self.odds_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OddsProvider for MockProvider {
        async fn list_sports(&self) -> Option<Vec<Sport>> {
            self.sports_calls.fetch_add(1, Ordering::SeqCst);
            self.sports.clone()
        }

        async fn list_events(&self, sport_key: &str, _status: EventStatus, limit: usize) -> Option<Vec<Value>> {
            self.events_calls.fetch_add(1, Ordering::SeqCst);
            self.events
                .get(sport_key)
                .map(|events| events.iter().take(limit).cloned().collect())
        }

        async fn get_odds(&self, event_id: &str) -> Option<Value> {
            self.odds_calls.fetch_add(1, Ordering::SeqCst);
            self.odds.get(event_id).cloned()
        }
    }

    /// Default settings without the courtesy delay between odds calls.
    pub fn test_settings() -> Settings {
        let mut settings = Settings::with_api_key("test-key");
        settings.fetch.odds_call_delay = Duration::ZERO;
        settings
    }

    pub fn test_context(settings: Settings, provider: Arc<MockProvider>) -> AppContext {
        AppContext::new(settings, provider, Arc::new(FixedOddsSynthesizer))
    }
}
