//! HTTP client for the upstream odds provider.
//!
//! Every operation is a single GET with an explicit timeout. Failures (non-2xx,
//! timeouts, transport errors, undecodable bodies) are logged and returned as
//! `None` so callers treat them as "no data for this item".
//!
//! Provider endpoints (odds-api.io style):
//!   GET {base}/sports
//!   GET {base}/events?sport={key}&status={live|pending}&limit={n}
//!   GET {base}/odds?eventId={id}
//! all authenticated with an `apiKey` query parameter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::models::Sport;

/// Which events to request for a sport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EventStatus {
    Live,
    Upcoming,
    #[default]
    Any,
}

impl EventStatus {
    fn as_query(&self) -> Option<&'static str> {
        match self {
            EventStatus::Live => Some("live"),
            EventStatus::Upcoming => Some("pending"),
            EventStatus::Any => None,
        }
    }
}

/// The three provider operations the orchestrator depends on.
#[async_trait]
pub trait OddsProvider: Send + Sync {
    async fn list_sports(&self) -> Option<Vec<Sport>>;

    /// Raw event objects; their shape is provider-owned and left to the normalizer.
    async fn list_events(&self, sport_key: &str, status: EventStatus, limit: usize) -> Option<Vec<Value>>;

    /// Raw odds payload for one event.
    async fn get_odds(&self, event_id: &str) -> Option<Value>;
}

/// Sports tried when the provider's sports list cannot be fetched, most
/// important first.
pub fn fallback_sports() -> Vec<Sport> {
    vec![
        Sport::new("soccer_epl", "EPL", "Soccer"),
        Sport::new("soccer_spain_la_liga", "La Liga", "Soccer"),
        Sport::new("soccer_uefa_champs_league", "UEFA Champions League", "Soccer"),
        Sport::new("basketball_nba", "NBA", "Basketball"),
        Sport::new("basketball_euroleague", "Basketball Euroleague", "Basketball"),
        Sport::new("americanfootball_nfl", "NFL", "American Football"),
        Sport::new("tennis_atp", "ATP", "Tennis"),
        Sport::new("icehockey_nhl", "NHL", "Ice Hockey"),
        Sport::new("baseball_mlb", "MLB", "Baseball"),
    ]
}

pub struct OddsApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OddsApiClient {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(5)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);

        let resp = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        for header in ["x-requests-remaining", "x-ratelimit-remaining"] {
            if let Some(remaining) = resp.headers().get(header).and_then(|v| v.to_str().ok()) {
                tracing::debug!("Odds API: {} requests remaining", remaining);
            }
        }

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::error!("Odds API: invalid API key (401)");
        }
        if !status.is_success() {
            return Err(ProviderError::Status(status));
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl OddsProvider for OddsApiClient {
    async fn list_sports(&self) -> Option<Vec<Sport>> {
        match self.get_json("sports", &[]).await {
            Ok(Value::Array(items)) => {
                let sports: Vec<Sport> = items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value::<Sport>(item).ok())
                    .collect();
                tracing::info!("Odds API: {} sports listed", sports.len());
                Some(sports)
            }
            Ok(_) => {
                tracing::warn!("Odds API: sports list was not an array");
                None
            }
            Err(e) => {
                tracing::warn!("Odds API: sports list failed: {}", e);
                None
            }
        }
    }

    async fn list_events(&self, sport_key: &str, status: EventStatus, limit: usize) -> Option<Vec<Value>> {
        let mut params = vec![("sport", sport_key.to_string()), ("limit", limit.to_string())];
        if let Some(status) = status.as_query() {
            params.push(("status", status.to_string()));
        }

        match self.get_json("events", &params).await {
            Ok(Value::Array(events)) => Some(events),
            Ok(Value::Object(mut wrapper)) => match wrapper.remove("data").or_else(|| wrapper.remove("events")) {
                Some(Value::Array(events)) => Some(events),
                _ => {
                    tracing::warn!("Odds API: unexpected events payload for {}", sport_key);
                    None
                }
            },
            Ok(_) => {
                tracing::warn!("Odds API: unexpected events payload for {}", sport_key);
                None
            }
            Err(e) => {
                tracing::warn!("Odds API: events for {} failed: {}", sport_key, e);
                None
            }
        }
    }

    async fn get_odds(&self, event_id: &str) -> Option<Value> {
        match self.get_json("odds", &[("eventId", event_id.to_string())]).await {
            Ok(Value::Null) => None,
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!("Odds API: odds for event {} failed: {}", event_id, e);
                None
            }
        }
    }
}
