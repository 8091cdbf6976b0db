use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized sport category derived from a provider sport key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseSport {
    Soccer,
    Basketball,
    AmericanFootball,
    Tennis,
    Baseball,
    Hockey,
    Mma,
    Golf,
    Cricket,
    Unknown,
}

/// Substring → sport lookup. Order matters: the first match wins.
const SPORT_PATTERNS: &[(&str, BaseSport)] = &[
    ("soccer", BaseSport::Soccer),
    ("americanfootball", BaseSport::AmericanFootball),
    ("basketball", BaseSport::Basketball),
    ("tennis", BaseSport::Tennis),
    ("baseball", BaseSport::Baseball),
    ("hockey", BaseSport::Hockey),
    ("mma", BaseSport::Mma),
    ("boxing", BaseSport::Mma),
    ("golf", BaseSport::Golf),
    ("cricket", BaseSport::Cricket),
    ("football", BaseSport::Soccer),
];

impl BaseSport {
    pub fn from_sport_key(key: &str) -> Self {
        let key = key.to_lowercase();
        SPORT_PATTERNS
            .iter()
            .find(|(pattern, _)| key.contains(pattern))
            .map(|(_, sport)| *sport)
            .unwrap_or(BaseSport::Unknown)
    }

    /// Whether the h2h market for this sport carries a third "Draw" outcome.
    pub fn is_draw_eligible(&self) -> bool {
        !matches!(
            self,
            BaseSport::Basketball
                | BaseSport::Tennis
                | BaseSport::Baseball
                | BaseSport::AmericanFootball
                | BaseSport::Mma
        )
    }

    /// Sports processed first when no sport filter is given.
    pub fn is_major(&self) -> bool {
        matches!(
            self,
            BaseSport::Soccer | BaseSport::Basketball | BaseSport::AmericanFootball | BaseSport::Tennis
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BaseSport::Soccer => "soccer",
            BaseSport::Basketball => "basketball",
            BaseSport::AmericanFootball => "americanfootball",
            BaseSport::Tennis => "tennis",
            BaseSport::Baseball => "baseball",
            BaseSport::Hockey => "hockey",
            BaseSport::Mma => "mma",
            BaseSport::Golf => "golf",
            BaseSport::Cricket => "cricket",
            BaseSport::Unknown => "unknown",
        }
    }
}

/// A sport as listed by the odds provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sport {
    #[serde(alias = "slug")]
    pub key: String,
    #[serde(default, alias = "name")]
    pub title: String,
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Sport {
    pub fn new(key: &str, title: &str, group: &str) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            group: group.to_string(),
            active: true,
        }
    }

    pub fn base_sport(&self) -> BaseSport {
        match BaseSport::from_sport_key(&self.key) {
            BaseSport::Unknown => BaseSport::from_sport_key(&self.group),
            sport => sport,
        }
    }

    /// League label shown on games when the event itself carries none.
    pub fn league_label(&self) -> String {
        if !self.title.is_empty() {
            self.title.clone()
        } else if !self.group.is_empty() {
            self.group.clone()
        } else {
            self.key.clone()
        }
    }

    /// Case-insensitive match against a user supplied sport filter.
    pub fn matches_filter(&self, filter: &str) -> bool {
        sport_filter_matches(filter, &self.key, &self.group, self.base_sport())
    }
}

/// Shared by sports and games so a filter that selects a sport for refresh
/// also keeps that sport's games.
fn sport_filter_matches(filter: &str, key: &str, group: &str, base: BaseSport) -> bool {
    let filter = filter.trim().to_lowercase();
    if filter.is_empty() {
        return true;
    }
    let compact: String = filter.chars().filter(|c| c.is_alphanumeric()).collect();
    let key = key.to_lowercase();
    key.contains(&filter)
        || (!compact.is_empty() && key.contains(&compact))
        || group.to_lowercase().contains(&filter)
        || base.as_str() == filter
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Live,
    Upcoming,
}

/// Where a game's odds came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Provider,
    Synthetic,
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub key: String, // always "h2h"
    pub last_update: DateTime<Utc>,
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmaker {
    pub key: String,
    pub title: String,
    pub last_update: DateTime<Utc>,
    pub markets: Vec<Market>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub sport: BaseSport,
    pub sport_key: String,
    #[serde(default)]
    pub sport_group: String,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: DateTime<Utc>,
    pub is_live: bool,
    pub status: GameStatus,
    pub bookmakers: Vec<Bookmaker>,
    pub data_source: DataSource,
    pub fetched_at: DateTime<Utc>,
}

impl Game {
    /// Composite identity used for deduplication; provider ids are not stable.
    pub fn dedup_key(&self) -> (String, String, DateTime<Utc>) {
        (
            self.home_team.clone(),
            self.away_team.clone(),
            self.commence_time,
        )
    }

    pub fn matches_sport_filter(&self, filter: &str) -> bool {
        sport_filter_matches(filter, &self.sport_key, &self.sport_group, self.sport)
    }
}

/// A per-item failure collected during a refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchIssue {
    pub source: String,
    pub error: String,
}

impl FetchIssue {
    pub fn new(source: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub remaining_hour: u32,
    pub remaining_minute: u32,
    pub hour_reset_in_seconds: i64,
    pub minute_reset_in_seconds: i64,
}

/// Envelope returned by `GET /api/games`.
#[derive(Debug, Clone, Serialize)]
pub struct GamesResponse {
    pub success: bool,
    pub total_games: usize,
    pub games: Vec<Game>,
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FetchIssue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_calls_made: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sports_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<bool>,
    pub synthetic_odds_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rate_limit: RateLimitStatus,
}

impl GamesResponse {
    pub fn new(games: Vec<Game>, cached: bool, rate_limit: RateLimitStatus) -> Self {
        let synthetic_odds_count = games
            .iter()
            .filter(|g| g.data_source != DataSource::Provider)
            .count();
        Self {
            success: true,
            total_games: games.len(),
            games,
            timestamp: Utc::now(),
            cached,
            stale: None,
            cache_age_seconds: None,
            errors: None,
            api_calls_made: None,
            sports_processed: None,
            truncated: None,
            synthetic_odds_count,
            demo_data: None,
            message: None,
            error: None,
            rate_limit,
        }
    }

    pub fn failure(message: String, rate_limit: RateLimitStatus) -> Self {
        Self {
            success: false,
            error: Some(message),
            ..Self::new(Vec::new(), false, rate_limit)
        }
    }
}

// API Response types
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_sport_priority() {
        assert_eq!(BaseSport::from_sport_key("soccer_epl"), BaseSport::Soccer);
        assert_eq!(BaseSport::from_sport_key("americanfootball_nfl"), BaseSport::AmericanFootball);
        assert_eq!(BaseSport::from_sport_key("basketball_nba"), BaseSport::Basketball);
        assert_eq!(BaseSport::from_sport_key("icehockey_nhl"), BaseSport::Hockey);
        assert_eq!(BaseSport::from_sport_key("boxing_boxing"), BaseSport::Mma);
        assert_eq!(BaseSport::from_sport_key("football"), BaseSport::Soccer);
        assert_eq!(BaseSport::from_sport_key("aussierules_afl"), BaseSport::Unknown);
    }

    #[test]
    fn test_draw_eligibility() {
        assert!(BaseSport::Soccer.is_draw_eligible());
        assert!(BaseSport::Hockey.is_draw_eligible());
        assert!(BaseSport::Unknown.is_draw_eligible());
        assert!(!BaseSport::Basketball.is_draw_eligible());
        assert!(!BaseSport::Tennis.is_draw_eligible());
        assert!(!BaseSport::Mma.is_draw_eligible());
    }

    #[test]
    fn test_sport_deserializes_either_shape() {
        let a: Sport = serde_json::from_str(r#"{"key":"soccer_epl","title":"EPL","group":"Soccer"}"#).unwrap();
        let b: Sport = serde_json::from_str(r#"{"slug":"basketball","name":"Basketball"}"#).unwrap();
        assert_eq!(a.key, "soccer_epl");
        assert!(a.active);
        assert_eq!(b.key, "basketball");
        assert_eq!(b.title, "Basketball");
        assert_eq!(b.base_sport(), BaseSport::Basketball);
    }

    #[test]
    fn test_sport_filter() {
        let sport = Sport::new("soccer_epl", "EPL", "Soccer");
        assert!(sport.matches_filter("soccer"));
        assert!(sport.matches_filter("EPL"));
        assert!(!sport.matches_filter("basketball"));

        let nhl = Sport::new("icehockey_nhl", "NHL", "Ice Hockey");
        assert!(nhl.matches_filter("Ice Hockey"));
        assert!(nhl.matches_filter("hockey"));
    }

    #[test]
    fn test_game_filter_agrees_with_sport_filter() {
        let nhl = Sport::new("icehockey_nhl", "NHL", "Ice Hockey");
        let game = Game {
            id: "g1".to_string(),
            sport: nhl.base_sport(),
            sport_key: nhl.key.clone(),
            sport_group: nhl.group.clone(),
            league: "NHL".to_string(),
            home_team: "Bruins".to_string(),
            away_team: "Rangers".to_string(),
            commence_time: Utc::now(),
            is_live: false,
            status: GameStatus::Upcoming,
            bookmakers: Vec::new(),
            data_source: DataSource::Provider,
            fetched_at: Utc::now(),
        };
        for filter in ["Ice Hockey", "icehockey", "hockey", "NHL", "ice-hockey"] {
            assert_eq!(game.matches_sport_filter(filter), nhl.matches_filter(filter), "{}", filter);
        }
        assert!(game.matches_sport_filter("Ice Hockey"));
        assert!(!game.matches_sport_filter("soccer"));
    }
}
