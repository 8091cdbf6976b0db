use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Settings;
use crate::error::FetchError;
use crate::models::{ApiResponse, Game, GamesResponse, RateLimitStatus};
use crate::services::demo::demo_games;
use crate::services::{AppContext, FetchOrchestrator, RefreshFilters, Tier, TierSummary, Truncation};
use crate::utils::parse_flag;

const MAX_LIMIT: usize = 500;

pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let port = settings.port;
    let ctx = Arc::new(AppContext::from_settings(settings)?);

    let app = create_router(ctx);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Odds aggregator listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/games", get(games_handler).options(preflight))
        .route("/api/status", get(status_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(ctx)
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("Odds aggregator is running"))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

// GET /api/status - quota and cache diagnostics
#[derive(Debug, Serialize)]
struct StatusReport {
    rate_limit: RateLimitStatus,
    tiers: Vec<TierSummary>,
    sports_cached: bool,
}

async fn status_handler(State(ctx): State<Arc<AppContext>>) -> Json<ApiResponse<StatusReport>> {
    let now = Utc::now();
    let (tiers, sports_cached) = {
        let cache = ctx.cache.read().await;
        (cache.summary(now), cache.read_sports(now).is_some())
    };
    Json(ApiResponse::success(StatusReport {
        rate_limit: ctx.rate_limit_status(now).await,
        tiers,
        sports_cached,
    }))
}

/// Query parameters of `GET /api/games`. Flags are lenient strings so that
/// `?live`, `?live=1` and `?live=true` all work.
#[derive(Debug, Default, Deserialize)]
pub struct GamesQuery {
    pub force: Option<String>,
    pub sport: Option<String>,
    pub live: Option<String>,
    pub upcoming: Option<String>,
    pub longterm: Option<String>,
    pub limit: Option<String>,
}

impl GamesQuery {
    fn tiers(&self) -> Vec<Tier> {
        let mut tiers = Vec::new();
        if parse_flag(self.live.as_deref()) {
            tiers.push(Tier::Live);
        }
        if parse_flag(self.upcoming.as_deref()) {
            tiers.extend([Tier::Today, Tier::Week]);
        }
        if parse_flag(self.longterm.as_deref()) {
            tiers.push(Tier::LongTerm);
        }
        if tiers.is_empty() {
            tiers.extend(Tier::ALL);
        }
        tiers
    }

    fn sport(&self) -> Option<&str> {
        self.sport.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<usize>().ok())
            .unwrap_or(MAX_LIMIT)
            .min(MAX_LIMIT)
    }

    /// Apply the sport filter and the limit to a game list.
    fn select(&self, games: Vec<Game>) -> Vec<Game> {
        let sport = self.sport();
        games
            .into_iter()
            .filter(|g| sport.map_or(true, |s| g.matches_sport_filter(s)))
            .take(self.limit())
            .collect()
    }
}

async fn games_handler(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<GamesQuery>,
) -> (StatusCode, Json<GamesResponse>) {
    let (status, response) = handle_games(&ctx, &query).await;
    (status, Json(response))
}

/// Cache hit → refresh → stale cache → demo data → error. Every path ends
/// in a response.
pub async fn handle_games(ctx: &AppContext, query: &GamesQuery) -> (StatusCode, GamesResponse) {
    let now = Utc::now();
    let tiers = query.tiers();

    if !parse_flag(query.force.as_deref()) {
        let cached = ctx.cache.read().await.read(&tiers, now);
        if let Some(hit) = cached {
            let age = hit.age_seconds(now);
            tracing::info!("Cache hit: {} games, {}s old", hit.games.len(), age);
            let rate_limit = ctx.rate_limit_status(now).await;
            let mut response = GamesResponse::new(query.select(hit.games), true, rate_limit);
            response.cache_age_seconds = Some(age);
            return (StatusCode::OK, response);
        }
        tracing::info!("Cache miss for tiers {:?}", tiers);
    } else {
        tracing::info!("Forced refresh, bypassing cache");
    }

    let filters = RefreshFilters {
        sport: query.sport().map(str::to_string),
        ..RefreshFilters::default()
    };
    let failure = match FetchOrchestrator::new(ctx).refresh(&filters).await {
        Ok(outcome) => {
            let written_at = Utc::now();
            if filters.is_complete() {
                ctx.cache.write().await.write(&outcome.games, written_at);
            }
            let games = outcome
                .games
                .into_iter()
                .filter(|g| tiers.contains(&Tier::classify(g, written_at)))
                .collect();

            let rate_limit = ctx.rate_limit_status(written_at).await;
            let mut response = GamesResponse::new(query.select(games), false, rate_limit);
            response.api_calls_made = Some(outcome.api_calls_made);
            response.sports_processed = Some(outcome.sports_processed);
            if let Some(reason) = outcome.truncated {
                response.truncated = Some(true);
                response.message = Some(
                    match reason {
                        Truncation::TimeBudget => "Partial results: refresh time budget exhausted",
                        Truncation::RateLimit => "Partial results: API rate limit reached",
                    }
                    .to_string(),
                );
            }
            if !outcome.errors.is_empty() {
                response.errors = Some(outcome.errors);
            }
            return (StatusCode::OK, response);
        }
        Err(e) => e,
    };

    tracing::warn!("Refresh failed: {}", failure);
    let rate_limit = ctx.rate_limit_status(Utc::now()).await;

    let stale = ctx.cache.read().await.read_stale(&tiers);
    if let Some(stale) = stale {
        tracing::info!("Serving {} stale games", stale.games.len());
        let age = stale.age_seconds(Utc::now());
        let mut response = GamesResponse::new(query.select(stale.games), true, rate_limit);
        response.stale = Some(true);
        response.cache_age_seconds = Some(age);
        response.message = Some(format!("Serving cached data after refresh failure: {}", failure));
        return (StatusCode::OK, response);
    }

    if ctx.settings.demo_fallback {
        tracing::warn!("No cached data, serving demo games");
        let games = demo_games(&ctx.normalizer, Utc::now());
        let mut response = GamesResponse::new(query.select(games), false, rate_limit);
        response.demo_data = Some(true);
        response.message = Some(format!("Demo data, odds provider unavailable: {}", failure));
        return (StatusCode::OK, response);
    }

    tracing::error!("No games to serve: {}", failure);
    let status = match failure {
        FetchError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        FetchError::TotalFetchFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, GamesResponse::failure(failure.to_string(), rate_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataSource, Sport};
    use crate::services::testing::{test_context, test_settings, MockProvider};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Duration;
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    fn event(id: &str, home: &str, away: &str, hours: i64) -> Value {
        json!({
            "id": id,
            "home": home,
            "away": away,
            "commence_time": (Utc::now() + Duration::hours(hours)).to_rfc3339(),
        })
    }

    fn epl_provider() -> MockProvider {
        MockProvider::new()
            .with_sports(vec![Sport::new("soccer_epl", "EPL", "Soccer")])
            .with_events(
                "soccer_epl",
                vec![event("e1", "Arsenal", "Chelsea", 5), event("e2", "Leeds", "Everton", 30)],
            )
            .with_odds("e1", json!({"odds": {"home": 1.9, "draw": 3.4, "away": 4.0}}))
            .with_odds("e2", json!({}))
    }

    fn query(pairs: &[(&str, &str)]) -> GamesQuery {
        let mut q = GamesQuery::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "force" => q.force = value,
                "sport" => q.sport = value,
                "live" => q.live = value,
                "upcoming" => q.upcoming = value,
                "longterm" => q.longterm = value,
                "limit" => q.limit = value,
                _ => unreachable!(),
            }
        }
        q
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let provider = Arc::new(epl_provider());
        let ctx = test_context(test_settings(), provider.clone());

        let (status, first) = handle_games(&ctx, &GamesQuery::default()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!first.cached);
        assert_eq!(first.total_games, 2);
        assert_eq!(first.synthetic_odds_count, 1);
        assert_eq!(first.api_calls_made, Some(4));

        let calls = provider.total_calls();
        let (_, second) = handle_games(&ctx, &GamesQuery::default()).await;
        assert!(second.cached);
        assert_eq!(second.total_games, 2);
        assert!(second.cache_age_seconds.is_some());
        assert_eq!(provider.total_calls(), calls);
    }

    #[tokio::test]
    async fn test_force_bypasses_valid_cache() {
        let provider = Arc::new(epl_provider());
        let ctx = test_context(test_settings(), provider.clone());

        handle_games(&ctx, &GamesQuery::default()).await;
        assert_eq!(provider.events_calls.load(Ordering::SeqCst), 1);

        let (_, forced) = handle_games(&ctx, &query(&[("force", "true")])).await;
        assert!(!forced.cached);
        assert_eq!(provider.events_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_tier_selection_and_limit() {
        let ctx = test_context(test_settings(), Arc::new(epl_provider()));
        handle_games(&ctx, &GamesQuery::default()).await;

        let (_, live) = handle_games(&ctx, &query(&[("live", "1")])).await;
        assert!(live.cached);
        assert_eq!(live.total_games, 0);

        let (_, upcoming) = handle_games(&ctx, &query(&[("upcoming", ""), ("limit", "1")])).await;
        assert_eq!(upcoming.total_games, 1);
        assert_eq!(upcoming.games[0].id, "e1");
    }

    #[tokio::test]
    async fn test_sport_filtered_refresh_is_not_cached() {
        let ctx = test_context(test_settings(), Arc::new(epl_provider()));

        let (status, response) = handle_games(&ctx, &query(&[("sport", "soccer")])).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.total_games, 2);
        assert!(ctx.cache.read().await.read_stale(&Tier::ALL).is_none());
    }

    #[tokio::test]
    async fn test_sport_group_filter_keeps_refreshed_and_cached_games() {
        let provider = Arc::new(
            MockProvider::new()
                .with_sports(vec![
                    Sport::new("icehockey_nhl", "NHL", "Ice Hockey"),
                    Sport::new("soccer_epl", "EPL", "Soccer"),
                ])
                .with_events("icehockey_nhl", vec![event("h1", "Bruins", "Rangers", 3)])
                .with_events("soccer_epl", vec![event("e1", "Arsenal", "Chelsea", 5)]),
        );
        let ctx = test_context(test_settings(), provider.clone());

        let (status, refreshed) = handle_games(&ctx, &query(&[("sport", "Ice Hockey")])).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!refreshed.cached);
        assert_eq!(refreshed.total_games, 1);
        assert_eq!(refreshed.games[0].id, "h1");

        handle_games(&ctx, &GamesQuery::default()).await;
        let (_, hit) = handle_games(&ctx, &query(&[("sport", "Ice Hockey")])).await;
        assert!(hit.cached);
        assert_eq!(hit.total_games, 1);
        assert_eq!(hit.games[0].sport_group, "Ice Hockey");
    }

    #[tokio::test]
    async fn test_stale_fallback_on_failure() {
        let ctx = test_context(test_settings(), Arc::new(MockProvider::new()));
        let long_ago = Utc::now() - Duration::hours(6);
        let ligue_one = Sport::new("soccer_france_ligue_one", "Ligue 1", "Soccer");
        let game = ctx
            .normalizer
            .to_game(&event("old", "Lyon", "Nice", 2), None, &ligue_one, long_ago)
            .unwrap();
        ctx.cache.write().await.write(&[game], long_ago);

        let (status, response) = handle_games(&ctx, &GamesQuery::default()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(response.success);
        assert!(response.cached);
        assert_eq!(response.stale, Some(true));
        assert_eq!(response.games[0].id, "old");
        assert!(response.message.is_some());
    }

    #[tokio::test]
    async fn test_rate_limited_without_cache_is_429() {
        let mut settings = test_settings();
        settings.rate_limit.max_per_minute = 0;
        let provider = Arc::new(epl_provider());
        let ctx = test_context(settings, provider.clone());

        let (status, response) = handle_games(&ctx, &GamesQuery::default()).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(!response.success);
        assert!(response.error.is_some());
        assert_eq!(provider.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_total_failure_without_cache_is_503() {
        let ctx = test_context(test_settings(), Arc::new(MockProvider::new()));

        let (status, response) = handle_games(&ctx, &GamesQuery::default()).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.total_games, 0);
    }

    #[tokio::test]
    async fn test_demo_fallback_is_flagged() {
        let mut settings = test_settings();
        settings.demo_fallback = true;
        let ctx = test_context(settings, Arc::new(MockProvider::new()));

        let (status, response) = handle_games(&ctx, &GamesQuery::default()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.demo_data, Some(true));
        assert!(response.total_games > 0);
        assert!(response.games.iter().all(|g| g.data_source == DataSource::Demo));
        assert_eq!(response.synthetic_odds_count, response.total_games);
    }

    #[test]
    fn test_query_tiers() {
        assert_eq!(GamesQuery::default().tiers(), Tier::ALL.to_vec());
        assert_eq!(query(&[("live", "true")]).tiers(), vec![Tier::Live]);
        assert_eq!(
            query(&[("live", "yes"), ("longterm", "1")]).tiers(),
            vec![Tier::Live, Tier::LongTerm]
        );
        assert_eq!(query(&[("limit", "9000")]).limit(), MAX_LIMIT);
        assert_eq!(query(&[("limit", "abc")]).limit(), MAX_LIMIT);
    }

    fn router() -> Router {
        create_router(Arc::new(test_context(test_settings(), Arc::new(epl_provider()))))
    }

    #[tokio::test]
    async fn test_router_methods() {
        let post = Request::builder()
            .method("POST")
            .uri("/api/games")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(post).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let options = Request::builder()
            .method("OPTIONS")
            .uri("/api/games")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(options).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router().oneshot(health).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_router_games_and_status() {
        let app = router();

        let request = Request::builder()
            .uri("/api/games?upcoming=true")
            .header("Origin", "http://localhost:5173")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["total_games"], 2);
        assert_eq!(json["rate_limit"]["remaining_minute"], 16);

        let request = Request::builder().uri("/api/status").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["tiers"].as_array().unwrap().len(), 4);
        assert_eq!(json["data"]["sports_cached"], true);
    }
}
