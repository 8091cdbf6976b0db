use chrono::Utc;
use serde::Serialize;
use tokio::time::{sleep, Instant};

use crate::error::FetchError;
use crate::models::{FetchIssue, Game, Sport};
use crate::services::cache::dedupe;
use crate::services::context::AppContext;
use crate::services::normalizer::{event_id, has_embedded_odds};
use crate::services::odds_client::{fallback_sports, EventStatus};

#[derive(Debug, Clone, Default)]
pub struct RefreshFilters {
    /// Sport key, group or base sport name, matched case-insensitively.
    pub sport: Option<String>,
    pub status: EventStatus,
}

impl RefreshFilters {
    /// Unfiltered refreshes see every sport and event, so their results may
    /// replace the cache.
    pub fn is_complete(&self) -> bool {
        self.sport.is_none() && self.status == EventStatus::Any
    }
}

/// Why a refresh stopped before visiting every selected sport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    TimeBudget,
    RateLimit,
}

#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub games: Vec<Game>,
    pub errors: Vec<FetchIssue>,
    pub sports_processed: usize,
    pub api_calls_made: u32,
    pub truncated: Option<Truncation>,
}

/// Walks sports → events → odds against the provider within the call quota
/// and the wall-clock budget, collecting whatever it manages to normalize.
pub struct FetchOrchestrator<'a> {
    ctx: &'a AppContext,
}

/// Mutable state of one refresh run.
struct Run {
    games: Vec<Game>,
    errors: Vec<FetchIssue>,
    max_errors: usize,
    sports_processed: usize,
    api_calls_made: u32,
    truncated: Option<Truncation>,
}

impl Run {
    fn record(&mut self, issue: FetchIssue) {
        tracing::warn!("Refresh: {} - {}", issue.source, issue.error);
        self.errors.push(issue);
        if self.errors.len() > self.max_errors {
            self.errors.remove(0);
        }
    }
}

impl<'a> FetchOrchestrator<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    /// One pass over the provider. Partial results are returned as `Ok`;
    /// `Err` only when nothing at all was collected.
    pub async fn refresh(&self, filters: &RefreshFilters) -> Result<RefreshOutcome, FetchError> {
        let fetch = self.ctx.settings.fetch;
        let started = Instant::now();
        let mut run = Run {
            games: Vec::new(),
            errors: Vec::new(),
            max_errors: fetch.max_errors.max(1),
            sports_processed: 0,
            api_calls_made: 0,
            truncated: None,
        };

        let sports = self.sports(&mut run).await?;
        let sports = select_sports(sports, filters.sport.as_deref(), fetch.max_sports);
        tracing::info!("Refresh: processing {} sports", sports.len());

        'sports: for sport in &sports {
            if started.elapsed() >= fetch.refresh_budget {
                run.truncated = Some(Truncation::TimeBudget);
                break;
            }
            if !self.acquire(&mut run).await {
                run.truncated = Some(Truncation::RateLimit);
                break;
            }

            let events = self
                .ctx
                .provider
                .list_events(&sport.key, filters.status, fetch.events_per_sport)
                .await;
            run.sports_processed += 1;
            let Some(events) = events else {
                run.record(FetchIssue::new(&sport.key, "events unavailable"));
                continue;
            };
            tracing::debug!("Refresh: {} events for {}", events.len(), sport.key);

            for raw in events.iter().take(fetch.events_per_sport) {
                if started.elapsed() >= fetch.refresh_budget {
                    run.truncated = Some(Truncation::TimeBudget);
                    break 'sports;
                }

                let mut odds = None;
                if let (Some(id), false) = (event_id(raw), has_embedded_odds(raw)) {
                    if !self.acquire(&mut run).await {
                        run.truncated = Some(Truncation::RateLimit);
                        break 'sports;
                    }
                    odds = self.ctx.provider.get_odds(&id).await;
                    if odds.is_none() {
                        run.record(FetchIssue::new(format!("{}/{}", sport.key, id), "odds unavailable"));
                    }
                    sleep(fetch.odds_call_delay).await;
                }

                if let Some(game) = self.ctx.normalizer.to_game(raw, odds.as_ref(), sport, Utc::now()) {
                    run.games.push(game);
                }
            }
        }

        let mut games = dedupe(std::mem::take(&mut run.games));
        games.sort_by_key(|g| g.commence_time);

        tracing::info!(
            "Refresh: {} games from {} sports, {} API calls, {} errors{}",
            games.len(),
            run.sports_processed,
            run.api_calls_made,
            run.errors.len(),
            match run.truncated {
                Some(Truncation::TimeBudget) => " (time budget exhausted)",
                Some(Truncation::RateLimit) => " (rate limited)",
                None => "",
            }
        );

        if games.is_empty() {
            if run.truncated == Some(Truncation::RateLimit) {
                return Err(FetchError::RateLimited);
            }
            if let Some(last) = run.errors.last() {
                return Err(FetchError::TotalFetchFailure(format!("{}: {}", last.source, last.error)));
            }
        }

        Ok(RefreshOutcome {
            games,
            errors: run.errors,
            sports_processed: run.sports_processed,
            api_calls_made: run.api_calls_made,
            truncated: run.truncated,
        })
    }

    /// Cached sports list, else the provider's, else the built-in fallback.
    async fn sports(&self, run: &mut Run) -> Result<Vec<Sport>, FetchError> {
        if let Some(sports) = self.ctx.cache.read().await.read_sports(Utc::now()) {
            tracing::debug!("Refresh: sports list from cache ({} sports)", sports.len());
            return Ok(sports);
        }

        if !self.acquire(run).await {
            return Err(FetchError::RateLimited);
        }

        let listed: Vec<Sport> = self
            .ctx
            .provider
            .list_sports()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|s| s.active && !s.key.is_empty())
            .collect();

        if listed.is_empty() {
            run.record(FetchIssue::new("sports", "sports list unavailable, using fallback list"));
            return Ok(fallback_sports());
        }

        self.ctx.cache.write().await.write_sports(listed.clone(), Utc::now());
        Ok(listed)
    }

    async fn acquire(&self, run: &mut Run) -> bool {
        let granted = self.ctx.rate_limiter.lock().await.try_acquire(Utc::now());
        if granted {
            run.api_calls_made += 1;
        }
        granted
    }
}

/// Sports matching `filter`, or all of them with major sports first. Either
/// way at most `max_sports`.
fn select_sports(mut sports: Vec<Sport>, filter: Option<&str>, max_sports: usize) -> Vec<Sport> {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        Some(filter) => sports.retain(|s| s.matches_filter(filter)),
        None => sports.sort_by_key(|s| !s.base_sport().is_major()),
    }
    sports.truncate(max_sports);
    sports
}
