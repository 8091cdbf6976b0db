use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::config::CacheConfig;
use crate::models::{Game, Sport};

/// Cache partition keyed by how soon games start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Live,
    Today,
    Week,
    LongTerm,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Live, Tier::Today, Tier::Week, Tier::LongTerm];

    /// Tier a game belongs to as of `now`. Live status wins over start time.
    pub fn classify(game: &Game, now: DateTime<Utc>) -> Tier {
        if game.is_live {
            return Tier::Live;
        }
        let until_start = game.commence_time - now;
        if until_start <= Duration::hours(24) {
            Tier::Today
        } else if until_start <= Duration::days(7) {
            Tier::Week
        } else {
            Tier::LongTerm
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            data,
            timestamp: now,
            expires: now + ttl,
        }
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.expires
    }
}

/// Games merged from one or more tiers, stamped with the oldest tier write.
#[derive(Debug, Clone)]
pub struct CachedGames {
    pub games: Vec<Game>,
    pub cached_at: DateTime<Utc>,
}

impl CachedGames {
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.cached_at).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierSummary {
    pub tier: Tier,
    pub games: usize,
    pub valid: bool,
    pub expires_in_seconds: i64,
}

/// In-memory game cache partitioned into tiers with their own TTLs, plus a
/// separately expiring sports list.
#[derive(Debug, Clone)]
pub struct TieredCache {
    config: CacheConfig,
    tiers: HashMap<Tier, CacheEntry<Vec<Game>>>,
    sports: Option<CacheEntry<Vec<Sport>>>,
}

impl TieredCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            tiers: HashMap::new(),
            sports: None,
        }
    }

    fn ttl(&self, tier: Tier) -> Duration {
        match tier {
            Tier::Live => self.config.live_ttl,
            Tier::Today => self.config.today_ttl,
            Tier::Week => self.config.week_ttl,
            Tier::LongTerm => self.config.long_term_ttl,
        }
    }

    /// Merge of every requested tier that has not expired, or `None` when
    /// none of them is valid.
    pub fn read(&self, tiers: &[Tier], now: DateTime<Utc>) -> Option<CachedGames> {
        self.collect(tiers, |entry| entry.is_valid(now))
    }

    /// Like `read` but ignores expiry. `None` only if no requested tier was
    /// ever written.
    pub fn read_stale(&self, tiers: &[Tier]) -> Option<CachedGames> {
        self.collect(tiers, |_| true)
    }

    fn collect<F>(&self, tiers: &[Tier], usable: F) -> Option<CachedGames>
    where
        F: Fn(&CacheEntry<Vec<Game>>) -> bool,
    {
        let entries: Vec<&CacheEntry<Vec<Game>>> = Tier::ALL
            .iter()
            .filter(|tier| tiers.contains(*tier))
            .filter_map(|tier| self.tiers.get(tier))
            .filter(|entry| usable(*entry))
            .collect();

        let cached_at = entries.iter().map(|e| e.timestamp).min()?;
        let mut games = dedupe(
            entries
                .into_iter()
                .flat_map(|entry| entry.data.iter().cloned())
                .collect(),
        );
        games.sort_by_key(|g| g.commence_time);

        Some(CachedGames { games, cached_at })
    }

    /// Partition `games` by start time and replace every tier wholesale,
    /// including tiers that end up empty.
    pub fn write(&mut self, games: &[Game], now: DateTime<Utc>) {
        let mut partitions: HashMap<Tier, Vec<Game>> =
            Tier::ALL.iter().map(|tier| (*tier, Vec::new())).collect();

        for game in dedupe(games.to_vec()) {
            partitions
                .entry(Tier::classify(&game, now))
                .or_default()
                .push(game);
        }

        for (tier, data) in partitions {
            tracing::debug!("Cache: {:?} tier <- {} games", tier, data.len());
            let entry = CacheEntry::new(data, now, self.ttl(tier));
            self.tiers.insert(tier, entry);
        }
    }

    pub fn read_sports(&self, now: DateTime<Utc>) -> Option<Vec<Sport>> {
        self.sports
            .as_ref()
            .filter(|entry| entry.is_valid(now))
            .map(|entry| entry.data.clone())
    }

    pub fn write_sports(&mut self, sports: Vec<Sport>, now: DateTime<Utc>) {
        self.sports = Some(CacheEntry::new(sports, now, self.config.sports_ttl));
    }

    pub fn summary(&self, now: DateTime<Utc>) -> Vec<TierSummary> {
        Tier::ALL
            .iter()
            .filter_map(|tier| {
                self.tiers.get(tier).map(|entry| TierSummary {
                    tier: *tier,
                    games: entry.data.len(),
                    valid: entry.is_valid(now),
                    expires_in_seconds: (entry.expires - now).num_seconds().max(0),
                })
            })
            .collect()
    }
}

/// Collapse games sharing `(home_team, away_team, commence_time)`, keeping the
/// first occurrence and the original order.
pub fn dedupe(games: Vec<Game>) -> Vec<Game> {
    let mut seen = HashSet::new();
    games
        .into_iter()
        .filter(|game| seen.insert(game.dedup_key()))
        .collect()
}
