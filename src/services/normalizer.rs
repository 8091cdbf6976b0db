use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::models::{BaseSport, Bookmaker, DataSource, Game, GameStatus, Market, Outcome, Sport};
use crate::utils::{
    first_price, first_string, first_timestamp, is_live, names_match, round_price, slugify,
};

// ── Provider field aliases, highest priority first ──────────────────────────

const ID_KEYS: &[&str] = &["id", "event_id", "eventId"];
const HOME_KEYS: &[&str] = &["home_team", "homeTeam", "home", "home_name", "team1"];
const AWAY_KEYS: &[&str] = &["away_team", "awayTeam", "away", "away_name", "team2"];
const START_KEYS: &[&str] = &["commence_time", "commenceTime", "start_time", "startTime", "date"];
const LEAGUE_KEYS: &[&str] = &["league", "sport_title", "competition"];
const UPDATED_KEYS: &[&str] = &["last_update", "lastUpdate", "updatedAt", "updated_at"];

const H2H_MARKETS: &[&str] = &["h2h", "ml", "1x2", "moneyline", "match winner", "winner", "3way"];
const DRAW_NAMES: &[&str] = &["draw", "tie", "x"];
const PLACEHOLDER_TEAMS: &[&str] = &["home", "away", "tbd"];

const SYNTHETIC_KEY: &str = "synthetic";
const SYNTHETIC_TITLE: &str = "Estimated Odds";

// ── Synthetic odds ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct H2hPrices {
    pub home: f64,
    pub away: f64,
    pub draw: Option<f64>,
}

/// Source of stand-in odds for games the provider returned none for.
pub trait OddsSynthesizer: Send + Sync {
    fn synthesize(&self, draw_eligible: bool) -> H2hPrices;
}

/// Uniform prices: home/away in [1.6, 3.5], draw in [2.8, 4.2], 2 decimals.
pub struct RandomOddsSynthesizer;

impl OddsSynthesizer for RandomOddsSynthesizer {
    fn synthesize(&self, draw_eligible: bool) -> H2hPrices {
        H2hPrices {
            home: uniform_price(1.6, 3.5),
            away: uniform_price(1.6, 3.5),
            draw: draw_eligible.then(|| uniform_price(2.8, 4.2)),
        }
    }
}

fn uniform_price(low: f64, high: f64) -> f64 {
    round_price(low + (high - low) * rand::random::<f64>()).clamp(low, high)
}

// ── Odds payload parsers ────────────────────────────────────────────────────

/// What a parser needs to know about the game its odds belong to.
struct OddsContext<'a> {
    home: &'a str,
    away: &'a str,
    sport: BaseSport,
    now: DateTime<Utc>,
}

type OddsParser = fn(&Value, &OddsContext) -> Option<Vec<Bookmaker>>;

/// Upstream odds shapes, tried in order. Every parser that recognises the
/// payload contributes bookmakers.
const ODDS_PARSERS: &[(&str, OddsParser)] = &[
    ("keyed_map", parse_keyed_bookmakers),
    ("bookmaker_list", parse_bookmaker_list),
    ("single_odds", parse_single_odds),
];

/// `{"bookmakers": {"Bet365": [{"name": "ML", "odds": [{"home": "1.85", "draw": "3.4", "away": "4.2"}]}]}}`
fn parse_keyed_bookmakers(payload: &Value, ctx: &OddsContext) -> Option<Vec<Bookmaker>> {
    let books = payload.get("bookmakers")?.as_object()?;

    let parsed: Vec<Bookmaker> = books
        .iter()
        .filter_map(|(name, markets)| {
            let markets: Vec<&Value> = match markets {
                Value::Array(items) => items.iter().collect(),
                Value::Object(_) => vec![markets],
                _ => return None,
            };
            let market: &Value = markets
                .iter()
                .find(|m| first_string(m, &["name", "key"]).is_some_and(|n| is_h2h(&n)))
                .or_else(|| markets.first())
                .copied()?;
            let odds = market
                .get("odds")
                .and_then(|o| o.as_array())
                .and_then(|o| o.first())
                .unwrap_or(market);
            let prices = H2hPrices {
                home: first_price(odds, &["home", "1"])?,
                away: first_price(odds, &["away", "2"])?,
                draw: first_price(odds, &["draw", "x", "X"]),
            };
            let last_update = first_timestamp(market, UPDATED_KEYS).unwrap_or(ctx.now);
            build_bookmaker(&slugify(name), name, prices, ctx, last_update)
        })
        .collect();

    (!parsed.is_empty()).then_some(parsed)
}

/// `{"bookmakers": [{"key", "title", "last_update", "markets": [{"key": "h2h", "outcomes": [{"name", "price"}]}]}]}`
fn parse_bookmaker_list(payload: &Value, ctx: &OddsContext) -> Option<Vec<Bookmaker>> {
    let books = payload.get("bookmakers")?.as_array()?;

    let parsed: Vec<Bookmaker> = books
        .iter()
        .filter_map(|book| {
            let title = first_string(book, &["title", "name", "key"])?;
            let key = first_string(book, &["key"]).unwrap_or_else(|| slugify(&title));
            let market = book
                .get("markets")?
                .as_array()?
                .iter()
                .find(|m| first_string(m, &["key", "name"]).is_some_and(|n| is_h2h(&n)))?;
            let prices = resolve_outcomes(market.get("outcomes")?.as_array()?, ctx)?;
            let last_update = first_timestamp(market, UPDATED_KEYS)
                .or_else(|| first_timestamp(book, UPDATED_KEYS))
                .unwrap_or(ctx.now);
            let bookmaker = build_bookmaker(&key, &title, prices, ctx, last_update);
            if bookmaker.is_none() {
                tracing::debug!("Odds: skipping malformed bookmaker entry '{}'", key);
            }
            bookmaker
        })
        .collect();

    (!parsed.is_empty()).then_some(parsed)
}

/// `{"odds": {"home": 1.9, "draw": 3.2, "away": 4.0}}` or the same fields
/// (`home_odds`, ...) at the top level.
fn parse_single_odds(payload: &Value, ctx: &OddsContext) -> Option<Vec<Bookmaker>> {
    let odds = payload
        .get("odds")
        .filter(|o| o.is_object())
        .unwrap_or(payload);
    let prices = H2hPrices {
        home: first_price(odds, &["home", "home_odds", "homeOdds", "1"])?,
        away: first_price(odds, &["away", "away_odds", "awayOdds", "2"])?,
        draw: first_price(odds, &["draw", "draw_odds", "drawOdds", "x", "X"]),
    };
    let title = first_string(payload, &["bookmaker", "source"]).unwrap_or_else(|| "Consensus".to_string());
    let last_update = first_timestamp(odds, UPDATED_KEYS).unwrap_or(ctx.now);
    build_bookmaker(&slugify(&title), &title, prices, ctx, last_update).map(|b| vec![b])
}

fn is_h2h(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    H2H_MARKETS.contains(&name.as_str())
}

/// Map named outcomes to home/away/draw. Exact names win; fuzzy matches are
/// only accepted when they point at exactly one side.
fn resolve_outcomes(outcomes: &[Value], ctx: &OddsContext) -> Option<H2hPrices> {
    let (mut home, mut away, mut draw) = (None, None, None);

    for outcome in outcomes {
        let (Some(name), Some(price)) = (
            first_string(outcome, &["name"]),
            first_price(outcome, &["price", "odds"]),
        ) else {
            continue;
        };

        if DRAW_NAMES.contains(&name.to_lowercase().as_str()) {
            draw = Some(price);
        } else if name.eq_ignore_ascii_case(ctx.home) {
            home = Some(price);
        } else if name.eq_ignore_ascii_case(ctx.away) {
            away = Some(price);
        } else {
            match (names_match(&name, ctx.home), names_match(&name, ctx.away)) {
                (true, false) => home = home.or(Some(price)),
                (false, true) => away = away.or(Some(price)),
                _ => tracing::debug!("Odds: unmatched outcome '{}'", name),
            }
        }
    }

    Some(H2hPrices {
        home: home?,
        away: away?,
        draw,
    })
}

/// Canonical h2h market: [home, away] or [home, away, Draw] by draw eligibility.
fn h2h_market(prices: H2hPrices, ctx: &OddsContext, last_update: DateTime<Utc>) -> Option<Market> {
    let mut outcomes = vec![
        Outcome {
            name: ctx.home.to_string(),
            price: round_price(prices.home),
        },
        Outcome {
            name: ctx.away.to_string(),
            price: round_price(prices.away),
        },
    ];
    if ctx.sport.is_draw_eligible() {
        outcomes.push(Outcome {
            name: "Draw".to_string(),
            price: round_price(prices.draw?),
        });
    }

    Some(Market {
        key: "h2h".to_string(),
        last_update,
        outcomes,
    })
}

fn build_bookmaker(
    key: &str,
    title: &str,
    prices: H2hPrices,
    ctx: &OddsContext,
    last_update: DateTime<Utc>,
) -> Option<Bookmaker> {
    if key.is_empty() {
        return None;
    }
    Some(Bookmaker {
        key: key.to_string(),
        title: title.to_string(),
        last_update,
        markets: vec![h2h_market(prices, ctx, last_update)?],
    })
}

// ── GameNormalizer ──────────────────────────────────────────────────────────

pub struct GameNormalizer {
    synthesizer: Arc<dyn OddsSynthesizer>,
    max_bookmakers: usize,
    allow_synthetic: bool,
}

impl GameNormalizer {
    pub fn new(synthesizer: Arc<dyn OddsSynthesizer>, max_bookmakers: usize, allow_synthetic: bool) -> Self {
        Self {
            synthesizer,
            max_bookmakers: max_bookmakers.max(1),
            allow_synthetic,
        }
    }

    /// Map one raw provider event (plus its separately fetched odds, if any)
    /// to a `Game`. Returns `None` for events that cannot be shown: no id, a
    /// missing or placeholder team, no start time, or no odds while synthetic
    /// odds are disabled.
    pub fn to_game(
        &self,
        raw_event: &Value,
        odds: Option<&Value>,
        sport: &Sport,
        now: DateTime<Utc>,
    ) -> Option<Game> {
        let Some(id) = event_id(raw_event) else {
            tracing::debug!("Normalizer: dropping event without id");
            return None;
        };
        let home = first_string(raw_event, HOME_KEYS).or_else(|| team_from_list(raw_event, 0));
        let away = first_string(raw_event, AWAY_KEYS).or_else(|| team_from_list(raw_event, 1));
        let (Some(home), Some(away)) = (home, away) else {
            tracing::debug!("Normalizer: dropping event {} without both teams", id);
            return None;
        };
        if is_placeholder(&home) || is_placeholder(&away) {
            tracing::debug!("Normalizer: dropping event {} with placeholder teams", id);
            return None;
        }
        let Some(commence_time) = first_timestamp(raw_event, START_KEYS) else {
            tracing::debug!("Normalizer: dropping event {} without start time", id);
            return None;
        };

        let base_sport = match sport.base_sport() {
            BaseSport::Unknown => first_string(raw_event, &["sport_key", "sport"])
                .map(|s| BaseSport::from_sport_key(&s))
                .unwrap_or(BaseSport::Unknown),
            known => known,
        };

        let mut bookmakers = match odds {
            Some(payload) => self.normalize_odds(payload, &home, &away, base_sport, now),
            None => Vec::new(),
        };
        if bookmakers.is_empty() {
            bookmakers = self.normalize_odds(raw_event, &home, &away, base_sport, now);
        }

        let data_source = if bookmakers.is_empty() {
            if !self.allow_synthetic {
                tracing::debug!("Normalizer: dropping event {} without odds", id);
                return None;
            }
            bookmakers.push(self.synthetic_bookmaker(&home, &away, base_sport, now));
            DataSource::Synthetic
        } else {
            DataSource::Provider
        };

        let live = is_live(commence_time, now);
        Some(Game {
            id,
            sport: base_sport,
            sport_key: sport.key.clone(),
            sport_group: sport.group.clone(),
            league: first_string(raw_event, LEAGUE_KEYS).unwrap_or_else(|| sport.league_label()),
            home_team: home,
            away_team: away,
            commence_time,
            is_live: live,
            status: if live { GameStatus::Live } else { GameStatus::Upcoming },
            bookmakers,
            data_source,
            fetched_at: now,
        })
    }

    /// Parse every recognised odds shape in `payload`, skipping malformed
    /// bookmakers, deduplicating by key and capping the result.
    pub fn normalize_odds(
        &self,
        payload: &Value,
        home: &str,
        away: &str,
        sport: BaseSport,
        now: DateTime<Utc>,
    ) -> Vec<Bookmaker> {
        let ctx = OddsContext { home, away, sport, now };
        let mut bookmakers: Vec<Bookmaker> = Vec::new();

        for (shape, parser) in ODDS_PARSERS {
            let Some(found) = parser(payload, &ctx) else {
                continue;
            };
            tracing::trace!("Odds: {} bookmakers parsed as {}", found.len(), shape);
            for bookmaker in found {
                if !bookmakers.iter().any(|b| b.key == bookmaker.key) {
                    bookmakers.push(bookmaker);
                }
            }
        }

        bookmakers.truncate(self.max_bookmakers);
        bookmakers
    }

    pub fn synthetic_bookmaker(
        &self,
        home: &str,
        away: &str,
        sport: BaseSport,
        now: DateTime<Utc>,
    ) -> Bookmaker {
        let ctx = OddsContext { home, away, sport, now };
        let mut prices = self.synthesizer.synthesize(sport.is_draw_eligible());
        // h2h_market needs a draw price for draw-eligible sports
        if sport.is_draw_eligible() && prices.draw.is_none() {
            prices.draw = RandomOddsSynthesizer.synthesize(true).draw;
        }
        let market = h2h_market(prices, &ctx, now).unwrap_or_else(|| Market {
            key: "h2h".to_string(),
            last_update: now,
            outcomes: Vec::new(),
        });
        Bookmaker {
            key: SYNTHETIC_KEY.to_string(),
            title: SYNTHETIC_TITLE.to_string(),
            last_update: now,
            markets: vec![market],
        }
    }
}

/// Provider event id, stringified when numeric.
pub fn event_id(raw_event: &Value) -> Option<String> {
    first_string(raw_event, ID_KEYS)
}

/// Events listed together with their odds need no separate odds call.
pub fn has_embedded_odds(raw_event: &Value) -> bool {
    raw_event
        .get("bookmakers")
        .is_some_and(|b| b.is_array() || b.is_object())
}

fn team_from_list(raw_event: &Value, index: usize) -> Option<String> {
    raw_event
        .get("teams")?
        .as_array()?
        .get(index)?
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn is_placeholder(team: &str) -> bool {
    PLACEHOLDER_TEAMS.contains(&team.trim().to_lowercase().as_str())
}
