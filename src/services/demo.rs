use chrono::{DateTime, Duration, Utc};

use crate::models::{BaseSport, DataSource, Game, GameStatus};
use crate::services::normalizer::GameNormalizer;
use crate::utils::is_live;

struct DemoFixture {
    sport_key: &'static str,
    group: &'static str,
    league: &'static str,
    home: &'static str,
    away: &'static str,
    /// Kick-off relative to now; negative means already started.
    starts_in_minutes: i64,
}

const DEMO_FIXTURES: &[DemoFixture] = &[
    DemoFixture {
        sport_key: "soccer_epl",
        group: "Soccer",
        league: "EPL",
        home: "Arsenal",
        away: "Chelsea",
        starts_in_minutes: -35,
    },
    DemoFixture {
        sport_key: "basketball_nba",
        group: "Basketball",
        league: "NBA",
        home: "Boston Celtics",
        away: "Milwaukee Bucks",
        starts_in_minutes: 150,
    },
    DemoFixture {
        sport_key: "soccer_spain_la_liga",
        group: "Soccer",
        league: "La Liga",
        home: "Real Madrid",
        away: "Sevilla",
        starts_in_minutes: 60 * 20,
    },
    DemoFixture {
        sport_key: "americanfootball_nfl",
        group: "American Football",
        league: "NFL",
        home: "Kansas City Chiefs",
        away: "Buffalo Bills",
        starts_in_minutes: 60 * 24 * 3,
    },
    DemoFixture {
        sport_key: "tennis_atp",
        group: "Tennis",
        league: "ATP",
        home: "Jannik Sinner",
        away: "Carlos Alcaraz",
        starts_in_minutes: 60 * 24 * 5,
    },
    DemoFixture {
        sport_key: "icehockey_nhl",
        group: "Ice Hockey",
        league: "NHL",
        home: "Toronto Maple Leafs",
        away: "Montreal Canadiens",
        starts_in_minutes: 60 * 24 * 12,
    },
];

/// Fixed, clearly fake games served only when `DEMO_FALLBACK` is on and
/// nothing real or stale is available.
pub fn demo_games(normalizer: &GameNormalizer, now: DateTime<Utc>) -> Vec<Game> {
    DEMO_FIXTURES
        .iter()
        .enumerate()
        .map(|(i, fixture)| {
            let sport = BaseSport::from_sport_key(fixture.sport_key);
            let commence_time = now + Duration::minutes(fixture.starts_in_minutes);
            let live = is_live(commence_time, now);
            Game {
                id: format!("demo_{}", i + 1),
                sport,
                sport_key: fixture.sport_key.to_string(),
                sport_group: fixture.group.to_string(),
                league: fixture.league.to_string(),
                home_team: fixture.home.to_string(),
                away_team: fixture.away.to_string(),
                commence_time,
                is_live: live,
                status: if live { GameStatus::Live } else { GameStatus::Upcoming },
                bookmakers: vec![normalizer.synthetic_bookmaker(fixture.home, fixture.away, sport, now)],
                data_source: DataSource::Demo,
                fetched_at: now,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::FixedOddsSynthesizer;
    use std::sync::Arc;

    #[test]
    fn test_demo_games_are_flagged_and_well_formed() {
        let normalizer = GameNormalizer::new(Arc::new(FixedOddsSynthesizer), 5, true);
        let now = Utc::now();
        let games = demo_games(&normalizer, now);

        assert_eq!(games.len(), DEMO_FIXTURES.len());
        assert!(games.iter().all(|g| g.data_source == DataSource::Demo));
        assert!(games[0].is_live);
        assert!(!games[1].is_live);
        for game in &games {
            let outcomes = &game.bookmakers[0].markets[0].outcomes;
            assert_eq!(outcomes.len() == 3, game.sport.is_draw_eligible(), "{}", game.sport_key);
        }
    }
}
