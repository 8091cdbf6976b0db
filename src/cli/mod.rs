use anyhow::{anyhow, Result};
use chrono::Utc;
use std::collections::BTreeMap;

use crate::config::Settings;
use crate::models::DataSource;
use crate::services::{fallback_sports, AppContext, EventStatus, FetchOrchestrator, RefreshFilters};

/// Run one refresh against the provider and print what came back.
pub async fn fetch_games(settings: Settings, sport: Option<String>, status: EventStatus) -> Result<()> {
    let ctx = AppContext::from_settings(settings)?;

    match &sport {
        Some(sport) => println!("📥 Fetching {} games...", sport),
        None => println!("📥 Fetching games for all sports..."),
    }

    let filters = RefreshFilters { sport, status };
    let outcome = FetchOrchestrator::new(&ctx)
        .refresh(&filters)
        .await
        .map_err(|e| anyhow!("refresh failed: {}", e))?;

    let synthetic = outcome
        .games
        .iter()
        .filter(|g| g.data_source != DataSource::Provider)
        .count();
    println!(
        "✅ {} games from {} sports ({} API calls, {} with estimated odds)",
        outcome.games.len(),
        outcome.sports_processed,
        outcome.api_calls_made,
        synthetic
    );
    if let Some(reason) = outcome.truncated {
        println!("⚠️  Refresh stopped early: {:?}", reason);
    }

    let mut by_league: BTreeMap<&str, usize> = BTreeMap::new();
    for game in &outcome.games {
        *by_league.entry(game.league.as_str()).or_default() += 1;
    }
    for (league, count) in &by_league {
        println!("   {:<30} {}", league, count);
    }

    println!("\n🎯 Next games:");
    for game in outcome.games.iter().take(10) {
        let prices = game
            .bookmakers
            .first()
            .and_then(|b| b.markets.first())
            .map(|m| {
                m.outcomes
                    .iter()
                    .map(|o| format!("{:.2}", o.price))
                    .collect::<Vec<_>>()
                    .join(" / ")
            })
            .unwrap_or_default();
        println!(
            "   {} {} vs {} [{}]{}",
            game.commence_time.format("%Y-%m-%d %H:%M"),
            game.home_team,
            game.away_team,
            prices,
            if game.is_live { " LIVE" } else { "" }
        );
    }

    for issue in &outcome.errors {
        println!("❌ {}: {}", issue.source, issue.error);
    }

    let status = ctx.rate_limit_status(Utc::now()).await;
    println!(
        "\nRate limit: {} left this hour, {} this minute",
        status.remaining_hour, status.remaining_minute
    );

    Ok(())
}

/// Print the provider's sports list, or the built-in list if it is unreachable.
pub async fn list_sports(settings: Settings) -> Result<()> {
    let ctx = AppContext::from_settings(settings)?;

    let listed = ctx
        .list_provider_sports()
        .await
        .map_err(|e| anyhow!("cannot list sports: {}", e))?;
    let sports = match listed {
        Some(sports) if !sports.is_empty() => sports,
        _ => {
            println!("⚠️  Sports list unavailable, showing fallback list");
            fallback_sports()
        }
    };

    println!("🏟️  {} sports:", sports.len());
    for sport in &sports {
        println!(
            "   {:<40} {:<30} {}{}",
            sport.key,
            sport.league_label(),
            sport.base_sport().as_str(),
            if sport.active { "" } else { " (inactive)" }
        );
    }

    Ok(())
}
