use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

/// Games count as live from this long before their start time...
pub const LIVE_PRE_START_MINUTES: i64 = 5;
/// ...until this long after it, regardless of sport.
pub const LIVE_POST_START_HOURS: i64 = 3;

/// Live window is `[commence - 5m, commence + 3h)`.
pub fn is_live(commence_time: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let opens = commence_time - Duration::minutes(LIVE_PRE_START_MINUTES);
    let closes = commence_time + Duration::hours(LIVE_POST_START_HOURS);
    now >= opens && now < closes
}

/// Round decimal odds to 2 places
pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Lenient query-string flag: "1", "true", "yes", "on" and a bare `?flag` are true.
pub fn parse_flag(raw: Option<&str>) -> bool {
    match raw {
        Some(v) => matches!(
            v.trim().to_lowercase().as_str(),
            "" | "1" | "true" | "yes" | "on"
        ),
        None => false,
    }
}

/// Slug for bookmaker keys ("William Hill" -> "william_hill")
pub fn slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Fuzzy team-name match: normalises common suffixes, then accepts containment
/// either way or a Jaro-Winkler similarity of at least 0.92.
pub fn names_match(a: &str, b: &str) -> bool {
    let norm = |s: &str| -> String {
        s.to_lowercase()
            .replace('.', "")
            .replace('-', " ")
            .split_whitespace()
            .filter(|w| !matches!(*w, "fc" | "afc" | "sc" | "cf"))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let a = norm(a);
    let b = norm(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(&b) || b.contains(&a) || strsim::jaro_winkler(&a, &b) >= 0.92
}

/// First non-empty string among `keys`. Accepts plain strings, numbers, and
/// objects carrying a `name` field.
pub fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(as_text)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => value.get("name").and_then(as_text),
        _ => None,
    }
}

/// Decimal price from a number or a numeric string; must stay above 1.0
/// once rounded to 2 decimals.
pub fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (price.is_finite() && round_price(price) > 1.0).then_some(price)
}

/// First parseable price among `keys`.
pub fn first_price(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(parse_price)
}

/// RFC 3339 string or unix seconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|d| d.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n.as_i64().and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

pub fn first_timestamp(value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(parse_timestamp)
}
