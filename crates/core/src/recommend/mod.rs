//! Recommendation scorer: a pure, deterministic ranking over the latest
//! rating event per ticker. Each event gets a weighted composite of five
//! sub-scores (action, rating transition, target-price change, recency,
//! brokerage tier); malformed fields degrade to neutral contributions
//! rather than failing the batch.

mod tables;

use crate::domain::recommendation::Recommendation;
use crate::domain::stock::Stock;
use chrono::{DateTime, Utc};

pub const DEFAULT_LIMIT: usize = 10;

const ACTION_WEIGHT: f64 = 0.30;
const RATING_WEIGHT: f64 = 0.25;
const TARGET_WEIGHT: f64 = 0.20;
const RECENCY_WEIGHT: f64 = 0.15;
const BROKERAGE_WEIGHT: f64 = 0.10;

const HIGHLIGHT_THRESHOLD: f64 = 3.0;
const TARGET_HIGHLIGHT_PERCENT: f64 = 5.0;

/// Scores `events` against the current wall clock and returns the top
/// `limit` recommendations. `limit == 0` falls back to [`DEFAULT_LIMIT`];
/// callers owning an upper bound (the HTTP layer caps at 50) apply it
/// before calling.
pub fn score(events: &[Stock], limit: usize) -> Vec<Recommendation> {
    score_at(events, limit, Utc::now())
}

/// Same as [`score`] with an explicit clock. The clock is sampled once per
/// batch, so every event in a call sees the same "now".
pub fn score_at(events: &[Stock], limit: usize, now: DateTime<Utc>) -> Vec<Recommendation> {
    let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };

    let mut recommendations: Vec<Recommendation> =
        events.iter().map(|stock| score_event(stock, now)).collect();

    // Stable: equal scores keep their input order.
    recommendations.sort_by(|a, b| b.score.total_cmp(&a.score));
    recommendations.truncate(limit);
    recommendations
}

fn score_event(stock: &Stock, now: DateTime<Utc>) -> Recommendation {
    let mut score = 0.0;
    let mut highlights: Vec<String> = Vec::new();

    let action_score = tables::action_score(&stock.action);
    score += action_score * ACTION_WEIGHT;
    if action_score > HIGHLIGHT_THRESHOLD {
        highlights.push(format!("Recent {}", stock.action));
    }

    let rating_score = rating_transition_score(&stock.rating_from, &stock.rating_to);
    score += rating_score * RATING_WEIGHT;
    if rating_score > HIGHLIGHT_THRESHOLD {
        highlights.push(format!("Rating improved to {}", stock.rating_to));
    }

    let target_increase = target_increase_percent(&stock.target_from, &stock.target_to);
    if target_increase != 0.0 {
        // 10% change = 5 points; clamp the sub-score before weighting.
        let target_score = (target_increase / 2.0).clamp(-10.0, 10.0);
        score += target_score * TARGET_WEIGHT;
        if target_increase > TARGET_HIGHLIGHT_PERCENT {
            highlights.push(format!("{target_increase:.1}% price target increase"));
        } else if target_increase < -TARGET_HIGHLIGHT_PERCENT {
            highlights.push(format!("{target_increase:.1}% price target decrease"));
        }
    }

    score += recency_score(stock.time, now) * RECENCY_WEIGHT;

    let brokerage_score = tables::brokerage_score(&stock.brokerage);
    score += brokerage_score * BROKERAGE_WEIGHT;
    if brokerage_score >= 8.0 && !stock.brokerage.is_empty() {
        highlights.push(format!("Rated by {}", stock.brokerage));
    }

    let reason = if highlights.is_empty() {
        "Positive outlook".to_string()
    } else {
        highlights.join("; ")
    };

    Recommendation {
        stock: stock.clone(),
        score,
        reason,
        target_increase,
    }
}

/// Rewards the destination rating twice: once for its absolute value
/// (scaled to 2..=10) and once for the transition delta. Downgrades can
/// push the sub-score negative.
fn rating_transition_score(rating_from: &str, rating_to: &str) -> f64 {
    let from = tables::rating_value(rating_from);
    let to = tables::rating_value(rating_to);
    to * 2.0 + (to - from) * 2.0
}

/// Percentage change between the two target prices, 0 when either side is
/// unparseable or non-positive.
fn target_increase_percent(target_from: &str, target_to: &str) -> f64 {
    let from = parse_price(target_from);
    let to = parse_price(target_to);
    if from <= 0.0 || to <= 0.0 {
        return 0.0;
    }
    (to - from) / from * 100.0
}

/// Extracts the numeric value from price strings like "$200.00",
/// "$2,700.00" or "$85". Anything unparseable maps to 0.
fn parse_price(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | ',') && !c.is_whitespace())
        .collect();
    cleaned.parse().unwrap_or(0.0)
}

fn recency_score(event_time: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - event_time).num_seconds() as f64 / 86_400.0;
    if days <= 1.0 {
        10.0
    } else if days <= 7.0 {
        8.0
    } else if days <= 30.0 {
        6.0
    } else if days <= 90.0 {
        4.0
    } else {
        2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 26, 12, 0, 0).unwrap()
    }

    fn event(ticker: &str, time: DateTime<Utc>) -> Stock {
        Stock {
            id: 0,
            ticker: ticker.to_string(),
            company: format!("{ticker} Inc."),
            action_id: None,
            action: String::new(),
            brokerage_id: None,
            brokerage: String::new(),
            rating_from_id: None,
            rating_from: String::new(),
            rating_to_id: None,
            rating_to: String::new(),
            target_from: String::new(),
            target_to: String::new(),
            time,
            created_at: time,
            updated_at: time,
        }
    }

    #[test]
    fn parse_price_handles_currency_symbols_and_separators() {
        assert_eq!(parse_price("$200.00"), 200.0);
        assert_eq!(parse_price("$2,700.00"), 2700.0);
        assert_eq!(parse_price("$85"), 85.0);
        assert_eq!(parse_price(" $1 250.50 "), 1250.5);
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("n/a"), 0.0);
    }

    #[test]
    fn target_increase_is_zero_for_unparseable_or_non_positive_prices() {
        assert_eq!(target_increase_percent("n/a", "$100"), 0.0);
        assert_eq!(target_increase_percent("$100", ""), 0.0);
        assert_eq!(target_increase_percent("$0", "$100"), 0.0);
        assert_eq!(target_increase_percent("$-5", "$100"), 0.0);
        assert_eq!(target_increase_percent("$200.00", "$244.00"), 22.0);
    }

    #[test]
    fn rating_transition_rewards_destination_and_delta() {
        // Neutral (3) -> Buy (4): 4*2 + (4-3)*2 = 10.
        assert_eq!(rating_transition_score("Neutral", "Buy"), 10.0);
        // Buy (4) -> Sell (1): 1*2 + (1-4)*2 = -4.
        assert_eq!(rating_transition_score("Buy", "Sell"), -4.0);
        // Unchanged neutral: 3*2 = 6.
        assert_eq!(rating_transition_score("Hold", "Hold"), 6.0);
        // Unknown terms default to neutral on both sides.
        assert_eq!(rating_transition_score("Whatever", ""), 6.0);
    }

    #[test]
    fn recency_buckets() {
        let now = fixed_now();
        assert_eq!(recency_score(now - Duration::hours(2), now), 10.0);
        assert_eq!(recency_score(now - Duration::days(3), now), 8.0);
        assert_eq!(recency_score(now - Duration::days(20), now), 6.0);
        assert_eq!(recency_score(now - Duration::days(60), now), 4.0);
        assert_eq!(recency_score(now - Duration::days(400), now), 2.0);
    }

    #[test]
    fn composite_score_for_a_strong_upgrade_event() {
        let now = fixed_now();
        let mut stock = event("AAPL", now - Duration::hours(2));
        stock.action = "upgrade".to_string();
        stock.rating_from = "Neutral".to_string();
        stock.rating_to = "Buy".to_string();
        stock.target_from = "$200.00".to_string();
        stock.target_to = "$244.00".to_string();
        stock.brokerage = "Goldman Sachs".to_string();

        let recs = score_at(&[stock], 10, now);
        assert_eq!(recs.len(), 1);

        // 10*0.30 + 10*0.25 + clamp(11,10)*0.20 + 10*0.15 + 10*0.10 = 10.0
        assert!((recs[0].score - 10.0).abs() < 1e-9);
        assert_eq!(recs[0].target_increase, 22.0);
        assert_eq!(
            recs[0].reason,
            "Recent upgrade; Rating improved to Buy; 22.0% price target increase; Rated by Goldman Sachs"
        );
    }

    #[test]
    fn price_target_decrease_gets_its_own_highlight() {
        let now = fixed_now();
        let mut stock = event("XYZ", now - Duration::hours(2));
        stock.target_from = "$100.00".to_string();
        stock.target_to = "$90.00".to_string();

        let recs = score_at(&[stock], 10, now);
        assert!(recs[0].reason.contains("-10.0% price target decrease"));
        assert_eq!(recs[0].target_increase, -10.0);
    }

    #[test]
    fn reason_falls_back_to_positive_outlook_when_nothing_fires() {
        let now = fixed_now();
        let mut stock = event("DUD", now - Duration::days(5));
        stock.action = "downgraded by".to_string(); // 2, below threshold
        stock.rating_from = "Hold".to_string();
        stock.rating_to = "Sell".to_string(); // 1*2 + (1-3)*2 = -2
        stock.brokerage = "Zacks Research".to_string(); // default tier 6

        let recs = score_at(&[stock], 10, now);
        assert_eq!(recs[0].reason, "Positive outlook");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(score_at(&[], 10, fixed_now()).is_empty());
    }

    #[test]
    fn zero_limit_falls_back_to_the_default() {
        let now = fixed_now();
        let events: Vec<Stock> = (0..15)
            .map(|i| event(&format!("T{i:02}"), now - Duration::days(i)))
            .collect();

        let recs = score_at(&events, 0, now);
        assert_eq!(recs.len(), DEFAULT_LIMIT);
    }

    #[test]
    fn result_length_is_bounded_by_the_input() {
        let now = fixed_now();
        let events: Vec<Stock> = (0..3)
            .map(|i| event(&format!("T{i}"), now))
            .collect();

        assert_eq!(score_at(&events, 10, now).len(), 3);
        assert_eq!(score_at(&events, 2, now).len(), 2);
    }

    #[test]
    fn output_is_sorted_descending_with_ties_in_input_order() {
        let now = fixed_now();

        // One clearly stronger event in the middle, identical events around it.
        let mut strong = event("WIN", now - Duration::hours(1));
        strong.action = "upgrade".to_string();

        let tied_a = event("AAA", now - Duration::hours(1));
        let tied_b = event("BBB", now - Duration::hours(1));

        let recs = score_at(&[tied_a, strong, tied_b], 10, now);

        assert_eq!(recs[0].stock.ticker, "WIN");
        // The two identical events keep their relative input order.
        assert_eq!(recs[1].stock.ticker, "AAA");
        assert_eq!(recs[2].stock.ticker, "BBB");
        assert!(recs[0].score >= recs[1].score && recs[1].score >= recs[2].score);
    }

    #[test]
    fn scoring_is_deterministic_for_a_fixed_clock() {
        let now = fixed_now();
        let mut stock = event("AAPL", now - Duration::days(2));
        stock.action = "target raised by".to_string();
        stock.brokerage = "Barclays".to_string();
        stock.target_from = "$50".to_string();
        stock.target_to = "$60".to_string();
        let events = vec![stock];

        let first = score_at(&events, 5, now);
        let second = score_at(&events, 5, now);

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.score, b.score);
            assert_eq!(a.reason, b.reason);
            assert_eq!(a.stock.ticker, b.stock.ticker);
        }
    }

    #[test]
    fn inputs_are_not_mutated() {
        let now = fixed_now();
        let mut stock = event("AAPL", now);
        stock.action = "upgrade".to_string();
        let events = vec![stock.clone()];

        let _ = score_at(&events, 10, now);
        assert_eq!(events[0], stock);
    }
}
