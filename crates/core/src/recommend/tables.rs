//! Static lookup tables for the recommendation scorer. All matching is done
//! on lower-cased, trimmed input; unknown values fall back to a neutral
//! score instead of failing.

pub(crate) const NEUTRAL_ACTION_SCORE: f64 = 5.0;
pub(crate) const NEUTRAL_RATING_VALUE: f64 = 3.0;
pub(crate) const NEUTRAL_BROKERAGE_SCORE: f64 = 5.0;
pub(crate) const DEFAULT_BROKERAGE_SCORE: f64 = 6.0;

pub(crate) struct ActionRule {
    pub score: f64,
    matches: fn(&str) -> bool,
}

/// Ordered substring rules for classifying the free-text action. Evaluated
/// top to bottom, first match wins, so "Upgraded price target" scores as an
/// upgrade rather than a target change.
const ACTION_RULES: &[ActionRule] = &[
    ActionRule {
        score: 10.0,
        matches: |a| a.contains("upgrade"),
    },
    ActionRule {
        score: 8.0,
        matches: |a| a.contains("initiated") || a.contains("initiate"),
    },
    ActionRule {
        score: 7.0,
        matches: |a| a.contains("target") && a.contains("raised"),
    },
    ActionRule {
        score: 6.0,
        matches: |a| a.contains("reiterate") || a.contains("maintain"),
    },
    ActionRule {
        score: 3.0,
        matches: |a| a.contains("target") && a.contains("lowered"),
    },
    ActionRule {
        score: 2.0,
        matches: |a| a.contains("downgrade"),
    },
];

pub(crate) fn action_score(action: &str) -> f64 {
    let action = action.to_lowercase();
    ACTION_RULES
        .iter()
        .find(|rule| (rule.matches)(&action))
        .map(|rule| rule.score)
        .unwrap_or(NEUTRAL_ACTION_SCORE)
}

/// Ordinal values for the known analyst rating vocabulary, 5 = strongest
/// buy-side term, 1 = sell.
const RATING_VALUES: &[(&str, f64)] = &[
    ("strong-buy", 5.0),
    ("strong buy", 5.0),
    ("buy", 4.0),
    ("speculative buy", 4.0),
    ("overweight", 4.0),
    ("outperform", 4.0),
    ("market outperform", 4.0),
    ("sector outperform", 4.0),
    ("positive", 4.0),
    ("hold", 3.0),
    ("neutral", 3.0),
    ("in-line", 3.0),
    ("market perform", 3.0),
    ("sector perform", 3.0),
    ("equal weight", 3.0),
    ("equal-weight", 3.0),
    ("underweight", 2.0),
    ("underperform", 2.0),
    ("reduce", 2.0),
    ("sell", 1.0),
];

pub(crate) fn rating_value(rating: &str) -> f64 {
    let rating = rating.trim().to_lowercase();
    if rating.is_empty() {
        return NEUTRAL_RATING_VALUE;
    }
    RATING_VALUES
        .iter()
        .find(|(term, _)| *term == rating)
        .map(|(_, value)| *value)
        .unwrap_or(NEUTRAL_RATING_VALUE)
}

const TOP_TIER_BROKERAGES: &[&str] = &[
    "goldman sachs",
    "morgan stanley",
    "jp morgan",
    "jpmorgan",
    "barclays",
];

const MID_TIER_BROKERAGES: &[&str] = &[
    "citigroup",
    "credit suisse",
    "deutsche bank",
    "ubs",
    "wells fargo",
];

pub(crate) fn brokerage_score(brokerage: &str) -> f64 {
    let brokerage = brokerage.trim().to_lowercase();
    if brokerage.is_empty() {
        return NEUTRAL_BROKERAGE_SCORE;
    }
    if TOP_TIER_BROKERAGES.iter().any(|top| brokerage.contains(top)) {
        return 10.0;
    }
    if MID_TIER_BROKERAGES.iter().any(|mid| brokerage.contains(mid)) {
        return 8.0;
    }
    DEFAULT_BROKERAGE_SCORE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_wins_over_other_keywords_in_the_same_phrase() {
        // Contains both "upgrade" and "target"; the upgrade rule is first.
        assert_eq!(action_score("Upgraded price target"), 10.0);
    }

    #[test]
    fn action_rules_cover_the_known_phrases() {
        assert_eq!(action_score("initiated coverage"), 8.0);
        assert_eq!(action_score("Price Target Raised"), 7.0);
        assert_eq!(action_score("reiterated by"), 6.0);
        assert_eq!(action_score("maintained rating"), 6.0);
        assert_eq!(action_score("target lowered by"), 3.0);
        assert_eq!(action_score("downgraded by"), 2.0);
        assert_eq!(action_score("coverage adjusted"), NEUTRAL_ACTION_SCORE);
        assert_eq!(action_score(""), NEUTRAL_ACTION_SCORE);
    }

    #[test]
    fn rating_lookup_is_case_insensitive_and_trimmed() {
        assert_eq!(rating_value("Buy"), 4.0);
        assert_eq!(rating_value("  Strong-Buy  "), 5.0);
        assert_eq!(rating_value("SELL"), 1.0);
        assert_eq!(rating_value("Equal Weight"), 3.0);
        assert_eq!(rating_value("Underweight"), 2.0);
    }

    #[test]
    fn unknown_or_empty_rating_is_neutral() {
        assert_eq!(rating_value(""), NEUTRAL_RATING_VALUE);
        assert_eq!(rating_value("Gobbledygook"), NEUTRAL_RATING_VALUE);
    }

    #[test]
    fn brokerage_tiers_match_by_substring() {
        assert_eq!(brokerage_score("Goldman Sachs"), 10.0);
        assert_eq!(brokerage_score("The Goldman Sachs Group"), 10.0);
        assert_eq!(brokerage_score("JPMorgan Chase & Co."), 10.0);
        assert_eq!(brokerage_score("UBS Group"), 8.0);
        assert_eq!(brokerage_score("Wells Fargo & Company"), 8.0);
        assert_eq!(brokerage_score("Smalltown Securities"), DEFAULT_BROKERAGE_SCORE);
        assert_eq!(brokerage_score(""), NEUTRAL_BROKERAGE_SCORE);
    }
}
