use crate::domain::stock::Stock;
use serde::{Deserialize, Serialize};

/// A scored stock, as returned by the recommendation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub stock: Stock,
    pub score: f64,
    pub reason: String,
    #[serde(
        rename = "target_increase_percent",
        default,
        skip_serializing_if = "is_zero"
    )]
    pub target_increase: f64,
}

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

#[cfg(test)]
mod tests {
    use super::Recommendation;
    use crate::domain::stock::Stock;
    use chrono::Utc;

    fn stock() -> Stock {
        Stock {
            id: 1,
            ticker: "AAPL".to_string(),
            company: "Apple Inc.".to_string(),
            action_id: None,
            action: "upgraded by".to_string(),
            brokerage_id: None,
            brokerage: String::new(),
            rating_from_id: None,
            rating_from: String::new(),
            rating_to_id: None,
            rating_to: "Buy".to_string(),
            target_from: "$200.00".to_string(),
            target_to: "$244.00".to_string(),
            time: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn zero_target_increase_is_omitted_from_json() {
        let rec = Recommendation {
            stock: stock(),
            score: 5.0,
            reason: "Positive outlook".to_string(),
            target_increase: 0.0,
        };

        let value = serde_json::to_value(&rec).unwrap();
        assert!(value.get("target_increase_percent").is_none());
        assert_eq!(value["reason"], "Positive outlook");
    }

    #[test]
    fn nonzero_target_increase_uses_the_external_field_name() {
        let rec = Recommendation {
            stock: stock(),
            score: 5.0,
            reason: "22.0% price target increase".to_string(),
            target_increase: 22.0,
        };

        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["target_increase_percent"], 22.0);
    }

    #[test]
    fn empty_catalog_names_are_omitted_from_the_nested_stock() {
        let rec = Recommendation {
            stock: stock(),
            score: 5.0,
            reason: "Positive outlook".to_string(),
            target_increase: 0.0,
        };

        let value = serde_json::to_value(&rec).unwrap();
        assert!(value["stock"].get("brokerage").is_none());
        assert_eq!(value["stock"]["action"], "upgraded by");
    }
}
