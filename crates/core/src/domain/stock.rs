use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One analyst rating event as delivered by the external feed, before it
/// has been persisted. Catalog fields are free text exactly as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockEvent {
    pub ticker: String,
    pub company: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub brokerage: String,
    #[serde(default)]
    pub rating_from: String,
    #[serde(default)]
    pub rating_to: String,
    #[serde(default)]
    pub target_from: String,
    #[serde(default)]
    pub target_to: String,
    pub time: DateTime<Utc>,
}

/// A persisted rating event with its storage identity and the catalog names
/// joined in. Name fields are empty strings when the foreign key is null,
/// and empty names are left out of the JSON representation. Ids are
/// serialized as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Stock {
    #[serde(with = "crate::domain::id_string")]
    pub id: i64,
    pub ticker: String,
    pub company: String,
    #[serde(
        default,
        with = "crate::domain::id_string::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub action_id: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(
        default,
        with = "crate::domain::id_string::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub brokerage_id: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub brokerage: String,
    #[serde(
        default,
        with = "crate::domain::id_string::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating_from_id: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rating_from: String,
    #[serde(
        default,
        with = "crate::domain::id_string::opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating_to_id: Option<i64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rating_to: String,
    #[serde(default)]
    pub target_from: String,
    #[serde(default)]
    pub target_to: String,
    pub time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for the stock list endpoint. `limit == 0` means "no explicit
/// limit"; callers are expected to fill in their own default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StockFilter {
    pub ticker: Option<String>,
    pub company: Option<String>,
    pub brokerage: Option<String>,
    pub action: Option<String>,
    pub rating_from: Option<String>,
    pub rating_to: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::Stock;
    use chrono::Utc;

    fn stock() -> Stock {
        Stock {
            id: 42,
            ticker: "AAPL".to_string(),
            company: "Apple Inc.".to_string(),
            action_id: Some(7),
            action: "upgraded by".to_string(),
            brokerage_id: None,
            brokerage: String::new(),
            rating_from_id: None,
            rating_from: String::new(),
            rating_to_id: Some(3),
            rating_to: "Buy".to_string(),
            target_from: "$200.00".to_string(),
            target_to: "$244.00".to_string(),
            time: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn ids_serialize_as_json_strings() {
        let value = serde_json::to_value(stock()).unwrap();
        assert_eq!(value["id"], "42");
        assert_eq!(value["action_id"], "7");
        assert_eq!(value["rating_to_id"], "3");
        // Null foreign keys are omitted entirely, not emitted as null.
        assert!(value.get("brokerage_id").is_none());
    }

    #[test]
    fn string_ids_round_trip_through_deserialization() {
        let original = stock();
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Stock = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
