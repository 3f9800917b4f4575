use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An analyst action (e.g. "upgraded by", "target raised by"). Ids are
/// serialized as strings, like the stock rows that reference them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Action {
    #[serde(with = "crate::domain::id_string")]
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A brokerage firm.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Brokerage {
    #[serde(with = "crate::domain::id_string")]
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A rating term (e.g. "Buy", "Neutral"), global across brokerages.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rating {
    #[serde(with = "crate::domain::id_string")]
    pub id: i64,
    pub term: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
