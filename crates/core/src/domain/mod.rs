pub mod catalog;
pub mod recommendation;
pub mod stock;

/// Row ids cross the wire as JSON strings (`"42"`, not `42`) so javascript
/// clients never hit the 2^53 integer precision limit.
pub(crate) mod id_string {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }

    pub mod opt {
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            id: &Option<i64>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match id {
                Some(id) => serializer.collect_str(id),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<i64>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => raw.parse().map(Some).map_err(D::Error::custom),
                None => Ok(None),
            }
        }
    }
}
