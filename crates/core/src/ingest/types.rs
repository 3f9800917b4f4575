use crate::domain::stock::StockEvent;
use serde::{Deserialize, Serialize};

/// One page of the external feed. `next_page` is an opaque cursor; absent
/// or empty means this was the last page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub items: Vec<StockEvent>,
    #[serde(default)]
    pub next_page: Option<String>,
}
