use crate::config::Settings;
use crate::domain::stock::StockEvent;
use crate::ingest::types::FeedPage;
use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;

// The feed hands out opaque cursors; a cap keeps a cyclic cursor from
// turning a sync into an infinite loop.
const MAX_PAGES: u32 = 500;

#[async_trait::async_trait]
pub trait StockFeed: Send + Sync {
    fn feed_name(&self) -> &'static str;

    async fn fetch_all_events(&self) -> Result<Vec<StockEvent>>;
}

#[derive(Debug, Clone)]
pub struct HttpStockFeed {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    retries: u32,
}

impl HttpStockFeed {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings.require_stock_feed_url()?.to_string();
        let api_key = settings.stock_feed_api_key.clone();

        let timeout_secs = std::env::var("STOCK_FEED_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("STOCK_FEED_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build stock feed http client")?;

        Ok(Self {
            http,
            url,
            api_key,
            retries,
        })
    }

    async fn fetch_page_once(&self, cursor: Option<&str>) -> Result<FeedPage> {
        let mut req = self.http.get(&self.url);
        if let Some(cursor) = cursor {
            req = req.query(&[("next_page", cursor)]);
        }
        if let Some(api_key) = &self.api_key {
            req = req.bearer_auth(api_key);
        }

        let res = req.send().await.context("stock feed request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read feed response")?;

        if !status.is_success() {
            anyhow::bail!("stock feed HTTP {status}: {text}");
        }

        serde_json::from_str::<FeedPage>(&text)
            .with_context(|| format!("feed response is not a valid page: {text}"))
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedPage> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_page_once(cursor).await {
                Ok(page) => return Ok(page),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = backoff_delay(attempt);
                    tracing::warn!(attempt, ?backoff, error = %err, "stock feed fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

// Exponent capped at 64s so an absurd STOCK_FEED_RETRIES setting cannot
// overflow the shift.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(6))
}

#[async_trait::async_trait]
impl StockFeed for HttpStockFeed {
    fn feed_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_all_events(&self) -> Result<Vec<StockEvent>> {
        let mut events: Vec<StockEvent> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages: u32 = 0;

        loop {
            pages += 1;
            anyhow::ensure!(
                pages <= MAX_PAGES,
                "stock feed pagination exceeded {MAX_PAGES} pages; aborting"
            );

            let page = self.fetch_page(cursor.as_deref()).await?;
            events.extend(page.items);

            cursor = page.next_page.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!(pages, events = events.len(), "stock feed pagination complete");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::backoff_delay;
    use crate::ingest::types::FeedPage;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn backoff_doubles_per_attempt_and_caps_at_sixty_four_seconds() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(7), Duration::from_secs(64));
        // High retry settings must not overflow the shift.
        assert_eq!(backoff_delay(100), Duration::from_secs(64));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(64));
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
    }

    #[test]
    fn parses_a_feed_page_with_a_cursor() {
        let v = json!({
            "items": [
                {
                    "ticker": "AAPL",
                    "company": "Apple Inc.",
                    "action": "upgraded by",
                    "brokerage": "Goldman Sachs",
                    "rating_from": "Neutral",
                    "rating_to": "Buy",
                    "target_from": "$200.00",
                    "target_to": "$244.00",
                    "time": "2026-08-25T14:30:00Z"
                }
            ],
            "next_page": "AAPL-cursor"
        });

        let page: FeedPage = serde_json::from_value(v).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].ticker, "AAPL");
        assert_eq!(page.items[0].rating_to, "Buy");
        assert_eq!(page.next_page.as_deref(), Some("AAPL-cursor"));
    }

    #[test]
    fn missing_cursor_and_optional_fields_default() {
        let v = json!({
            "items": [
                {
                    "ticker": "XYZ",
                    "company": "Xyz Corp",
                    "time": "2026-08-25T14:30:00Z"
                }
            ]
        });

        let page: FeedPage = serde_json::from_value(v).unwrap();
        assert!(page.next_page.is_none());
        assert_eq!(page.items[0].action, "");
        assert_eq!(page.items[0].target_from, "");
    }

    #[test]
    fn rejects_items_without_identity() {
        let v = json!({
            "items": [ { "company": "No Ticker Inc.", "time": "2026-08-25T14:30:00Z" } ]
        });

        assert!(serde_json::from_value::<FeedPage>(v).is_err());
    }
}
