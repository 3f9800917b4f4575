pub mod domain;
pub mod ingest;
pub mod recommend;
pub mod storage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub stock_feed_url: Option<String>,
        pub stock_feed_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                stock_feed_url: std::env::var("STOCK_FEED_URL").ok(),
                stock_feed_api_key: std::env::var("STOCK_FEED_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_stock_feed_url(&self) -> anyhow::Result<&str> {
            self.stock_feed_url
                .as_deref()
                .context("STOCK_FEED_URL is required")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::Settings;

        #[test]
        fn require_helpers_name_the_missing_variable() {
            let settings = Settings {
                database_url: None,
                stock_feed_url: Some("https://feed.example.com".to_string()),
                stock_feed_api_key: None,
                sentry_dsn: None,
            };

            let err = settings.require_database_url().unwrap_err();
            assert!(err.to_string().contains("DATABASE_URL"));
            assert_eq!(
                settings.require_stock_feed_url().unwrap(),
                "https://feed.example.com"
            );
        }
    }
}
