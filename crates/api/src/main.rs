use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockrank_core::domain::catalog::{Action, Brokerage, Rating};
use stockrank_core::domain::recommendation::Recommendation;
use stockrank_core::domain::stock::{Stock, StockFilter};
use stockrank_core::ingest::client::HttpStockFeed;
use stockrank_core::{ingest, recommend, storage};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 1000;

// The scorer sees at most this many latest-per-ticker events per request.
const RECOMMENDATION_SCAN_LIMIT: i64 = 1000;
const DEFAULT_RECOMMENDATIONS: i64 = 10;
const MAX_RECOMMENDATIONS: i64 = 50;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stockrank_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let feed: Option<Arc<HttpStockFeed>> = match HttpStockFeed::from_settings(&settings) {
        Ok(feed) => Some(Arc::new(feed)),
        Err(e) => {
            tracing::warn!(error = %e, "stock feed not configured; sync endpoint disabled");
            None
        }
    };

    let state = AppState { pool, feed };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/stocks", get(list_stocks))
        .route("/api/v1/stocks/sync", post(sync_stocks))
        .route("/api/v1/stocks/:id", get(get_stock))
        .route("/api/v1/stock/:ticker", get(get_stocks_by_ticker))
        .route("/api/v1/recommendations", get(get_recommendations))
        .route("/api/v1/brokerages", get(list_brokerages))
        .route("/api/v1/brokerages/:id", get(get_brokerage))
        .route("/api/v1/actions", get(list_actions))
        .route("/api/v1/actions/:id", get(get_action))
        .route("/api/v1/ratings", get(list_ratings))
        .route("/api/v1/ratings/:id", get(get_rating))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Clone)]
struct AppState {
    pool: Option<PgPool>,
    feed: Option<Arc<HttpStockFeed>>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok(data)
        }
    }
}

#[derive(Debug, Serialize)]
struct PaginatedResponse<T> {
    success: bool,
    data: T,
    meta: Meta,
}

#[derive(Debug, Serialize)]
struct Meta {
    total: i64,
    limit: i64,
    offset: i64,
}

type ApiError = (StatusCode, Json<ApiResponse<()>>);

fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
            message: None,
        }),
    )
}

fn internal_error(err: anyhow::Error) -> ApiError {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %err, "request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{err:#}"))
}

fn not_found() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "resource not found")
}

fn database_unavailable() -> ApiError {
    error_response(StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
}

async fn healthz() -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        data: None,
        error: None,
        message: Some("Service is healthy".to_string()),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ListStocksQuery {
    ticker: Option<String>,
    company: Option<String>,
    brokerage: Option<String>,
    action: Option<String>,
    rating_from: Option<String>,
    rating_to: Option<String>,
    #[serde(rename = "sortBy")]
    sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    sort_order: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

impl ListStocksQuery {
    fn into_filter(self) -> StockFilter {
        let mut limit = parse_int_or(self.limit.as_deref(), DEFAULT_PAGE_SIZE);
        if limit <= 0 {
            limit = DEFAULT_PAGE_SIZE;
        }
        if limit > MAX_PAGE_SIZE {
            limit = MAX_PAGE_SIZE;
        }
        let offset = parse_int_or(self.offset.as_deref(), 0).max(0);

        StockFilter {
            ticker: non_empty(self.ticker),
            company: non_empty(self.company),
            brokerage: non_empty(self.brokerage),
            action: non_empty(self.action),
            rating_from: non_empty(self.rating_from),
            rating_to: non_empty(self.rating_to),
            sort_by: non_empty(self.sort_by),
            sort_order: non_empty(self.sort_order),
            limit,
            offset,
        }
    }
}

async fn list_stocks(
    State(state): State<AppState>,
    Query(query): Query<ListStocksQuery>,
) -> Result<Json<PaginatedResponse<Vec<Stock>>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let filter = query.into_filter();

    let stocks = storage::stocks::find_all(pool, &filter)
        .await
        .map_err(internal_error)?;

    let total = match storage::stocks::count(pool, &filter).await {
        Ok(total) => total,
        Err(err) => {
            tracing::warn!(error = %err, "count stocks failed");
            0
        }
    };

    Ok(Json(PaginatedResponse {
        success: true,
        data: stocks,
        meta: Meta {
            total,
            limit: filter.limit,
            offset: filter.offset,
        },
    }))
}

async fn get_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Stock>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let id: i64 = id
        .parse()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "invalid stock ID"))?;

    let stock = storage::stocks::find_by_id(pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(not_found)?;

    Ok(Json(ApiResponse::ok(stock)))
}

async fn get_stocks_by_ticker(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<ApiResponse<Vec<Stock>>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let stocks = storage::stocks::find_by_ticker(pool, &ticker)
        .await
        .map_err(internal_error)?;

    if stocks.is_empty() {
        return Err(not_found());
    }

    Ok(Json(ApiResponse::ok(stocks)))
}

#[derive(Debug, Serialize)]
struct SyncSummary {
    synced_count: usize,
    inserted: u64,
}

async fn sync_stocks(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SyncSummary>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };
    let Some(feed) = &state.feed else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "stock feed not configured",
        ));
    };

    let Some(lock) = storage::lock::try_acquire_sync_lock(pool)
        .await
        .map_err(internal_error)?
    else {
        return Err(error_response(
            StatusCode::CONFLICT,
            "a sync is already in progress",
        ));
    };

    let result = ingest::sync_stock_events(pool, feed.as_ref()).await;
    if let Err(err) = lock.release().await {
        tracing::warn!(error = %err, "failed to release sync lock");
    }

    let outcome = result.map_err(internal_error)?;

    Ok(Json(ApiResponse::ok_with_message(
        SyncSummary {
            synced_count: outcome.fetched,
            inserted: outcome.inserted,
        },
        "Stocks synced successfully",
    )))
}

#[derive(Debug, Default, Deserialize)]
struct RecommendationsQuery {
    limit: Option<String>,
}

async fn get_recommendations(
    State(state): State<AppState>,
    Query(query): Query<RecommendationsQuery>,
) -> Result<Json<ApiResponse<Vec<Recommendation>>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let limit = clamp_recommendation_limit(query.limit.as_deref());

    let filter = StockFilter {
        limit: RECOMMENDATION_SCAN_LIMIT,
        ..StockFilter::default()
    };
    let stocks = storage::stocks::find_all(pool, &filter)
        .await
        .map_err(internal_error)?;

    let recommendations = recommend::score(&stocks, limit);

    let message = format!(
        "Top {} stock recommendations based on recent ratings, actions, and target prices",
        recommendations.len()
    );
    Ok(Json(ApiResponse::ok_with_message(recommendations, message)))
}

async fn list_brokerages(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Brokerage>>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let brokerages = storage::catalog::list_brokerages(pool)
        .await
        .map_err(internal_error)?;
    Ok(Json(ApiResponse::ok(brokerages)))
}

async fn get_brokerage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Brokerage>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let id: i64 = id
        .parse()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "invalid brokerage ID"))?;

    let brokerage = storage::catalog::find_brokerage_by_id(pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(not_found)?;

    Ok(Json(ApiResponse::ok(brokerage)))
}

async fn list_actions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Action>>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let actions = storage::catalog::list_actions(pool)
        .await
        .map_err(internal_error)?;
    Ok(Json(ApiResponse::ok(actions)))
}

async fn get_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Action>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let id: i64 = id
        .parse()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "invalid action ID"))?;

    let action = storage::catalog::find_action_by_id(pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(not_found)?;

    Ok(Json(ApiResponse::ok(action)))
}

async fn list_ratings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Rating>>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let ratings = storage::catalog::list_ratings(pool)
        .await
        .map_err(internal_error)?;
    Ok(Json(ApiResponse::ok(ratings)))
}

async fn get_rating(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Rating>>, ApiError> {
    let Some(pool) = &state.pool else {
        return Err(database_unavailable());
    };

    let id: i64 = id
        .parse()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "invalid rating ID"))?;

    let rating = storage::catalog::find_rating_by_id(pool, id)
        .await
        .map_err(internal_error)?
        .ok_or_else(not_found)?;

    Ok(Json(ApiResponse::ok(rating)))
}

fn parse_int_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Absent or non-numeric input falls back to the default of 10; the result
/// is always within [1, 50].
fn clamp_recommendation_limit(raw: Option<&str>) -> usize {
    let mut limit = parse_int_or(raw, DEFAULT_RECOMMENDATIONS);
    if limit > MAX_RECOMMENDATIONS {
        limit = MAX_RECOMMENDATIONS;
    }
    if limit < 1 {
        limit = DEFAULT_RECOMMENDATIONS;
    }
    limit as usize
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stockrank_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
