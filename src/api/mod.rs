//! HTTP handlers for plan generation, artifact download, dish lookup and article crawling

use axum::{
    Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    aggregator::PlanAggregator,
    config::TripPlanConfig,
    lifecycle::{PlanLifecycle, PlanRequest},
    models::{Article, DishDetail, PlanQuery},
    providers::{
        AmapRouteProvider, ArticleCrawler, CsdnArticleProvider, CtripTicketProvider,
        DishInfoService, QWeatherProvider, TavilyDishProvider,
    },
    store::PlanStore,
};
use std::sync::Arc;

const THREAD_ID_HEADER: &str = "x-thread-id";
const USER_ID_HEADER: &str = "x-user-id";
const DEFAULT_USER_ID: u64 = 1;

/// Services shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: PlanLifecycle,
    pub dishes: DishInfoService,
    pub articles: ArticleCrawler,
}

impl AppState {
    /// Wire the production providers described by `config` around `store`
    pub fn from_config(config: &TripPlanConfig, store: Arc<dyn PlanStore>) -> anyhow::Result<Self> {
        let aggregator = PlanAggregator::new(
            Arc::new(QWeatherProvider::new(&config.weather)?),
            Arc::new(AmapRouteProvider::new(&config.routing)?),
            Arc::new(CtripTicketProvider::new(&config.tickets)?),
        );
        let lifecycle = PlanLifecycle::new(
            aggregator,
            store,
            &config.server.output_dir,
            config.server.public_base_url.as_str(),
        )
        .with_expiry(config.storage.plan_expiry());

        let dishes = DishInfoService::new(
            Arc::new(TavilyDishProvider::new(&config.dishes)?),
            config.dishes.concurrency,
        );
        let articles = ArticleCrawler::new(
            Arc::new(CsdnArticleProvider::new(&config.articles)?),
            config.articles.concurrency,
            config.articles.jitter(),
        );

        Ok(Self {
            lifecycle,
            dishes,
            articles,
        })
    }
}

/// Response envelope used by the travel endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Response {
        let body = Self {
            code: StatusCode::OK.as_u16(),
            message: "success".to_string(),
            data: Some(data),
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ApiResponse::<()> {
        code: status.as_u16(),
        message: message.into(),
        data: None,
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlanLinks {
    pub h5_url: String,
    pub md_url: String,
    pub download_url: String,
    pub summary: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DishLookupRequest {
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArticleCrawlRequest {
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleCrawlResponse {
    pub articles: Vec<Article>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/travel/plan", post(create_plan))
        .route("/travel/download", get(download_artifact))
        .route("/travel/plans/{thread_id}", get(get_plan))
        .route("/crawl", post(lookup_dishes))
        .route("/articles", post(crawl_articles))
        .with_state(state)
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().timestamp(),
    }))
}

/// Request-scoped token, cancelled when the handler future is dropped
fn request_token() -> (CancellationToken, tokio_util::sync::DropGuard) {
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    (cancel, guard)
}

fn user_id(headers: &HeaderMap) -> u64 {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_USER_ID)
}

async fn create_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<PlanQuery>, JsonRejection>,
) -> Response {
    let Some(thread_id) = headers
        .get(THREAD_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    else {
        return failure(StatusCode::BAD_REQUEST, "Missing X-Thread-ID header");
    };

    let query = match body {
        Ok(Json(query)) => query,
        Err(rejection) => {
            return failure(
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", rejection.body_text()),
            );
        }
    };

    let request = PlanRequest {
        thread_id: thread_id.to_string(),
        user_id: user_id(&headers),
        query,
    };
    info!("Plan requested for thread {}: {} -> {}", request.thread_id, request.query.origin, request.query.destination);

    let (cancel, _guard) = request_token();
    match state.lifecycle.generate(&request, &cancel).await {
        Ok(generated) => ApiResponse::success(PlanLinks {
            h5_url: generated.artifacts.h5_url,
            md_url: generated.artifacts.markdown_url,
            download_url: generated.artifacts.download_url,
            summary: generated.summary,
        }),
        Err(e) => {
            warn!("Plan generation failed for thread {}: {}", request.thread_id, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.user_message())
        }
    }
}

/// Artifact file names are single path components written by the lifecycle
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

async fn download_artifact(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let Some(filename) = params.filename.filter(|f| !f.is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "Missing filename");
    };
    if !is_safe_file_name(&filename) {
        return failure(StatusCode::BAD_REQUEST, "Invalid filename");
    }

    let path = state.lifecycle.output_dir().join(&filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            failure(StatusCode::NOT_FOUND, "File not found")
        }
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read file")
        }
    }
}

async fn get_plan(State(state): State<AppState>, Path(thread_id): Path<String>) -> Response {
    match state.lifecycle.store().get(&thread_id).await {
        Ok(Some(record)) => ApiResponse::success(record),
        Ok(None) => failure(StatusCode::NOT_FOUND, "Plan not found"),
        Err(e) => {
            warn!("Failed to load plan for thread {}: {:#}", thread_id, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load plan")
        }
    }
}

async fn lookup_dishes(
    State(state): State<AppState>,
    Json(request): Json<DishLookupRequest>,
) -> Json<Vec<DishDetail>> {
    let (cancel, _guard) = request_token();
    let batch = state.dishes.lookup(request.names, &cancel).await;
    Json(batch.details)
}

async fn crawl_articles(
    State(state): State<AppState>,
    Json(request): Json<ArticleCrawlRequest>,
) -> Json<ArticleCrawlResponse> {
    let (cancel, _guard) = request_token();
    let articles = state.articles.crawl(request.urls, &cancel).await;
    Json(ArticleCrawlResponse { articles })
}
