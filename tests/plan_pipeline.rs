//! End-to-end tests of plan generation with scripted providers

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use tripplan::api::AppState;
use tripplan::models::{
    Article, DishDetail, RouteStep, TicketInfo, TransportMode, TravelOption, WeatherDay,
};
use tripplan::providers::{
    ArticleCrawler, ArticleProvider, DishInfoService, DishProvider, ProviderError, ProviderResult,
    RouteOptions, RouteProvider, TicketProvider, WeatherProvider,
};
use tripplan::{
    InMemoryPlanStore, PlanAggregator, PlanLifecycle, PlanQuery, PlanRecord, PlanRequest,
    PlannerError, PlanStore, web,
};

struct ScriptedRoutes(ProviderResult<RouteOptions>);
struct FailingWeather;
struct NoTickets;
struct EchoDishes;
struct StaticArticles;

#[async_trait]
impl RouteProvider for ScriptedRoutes {
    async fn fetch_routes(&self, _: &str, _: &str, _: &CancellationToken) -> ProviderResult<RouteOptions> {
        self.0.clone()
    }
}

#[async_trait]
impl WeatherProvider for FailingWeather {
    async fn fetch_weather(&self, _: &str, _: &CancellationToken) -> ProviderResult<Vec<WeatherDay>> {
        Err(ProviderError::Status {
            status: 401,
            message: "invalid token".to_string(),
        })
    }
}

#[async_trait]
impl TicketProvider for NoTickets {
    async fn fetch_tickets(&self, _: &str, _: &CancellationToken) -> ProviderResult<Vec<TicketInfo>> {
        Ok(vec![])
    }
}

#[async_trait]
impl DishProvider for EchoDishes {
    async fn fetch_dish(&self, name: &str, _: &CancellationToken) -> ProviderResult<DishDetail> {
        if name.is_empty() {
            return Err(ProviderError::NoResults("empty dish name".to_string()));
        }
        Ok(DishDetail {
            title: name.to_string(),
            content_markdown: format!("AI总结: {name} 的介绍"),
            source_url: "https://example.com/dish".to_string(),
        })
    }
}

#[async_trait]
impl ArticleProvider for StaticArticles {
    async fn fetch_article(&self, url: &str, _: &CancellationToken) -> ProviderResult<Article> {
        Ok(Article {
            doc_id: "csdn_1".to_string(),
            source: "csdn".to_string(),
            url: url.to_string(),
            title: "标题".to_string(),
            content_markdown: "正文".to_string(),
        })
    }
}

/// Wraps the in-memory store and counts writes
#[derive(Default)]
struct CountingStore {
    inner: InMemoryPlanStore,
    saves: AtomicUsize,
}

#[async_trait]
impl PlanStore for CountingStore {
    async fn save_or_update(&self, record: PlanRecord) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_or_update(record).await
    }

    async fn get(&self, thread_id: &str) -> anyhow::Result<Option<PlanRecord>> {
        self.inner.get(thread_id).await
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        self.inner.purge_expired(now).await
    }
}

fn transit_route() -> RouteOptions {
    let mut options = RouteOptions::new();
    options.insert(
        TransportMode::Transit,
        TravelOption {
            mode: TransportMode::Transit,
            duration_min: 42,
            distance_km: "15.2".to_string(),
            cost: "5".to_string(),
            steps: vec![
                RouteStep::new("步行至车站 (200米)", 3, 200),
                RouteStep::new("乘坐 地铁2号线, 在 虹桥火车站 上车, 经过 10 站, 到 南京东路 下车", 39, 15_000),
            ],
            polyline: "121.32,31.19;121.48,31.24".to_string(),
        },
    );
    options
}

fn lifecycle(routes: ProviderResult<RouteOptions>, store: Arc<dyn PlanStore>, dir: &Path) -> PlanLifecycle {
    let aggregator = PlanAggregator::new(
        Arc::new(FailingWeather),
        Arc::new(ScriptedRoutes(routes)),
        Arc::new(NoTickets),
    );
    PlanLifecycle::new(aggregator, store, dir, "http://localhost:8080")
}

fn request(thread_id: &str) -> PlanRequest {
    PlanRequest {
        thread_id: thread_id.to_string(),
        user_id: 1,
        query: PlanQuery::new("上海", "虹桥火车站", "外滩", "外滩"),
    }
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_routing_failure_writes_nothing_and_skips_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CountingStore::default());
    let lifecycle = lifecycle(
        Err(ProviderError::NoResults(
            "Could not resolve origin address '不存在的地方': Address not found".to_string(),
        )),
        store.clone(),
        dir.path(),
    );

    let err = lifecycle
        .generate(&request("thread-1"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PlannerError::Routing { .. }));
    assert!(err.to_string().contains("resolve"));
    assert_eq!(files_in(dir.path()), 0);
    assert_eq!(store.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_degraded_weather_still_produces_documents() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CountingStore::default());
    let lifecycle = lifecycle(Ok(transit_route()), store.clone(), dir.path());

    let generated = lifecycle
        .generate(&request("thread-1"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(generated.plan.weather_list, vec![WeatherDay::placeholder()]);
    assert_eq!(
        generated.plan.route_options.keys().copied().collect::<Vec<_>>(),
        vec![TransportMode::Transit]
    );

    let markdown = std::fs::read_to_string(&generated.artifacts.markdown_path).unwrap();
    assert!(markdown.contains("| 今天 | **晴** | 15°/25° | 适宜 |"));
    assert!(markdown.contains("### 🚇 公交方案"));
    assert!(!markdown.contains("自驾方案"));
    assert!(!markdown.contains("票务预约通道"));
    assert_eq!(files_in(dir.path()), 2);
    assert_eq!(store.saves.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_same_thread_updates_single_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CountingStore::default());
    let lifecycle = lifecycle(Ok(transit_route()), store.clone(), dir.path());

    let first = lifecycle
        .generate(&request("thread-7"), &CancellationToken::new())
        .await
        .unwrap();
    let created = store.get("thread-7").await.unwrap().unwrap().created_at;

    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = lifecycle
        .generate(&request("thread-7"), &CancellationToken::new())
        .await
        .unwrap();

    let record = store.get("thread-7").await.unwrap().unwrap();
    assert_eq!(store.inner.len().await, 1);
    assert_eq!(record.created_at, created);
    assert!(record.updated_at > created);
    assert_eq!(record.h5_url, second.artifacts.h5_url);
    assert_ne!(first.artifacts.h5_url, second.artifacts.h5_url);
    assert!(record.expires_at > Utc::now());
}

fn app(dir: &Path, store: Arc<dyn PlanStore>) -> axum::Router {
    let state = AppState {
        lifecycle: lifecycle(Ok(transit_route()), store, dir),
        dishes: DishInfoService::new(Arc::new(EchoDishes), 4),
        articles: ArticleCrawler::new(Arc::new(StaticArticles), 2, Duration::ZERO),
    };
    web::app(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn plan_request(thread_id: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/travel/plan")
        .header("content-type", "application/json");
    if let Some(thread_id) = thread_id {
        builder = builder.header("X-Thread-ID", thread_id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

const PLAN_BODY: &str = r#"{"city":"上海","origin":"虹桥火车站","destination":"外滩","ticket_keyword":"外滩"}"#;

#[tokio::test]
async fn test_http_plan_requires_thread_id() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Arc::new(InMemoryPlanStore::new()));

    let response = app.oneshot(plan_request(None, PLAN_BODY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
    assert_eq!(files_in(dir.path()), 0);
}

#[tokio::test]
async fn test_http_plan_rejects_bad_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Arc::new(InMemoryPlanStore::new()));

    let response = app
        .oneshot(plan_request(Some("thread-1"), r#"{"city": 3}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_http_plan_download_and_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Arc::new(InMemoryPlanStore::new()));

    let response = app
        .clone()
        .oneshot(plan_request(Some("thread-9"), PLAN_BODY))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["summary"], "已成功为规划 虹桥火车站 到 外滩 的行程");

    let download_url = body["data"]["download_url"].as_str().unwrap();
    let path = download_url.trim_start_matches("http://localhost:8080");
    let response = app
        .clone()
        .oneshot(Request::get(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.starts_with("attachment"));

    let response = app
        .clone()
        .oneshot(Request::get("/api/travel/plans/thread-9").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["title"], "虹桥火车站到外滩的旅行计划");

    let h5_path = body["data"]["h5_url"]
        .as_str()
        .unwrap()
        .trim_start_matches("http://localhost:8080")
        .to_string();
    let response = app
        .oneshot(Request::get(h5_path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_http_download_rejects_traversal_and_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Arc::new(InMemoryPlanStore::new()));

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/travel/download?filename=..%2Fsecret.md")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(
            Request::get("/api/travel/download?filename=plan_0_1000.md")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(Request::get("/api/travel/plans/unknown").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_http_dish_and_article_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path(), Arc::new(InMemoryPlanStore::new()));

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/crawl")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"names":["宫保鸡丁",""]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let dishes = body_json(response).await;
    assert_eq!(dishes.as_array().unwrap().len(), 1);
    assert_eq!(dishes[0]["title"], "宫保鸡丁");
    assert_eq!(dishes[0]["content_md"], "AI总结: 宫保鸡丁 的介绍");
    assert_eq!(dishes[0]["url"], "https://example.com/dish");

    let response = app
        .clone()
        .oneshot(
            Request::post("/api/articles")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"urls":["https://blog.csdn.net/a/1"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["articles"][0]["doc_id"], "csdn_1");
    assert_eq!(body["articles"][0]["content_md"], "正文");

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], "ok");
}
