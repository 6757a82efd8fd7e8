//! AMap routing adapter against a local server speaking the AMap response format

use axum::{Json, Router, extract::{Query, State}, routing::get};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Barrier;
use tokio_util::sync::CancellationToken;

use tripplan::config::RoutingConfig;
use tripplan::models::TransportMode;
use tripplan::providers::{AmapRouteProvider, ProviderError, RouteProvider};

const API_KEY: &str = "amap-test-key";
const HONGQIAO: &str = "121.320081,31.193964";
const BUND: &str = "121.490317,31.241701";
const PEOPLES_SQUARE: &str = "121.475190,31.228833";

#[derive(Clone)]
struct Upstream {
    /// Both geocode requests of one fetch must be in flight at the same time
    geocode_barrier: Arc<Barrier>,
    geocode_calls: Arc<AtomicUsize>,
    route_calls: Arc<AtomicUsize>,
}

fn rejected(info: &str) -> Json<Value> {
    Json(json!({"status": "0", "info": info, "infocode": "10001"}))
}

async fn geocode(
    State(upstream): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    upstream.geocode_calls.fetch_add(1, Ordering::SeqCst);
    if tokio::time::timeout(Duration::from_secs(2), upstream.geocode_barrier.wait())
        .await
        .is_err()
    {
        return rejected("GEOCODES_NOT_CONCURRENT");
    }

    if params.get("key").map(String::as_str) != Some(API_KEY) {
        return rejected("INVALID_USER_KEY");
    }

    let hit = |location: &str, adcode: &str| {
        Json(json!({
            "status": "1", "info": "OK", "count": "1",
            "geocodes": [{"location": location, "adcode": adcode, "level": "兴趣点"}]
        }))
    };
    match params.get("address").map(String::as_str) {
        Some("虹桥火车站") => hit(HONGQIAO, "310112"),
        Some("外滩") => hit(BUND, "310101"),
        Some("人民广场") => hit(PEOPLES_SQUARE, "310101"),
        _ => Json(json!({"status": "1", "info": "OK", "count": "0", "geocodes": []})),
    }
}

async fn driving(
    State(upstream): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    upstream.route_calls.fetch_add(1, Ordering::SeqCst);
    if params.get("destination").map(String::as_str) == Some(PEOPLES_SQUARE) {
        return rejected("DAILY_QUERY_OVER_LIMIT");
    }
    assert_eq!(params.get("origin").map(String::as_str), Some(HONGQIAO));

    Json(json!({
        "status": "1", "info": "OK", "count": "1",
        "route": {
            "origin": HONGQIAO,
            "destination": params.get("destination"),
            "taxi_cost": "68",
            "paths": [{
                "distance": "17920", "duration": "1950", "strategy": "速度最快",
                "steps": [
                    {"instruction": "向东行驶200米左转进入申虹路", "road": "申虹路", "distance": "200", "duration": "50", "polyline": "121.320081,31.193964;121.322,31.194"},
                    {"instruction": "沿延安高架路行驶15公里", "road": "延安高架路", "distance": "15000", "duration": "1500", "polyline": "121.322,31.194;121.47,31.23"},
                    {"instruction": "右转到达外滩", "road": [], "distance": "2720", "duration": "400", "polyline": "121.47,31.23;121.490317,31.241701"}
                ]
            }]
        }
    }))
}

async fn transit(
    State(upstream): State<Upstream>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    upstream.route_calls.fetch_add(1, Ordering::SeqCst);
    if params.get("city").map(String::as_str) != Some("310101") {
        return rejected("MISSING_CITY");
    }

    Json(json!({
        "status": "1", "info": "OK", "count": "1",
        "route": {
            "origin": HONGQIAO,
            "destination": params.get("destination"),
            "transits": [{
                "cost": "5", "duration": "2760", "distance": "18300", "walking_distance": "650",
                "segments": [
                    {
                        "walking": {
                            "distance": "350", "duration": "300",
                            "steps": [{"instruction": "步行350米", "polyline": "121.320081,31.193964;121.3215,31.1945"}]
                        },
                        "bus": {"buslines": [{
                            "name": "地铁2号线(徐泾东--浦东国际机场)",
                            "departure_stop": {"name": "虹桥火车站", "id": "BV10001"},
                            "arrival_stop": {"name": "南京东路", "id": "BV10002"},
                            "via_num": "11", "distance": "17650", "duration": "2160",
                            "polyline": "121.3215,31.1945;121.4845,31.2381"
                        }]}
                    },
                    {
                        "walking": {
                            "distance": "300", "duration": "300",
                            "polyline": "121.4845,31.2381;121.490317,31.241701",
                            "steps": []
                        },
                        "bus": {"buslines": []}
                    }
                ]
            }]
        }
    }))
}

async fn spawn_upstream() -> (String, Upstream) {
    let upstream = Upstream {
        geocode_barrier: Arc::new(Barrier::new(2)),
        geocode_calls: Arc::new(AtomicUsize::new(0)),
        route_calls: Arc::new(AtomicUsize::new(0)),
    };
    let app = Router::new()
        .route("/v3/geocode/geo", get(geocode))
        .route("/v3/direction/driving", get(driving))
        .route("/v3/direction/transit/integrated", get(transit))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), upstream)
}

fn provider(base_url: &str, api_key: &str) -> AmapRouteProvider {
    AmapRouteProvider::new(&RoutingConfig {
        base_url: base_url.to_string(),
        api_key: Some(api_key.to_string()),
        timeout_seconds: 5,
        max_retries: 0,
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_routes_returns_both_modes() {
    let (base_url, upstream) = spawn_upstream().await;
    let options = provider(&base_url, API_KEY)
        .fetch_routes("虹桥火车站", "外滩", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(upstream.geocode_calls.load(Ordering::SeqCst), 2);
    assert_eq!(upstream.route_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        options.keys().copied().collect::<Vec<_>>(),
        vec![TransportMode::Driving, TransportMode::Transit]
    );

    let driving = &options[&TransportMode::Driving];
    assert_eq!(driving.duration_min, 32);
    assert_eq!(driving.distance_km, "17.9");
    assert_eq!(driving.cost, "68");
    assert_eq!(driving.steps.len(), 3);
    assert_eq!(driving.steps[1].instruction, "沿延安高架路行驶15公里");
    assert_eq!(driving.steps[1].distance_meters, 15_000);
    assert_eq!(
        driving.polyline,
        "121.320081,31.193964;121.322,31.194;121.322,31.194;121.47,31.23;121.47,31.23;121.490317,31.241701"
    );

    let transit = &options[&TransportMode::Transit];
    assert_eq!(transit.duration_min, 46);
    assert_eq!(transit.distance_km, "18.3");
    assert_eq!(transit.cost, "5");
    let instructions: Vec<_> = transit.steps.iter().map(|s| s.instruction.as_str()).collect();
    assert_eq!(
        instructions,
        vec![
            "步行至车站 (350米)",
            "乘坐 地铁2号线(徐泾东--浦东国际机场), 在 虹桥火车站 上车, 经过 11 站, 到 南京东路 下车",
            "步行至车站 (300米)",
        ]
    );
    assert!(transit.polyline.ends_with("121.4845,31.2381;121.490317,31.241701"));
}

#[tokio::test]
async fn test_rejected_mode_is_dropped() {
    let (base_url, _) = spawn_upstream().await;
    let options = provider(&base_url, API_KEY)
        .fetch_routes("虹桥火车站", "人民广场", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        options.keys().copied().collect::<Vec<_>>(),
        vec![TransportMode::Transit]
    );
}

#[tokio::test]
async fn test_unknown_destination_is_a_resolution_error() {
    let (base_url, upstream) = spawn_upstream().await;
    let err = provider(&base_url, API_KEY)
        .fetch_routes("虹桥火车站", "火星基地", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::NoResults(_)));
    let message = err.to_string();
    assert!(message.contains("Could not resolve destination address '火星基地'"));
    assert!(!message.contains("GEOCODES_NOT_CONCURRENT"));
    assert_eq!(upstream.route_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_key_fails_geocoding() {
    let (base_url, upstream) = spawn_upstream().await;
    let err = provider(&base_url, "wrong-key")
        .fetch_routes("虹桥火车站", "外滩", &CancellationToken::new())
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("Could not resolve origin"));
    assert!(message.contains("INVALID_USER_KEY"));
    assert_eq!(upstream.route_calls.load(Ordering::SeqCst), 0);
}
