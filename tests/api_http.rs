// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use rescue_updates::sources::html::HtmlSource;
use rescue_updates::sources::{builtin_sources, SourceDescriptor};
use rescue_updates::{api, Aggregator, AppState, FetchError, SourceFetcher, Update};

const BODY_LIMIT: usize = 1024 * 1024;

struct Fixed(&'static str, Vec<(&'static str, &'static str)>);

#[async_trait]
impl SourceFetcher for Fixed {
    async fn fetch(&self, query: &str) -> Result<Vec<Update>, FetchError> {
        Ok(self
            .1
            .iter()
            .filter(|(title, _)| title.to_lowercase().contains(&query.to_lowercase()))
            .map(|(title, date)| {
                let url = format!("https://example.org/{}", title.replace(' ', "-"));
                Update::new(*title, *title, self.0, *date, &url).unwrap()
            })
            .collect())
    }
    fn name(&self) -> &str {
        self.0
    }
}

struct Broken;

#[async_trait]
impl SourceFetcher for Broken {
    async fn fetch(&self, _query: &str) -> Result<Vec<Update>, FetchError> {
        Err(FetchError::Aborted("connection reset".into()))
    }
    fn name(&self) -> &str {
        "Broken"
    }
}

fn sikkim_fixture_source() -> Arc<dyn SourceFetcher> {
    let desc = builtin_sources()
        .into_iter()
        .find_map(|d| match d {
            SourceDescriptor::Html(h) if h.name == "Sikkim Govt" => Some(h),
            _ => None,
        })
        .unwrap();
    let html = fs::read_to_string("tests/fixtures/sikkim_press.html").unwrap();
    Arc::new(HtmlSource::from_fixture(desc, &html).unwrap())
}

fn test_router(fetchers: Vec<Arc<dyn SourceFetcher>>, cap: usize) -> Router {
    let agg = Aggregator::new(fetchers, cap, Duration::from_secs(2));
    api::router(AppState::new(agg))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, body) = get(test_router(vec![], 10), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), "OK");
}

#[tokio::test]
async fn updates_are_sorted_capped_and_schema_shaped() {
    let app = test_router(
        vec![
            Arc::new(Fixed(
                "PIB India",
                vec![
                    ("NDRF rescue teams airlifted", "2023-10-05"),
                    ("Rescue coordination meeting", "2023-10-03"),
                ],
            )),
            Arc::new(Broken),
            sikkim_fixture_source(),
            Arc::new(Fixed(
                "Twitter/X",
                vec![
                    ("Rescue ops continue at Chungthang", "2023-10-06 09:12"),
                    ("Rescue helicopter grounded", "2023-10-04 18:00"),
                ],
            )),
        ],
        4,
    );

    let (status, body) = get(app, "/rescue-updates?query=rescue").await;
    assert_eq!(status, StatusCode::OK);

    let v: Json = serde_json::from_slice(&body).expect("json body");
    let updates = v["updates"].as_array().expect("updates array");
    assert_eq!(updates.len(), 4);

    let dates: Vec<_> = updates.iter().map(|u| u["date"].as_str().unwrap()).collect();
    assert!(dates.windows(2).all(|w| w[0] >= w[1]), "{dates:?}");

    for u in updates {
        for field in ["title", "summary", "source", "date", "url"] {
            assert!(u.get(field).is_some(), "missing '{field}' in {u}");
        }
        assert!(!u["title"].as_str().unwrap().is_empty());
        assert!(url::Url::parse(u["url"].as_str().unwrap()).is_ok());
    }

    // Fetch-date records from the Sikkim page sort above older fixed dates.
    assert!(updates
        .iter()
        .any(|u| u["title"] == "Sikkim rescue operation ends" && u["source"] == "Sikkim Govt"));
}

#[tokio::test]
async fn no_results_is_an_empty_list_not_an_error() {
    let app = test_router(vec![Arc::new(Fixed("PIB India", vec![])), Arc::new(Broken)], 10);
    let (status, body) = get(app, "/rescue-updates?query=rescue").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v, serde_json::json!({ "updates": [] }));
}

#[tokio::test]
async fn encoded_query_is_decoded_before_matching() {
    let app = test_router(
        vec![Arc::new(Fixed(
            "NDTV",
            vec![("Sikkim rescue resumes", "2023-10-07"), ("Rescue in Assam", "2023-10-07")],
        ))],
        10,
    );
    let (status, body) = get(app, "/rescue-updates?query=Sikkim%20Rescue").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["updates"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_query_is_bad_request() {
    let (status, _) = get(test_router(vec![], 10), "/rescue-updates").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blank_query_is_bad_request_with_error_body() {
    let (status, body) = get(test_router(vec![], 10), "/rescue-updates?query=%20%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let v: Json = serde_json::from_slice(&body).unwrap();
    assert!(v["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn static_descriptor_files_are_served() {
    let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/static");
    let app = api::with_static_files(test_router(vec![], 10), dir);

    let (status, body) = get(app, "/static/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("openapi is json");
    assert!(v["paths"].get("/rescue-updates").is_some());
}
