mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use hotposts::cache::RankingStore;
use serde_json::json;

use support::TestApp;

#[tokio::test]
async fn create_then_read_by_id() {
    let app = TestApp::new();

    let (status, body) = app.post_form("title=title1&body=test+body+1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "result": 1 }));

    let (status, body) = app.get("/posts/1").await;
    assert_eq!(status, StatusCode::OK);
    let post = &body["result"][0];
    assert_eq!(post["id"], 1);
    assert_eq!(post["title"], "title1");
    assert_eq!(post["body"], "test body 1");
    assert!(post["created_at"].is_i64());
    assert!(body.get("error_code").is_none());
}

#[tokio::test]
async fn create_accepts_json_bodies() {
    let app = TestApp::new();
    let request = Request::post("/posts")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"title":"from json","body":"hello"}"#))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], 1);
}

#[tokio::test]
async fn create_reports_validation_codes() {
    let app = TestApp::new();

    let (status, body) = app.post_form("title=&body=something").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error_code": "EMPTY_TITLE" }));

    let (status, body) = app.post_form("title=something").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "EMPTY_BODY");

    let long_title = "a".repeat(101);
    let (status, body) = app
        .post_form(&format!("title={long_title}&body=b"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_INPUT");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let app = TestApp::new();
    app.seed(1).await;

    let (status, body) = app.get("/posts/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "POST_NOT_FOUND");

    let (status, body) = app.get("/posts/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_POST_ID");

    let (status, body) = app.delete("/posts/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "POST_NOT_FOUND");
}

#[tokio::test]
async fn listing_pages_newest_first_without_recording_visits() {
    let app = TestApp::new();
    app.seed(5).await;

    let (status, body) = app.get("/posts?limit=2&offset=1").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<u64> = body["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![4, 3]);

    let (status, body) = app.get("/posts").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "EMPTY_LIMIT");

    let (status, body) = app.get("/posts?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "INVALID_LIMIT");

    let (status, body) = app.get("/posts?limit=10&offset=50").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error_code"], "POST_NOT_FOUND");

    assert!(app.top_ids().await.is_empty());
}

#[tokio::test]
async fn top10_follows_visits() {
    let app = TestApp::new();
    app.seed(3).await;
    assert!(app.top_ids().await.is_empty());

    for _ in 0..3 {
        assert_eq!(app.get("/posts/2").await.0, StatusCode::OK);
    }
    app.wait_for_score(2, 3).await;
    assert_eq!(app.get("/posts/3").await.0, StatusCode::OK);
    app.wait_for_score(3, 1).await;

    app.wait_for_top(&[2, 3]).await;

    let (_, body) = app.get("/posts/top10").await;
    assert_eq!(body["result"][0]["title"], "title2");
}

#[tokio::test]
async fn delete_evicts_post_from_top10() {
    let app = TestApp::new();
    app.seed(7).await;

    for _ in 0..3 {
        app.get("/posts/5").await;
    }
    app.wait_for_score(5, 3).await;
    app.get("/posts/7").await;
    app.wait_for_score(7, 1).await;
    app.wait_for_top(&[5, 7]).await;

    let (status, body) = app.delete("/posts/5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    // ranking removal is synchronous with the delete
    assert_eq!(app.ranking.score(5).await.unwrap(), None);
    app.wait_for_top(&[7]).await;

    let (status, _) = app.get("/posts/5").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn repository_outage_is_a_server_error() {
    let app = TestApp::new();
    app.seed(1).await;
    app.repo.set_failing(true);

    let (status, body) = app.get("/posts/1").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_code"], "SERVER_ERROR");
}

#[tokio::test]
async fn db_health_without_database_is_unavailable() {
    let app = TestApp::new();
    let (status, _) = app.get("/health/db").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
