use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anchor_lang::prelude::Pubkey;
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use test_case::test_case;
use vote_backend::anchoring::SimulatedAnchor;
use vote_backend::api::handle;
use vote_backend::derive::AddressDeriver;
use vote_backend::ledger::VoteLedger;
use vote_backend::rate_limit::RateLimiter;
use vote_backend::store::{MemoryStore, PollStore, SqlStore};
use vote_backend::App;

fn remote() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

fn app_with(store: Arc<dyn PollStore>, limiter: Option<RateLimiter>) -> Arc<App> {
    let ledger = VoteLedger::new(
        store,
        Arc::new(SimulatedAnchor::new("devnet")),
        AddressDeriver::default(),
    );
    Arc::new(App::new(ledger, limiter))
}

fn memory_app() -> Arc<App> {
    app_with(Arc::new(MemoryStore::new()), None)
}

async fn sql_app() -> Arc<App> {
    let store = SqlStore::connect("sqlite::memory:", 1).await.unwrap();
    app_with(Arc::new(store), None)
}

async fn raw(app: &Arc<App>, method: Method, path: &str, body: Option<Value>) -> Response<Body> {
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    handle(app.clone(), request, remote()).await.unwrap()
}

async fn send(
    app: &Arc<App>,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = raw(app, method, path, body).await;
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn poll_body(options: &[&str]) -> Value {
    json!({
        "question": "Color?",
        "options": options,
        "creator_address": Pubkey::new_unique().to_string(),
    })
}

async fn create_color_poll(app: &Arc<App>) -> i64 {
    let (status, body) =
        send(app, Method::POST, "/polls", Some(poll_body(&["Red", "Blue"]))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["poll"]["id"].as_i64().unwrap()
}

async fn vote(
    app: &Arc<App>,
    poll_id: i64,
    option_index: i64,
    voter: &Pubkey,
) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/vote",
        Some(json!({
            "poll_id": poll_id,
            "option_index": option_index,
            "voter_address": voter.to_string(),
        })),
    )
    .await
}

async fn color_poll_scenario(app: Arc<App>, storage: &str) {
    let (status, created) =
        send(&app, Method::POST, "/polls", Some(poll_body(&["Red", "Blue"]))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["message"], "Poll created successfully");
    assert_eq!(created["storage"], storage);
    assert_eq!(created["poll"]["vote_counts"], json!([0, 0]));
    assert_eq!(created["poll"]["total_votes"], 0);
    assert_eq!(created["poll"]["status"], "confirmed");
    assert_eq!(
        created["blockchain_info"]["poll_address"],
        created["poll"]["blockchain_address"]
    );
    let tx_id = created["blockchain_info"]["tx_id"].as_str().unwrap();
    assert!(tx_id.starts_with("simulated_tx_"));
    assert_eq!(
        created["blockchain_info"]["explorer_url"],
        format!("https://explorer.solana.com/tx/{tx_id}?cluster=devnet")
    );

    let poll_id = created["poll"]["id"].as_i64().unwrap();
    let voter = Pubkey::new_unique();
    let (status, cast) = vote(&app, poll_id, 1, &voter).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cast["message"], "Vote cast successfully");
    assert_eq!(cast["poll"]["vote_counts"], json!([0, 1]));
    assert_eq!(cast["poll"]["total_votes"], 1);
    assert_eq!(cast["vote_record"]["voter_address"], voter.to_string());
    assert_eq!(cast["vote_record"]["option_index"], 1);
    assert_eq!(
        cast["blockchain_info"]["vote_address"],
        cast["vote_record"]["blockchain_vote_address"]
    );

    let (status, rejected) = vote(&app, poll_id, 0, &voter).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected["error"], "User has already voted on this poll");
    assert_eq!(rejected["kind"], "ConflictError");

    let (status, poll) = send(&app, Method::GET, &format!("/polls/{poll_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(poll["vote_counts"], json!([0, 1]));
    assert_eq!(poll["total_votes"], 1);

    let (status, list) = send(&app, Method::GET, "/polls", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);
    assert_eq!(list["storage"], storage);
}

#[tokio::test]
async fn test_color_poll_in_memory() {
    color_poll_scenario(memory_app(), "memory").await;
}

#[tokio::test]
async fn test_color_poll_in_database() {
    color_poll_scenario(sql_app().await, "database").await;
}

#[test_case(1, StatusCode::BAD_REQUEST ; "one option")]
#[test_case(2, StatusCode::CREATED ; "two options")]
#[test_case(10, StatusCode::CREATED ; "ten options")]
#[test_case(11, StatusCode::BAD_REQUEST ; "eleven options")]
#[tokio::test]
async fn test_option_count_bounds(count: usize, expected: StatusCode) {
    let app = memory_app();
    let options: Vec<String> = (0..count).map(|i| format!("Option {i}")).collect();
    let body = json!({
        "question": "Pick one",
        "options": options,
        "creator_address": Pubkey::new_unique().to_string(),
    });

    let (status, response) = send(&app, Method::POST, "/polls", Some(body)).await;
    assert_eq!(status, expected);
    if status == StatusCode::BAD_REQUEST {
        assert_eq!(response["kind"], "ValidationError");
    }
}

#[tokio::test]
async fn test_create_poll_rejects_bad_input() {
    let app = memory_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/polls",
        Some(json!({"question": "Color?", "options": ["Red", "Blue"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field: creator_address");

    let mut bad_creator = poll_body(&["Red", "Blue"]);
    bad_creator["creator_address"] = json!("not-an-address");
    let (status, body) = send(&app, Method::POST, "/polls", Some(bad_creator)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid creator address");

    let response = raw(&app, Method::POST, "/polls", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (_, list) = send(&app, Method::GET, "/polls", None).await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn test_invalid_vote_changes_nothing() {
    let app = sql_app().await;
    let poll_id = create_color_poll(&app).await;
    let voter = Pubkey::new_unique();

    for index in [-1, 2, 7] {
        let (status, body) = vote(&app, poll_id, index, &voter).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "ValidationError");
    }

    let (status, body) = vote(&app, 42, 0, &voter).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Poll not found");

    let (status, body) = send(
        &app,
        Method::POST,
        "/vote",
        Some(json!({"poll_id": poll_id, "option_index": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field: voter_address");

    let (_, poll) = send(&app, Method::GET, &format!("/polls/{poll_id}"), None).await;
    assert_eq!(poll["vote_counts"], json!([0, 0]));
    assert_eq!(poll["total_votes"], 0);

    // the voter can still vote after the rejected attempts
    let (status, _) = vote(&app, poll_id, 0, &voter).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_get_poll_errors() {
    let app = memory_app();

    let (status, body) = send(&app, Method::GET, "/polls/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NotFoundError");

    let (status, body) = send(&app, Method::GET, "/polls/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid poll ID");
}

#[tokio::test]
async fn test_blockchain_placeholders() {
    let app = memory_app();

    let (status, body) = send(&app, Method::GET, "/blockchain/polls", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["implemented"], false);
    assert_eq!(body["program_id"], vote_program::ID.to_string());

    let address = Pubkey::new_unique().to_string();
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/blockchain/poll/{address}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"], address);
    assert_eq!(body["implemented"], false);

    let (status, body) = send(&app, Method::GET, "/blockchain/poll/xyz", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid blockchain address");
}

#[tokio::test]
async fn test_ping_reports_capabilities() {
    let (status, body) = send(&memory_app(), Method::GET, "/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "pong");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["blockchain"], "disconnected");
    assert_eq!(body["smart_contract"], "enabled");
    assert_eq!(body["anchor_mode"], "simulated");

    let (_, body) = send(&sql_app().await, Method::GET, "/ping", None).await;
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_cors_and_routing() {
    let app = memory_app();

    let response = raw(&app, Method::OPTIONS, "/polls", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type");

    let response = raw(&app, Method::GET, "/ping", None).await;
    assert_eq!(response.headers()["access-control-allow-origin"], "*");

    let (status, _) = send(&app, Method::DELETE, "/polls", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(&app, Method::GET, "/vote", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(&app, Method::GET, "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_writes_are_rate_limited() {
    let limiter = RateLimiter::new(2, Duration::from_secs(60), NonZeroUsize::new(16).unwrap());
    let app = app_with(Arc::new(MemoryStore::new()), Some(limiter));

    for _ in 0..2 {
        create_color_poll(&app).await;
    }
    let (status, body) = send(&app, Method::POST, "/polls", Some(poll_body(&["Red", "Blue"]))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["kind"], "RateLimitError");

    // reads are not limited
    let (status, list) = send(&app, Method::GET, "/polls", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 2);
}

#[tokio::test]
async fn test_only_routed_writes_use_the_rate_budget() {
    let limiter = RateLimiter::new(1, Duration::from_secs(60), NonZeroUsize::new(16).unwrap());
    let app = app_with(Arc::new(MemoryStore::new()), Some(limiter));

    let (status, _) = send(&app, Method::POST, "/nowhere", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::POST, "/ping", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    create_color_poll(&app).await;
    let (status, _) =
        send(&app, Method::POST, "/polls", Some(poll_body(&["Red", "Blue"]))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_responses_name_the_backing_store() {
    let app = memory_app();
    let poll_id = create_color_poll(&app).await;
    let response = raw(&app, Method::GET, &format!("/polls/{poll_id}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-storage"], "memory");

    let response = raw(&app, Method::GET, "/polls/99", None).await;
    assert_eq!(response.headers()["x-storage"], "memory");

    let app = sql_app().await;
    let poll_id = create_color_poll(&app).await;
    let response = raw(&app, Method::GET, &format!("/polls/{poll_id}"), None).await;
    assert_eq!(response.headers()["x-storage"], "database");
}

#[test_case(-1 ; "negative")]
#[test_case(4_294_967_296 ; "beyond u32")]
#[tokio::test]
async fn test_vote_poll_id_follows_path_rule(poll_id: i64) {
    let app = memory_app();
    create_color_poll(&app).await;

    let (status, body) = vote(&app, poll_id, 0, &Pubkey::new_unique()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid poll ID");

    let (status, _) = send(&app, Method::GET, &format!("/polls/{poll_id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_votes_count_once() {
    let app = sql_app().await;
    let poll_id = create_color_poll(&app).await;
    let voter = Pubkey::new_unique();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move { vote(&app, poll_id, 1, &voter).await.0 })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::OK => accepted += 1,
            status => assert_eq!(status, StatusCode::BAD_REQUEST),
        }
    }
    assert_eq!(accepted, 1);

    let (_, poll) = send(&app, Method::GET, &format!("/polls/{poll_id}"), None).await;
    assert_eq!(poll["vote_counts"], json!([0, 1]));
    assert_eq!(poll["total_votes"], 1);
}
