//! HTTP surface of the vote backend.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::error::VoteError;
use crate::ledger::{CastVote, CreatePoll};
use crate::state::{AnchorStatus, Poll, VoteRecord};
use crate::store::StoreBackend;
use crate::validate::{parse_address, parse_poll_id, required, validate_poll_id};

/// Names the backing store on every response, so bare payloads such as a
/// single poll still show when the service runs on the memory fallback.
const STORAGE_HEADER: HeaderName = HeaderName::from_static("x-storage");

const ROUTES: [(&str, &str); 7] = [
    ("GET", "/ping"),
    ("POST", "/polls"),
    ("GET", "/polls"),
    ("GET", "/polls/:id"),
    ("POST", "/vote"),
    ("GET", "/blockchain/polls"),
    ("GET", "/blockchain/poll/:address"),
];

#[derive(Debug, Deserialize)]
struct CreatePollBody {
    question: Option<String>,
    options: Option<Vec<String>>,
    creator_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoteBody {
    poll_id: Option<i64>,
    option_index: Option<i64>,
    voter_address: Option<String>,
}

#[derive(Serialize)]
struct PollChainInfo {
    tx_id: String,
    poll_address: String,
    explorer_url: String,
    status: AnchorStatus,
}

#[derive(Serialize)]
struct PollCreatedResponse {
    message: &'static str,
    poll: Poll,
    blockchain_info: PollChainInfo,
    storage: &'static str,
}

#[derive(Serialize)]
struct VoteChainInfo {
    tx_id: String,
    vote_address: String,
    explorer_url: String,
    status: AnchorStatus,
}

#[derive(Serialize)]
struct VoteCastResponse {
    message: &'static str,
    vote_record: VoteRecord,
    poll: Poll,
    blockchain_info: VoteChainInfo,
    storage: &'static str,
}

#[derive(Serialize)]
struct PollList {
    count: usize,
    polls: Vec<Poll>,
    storage: &'static str,
}

#[derive(Serialize)]
struct Pong {
    message: &'static str,
    database: &'static str,
    blockchain: &'static str,
    smart_contract: &'static str,
    anchor_mode: &'static str,
}

#[derive(Serialize)]
struct ChainPlaceholder {
    message: &'static str,
    note: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    program_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    implemented: bool,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    kind: &'a str,
}

/// Serves one request. Every response carries the CORS headers.
pub async fn handle(
    app: Arc<App>,
    req: Request<Body>,
    remote: SocketAddr,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = if method == Method::OPTIONS {
        empty(StatusCode::NO_CONTENT)
    } else {
        match route(&app, req, remote).await {
            Ok(response) => response,
            Err(err) => error_response(&err),
        }
    };
    apply_cors(response.headers_mut());
    response.headers_mut().insert(
        STORAGE_HEADER,
        HeaderValue::from_static(app.ledger.storage().as_str()),
    );

    debug!(%method, %path, status = response.status().as_u16(), %remote, "request served");
    Ok(response)
}

async fn route(
    app: &App,
    req: Request<Body>,
    remote: SocketAddr,
) -> Result<Response<Body>, VoteError> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (&method, segments.as_slice()) {
        (&Method::GET, ["ping"]) => Ok(ping(app).await),
        (&Method::POST, ["polls"]) => {
            check_rate(app, remote, &path).await?;
            create_poll(app, req).await
        }
        (&Method::GET, ["polls"]) => list_polls(app).await,
        (&Method::GET, ["polls", id]) => get_poll(app, id).await,
        (&Method::POST, ["vote"]) => {
            check_rate(app, remote, &path).await?;
            cast_vote(app, req).await
        }
        (&Method::GET, ["blockchain", "polls"]) => Ok(chain_polls(app)),
        (&Method::GET, ["blockchain", "poll", address]) => chain_poll(app, address),
        (
            _,
            ["ping"]
            | ["polls"]
            | ["polls", _]
            | ["vote"]
            | ["blockchain", "polls"]
            | ["blockchain", "poll", _],
        ) => Ok(message(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")),
        _ => Ok(message(StatusCode::NOT_FOUND, "Not found")),
    }
}

/// Charges one write against the client's window.
async fn check_rate(app: &App, remote: SocketAddr, path: &str) -> Result<(), VoteError> {
    if let Some(limiter) = &app.limiter {
        if !limiter.check(remote.ip()).await {
            warn!(client = %remote.ip(), path, "rate limit exceeded");
            return Err(VoteError::RateLimited);
        }
    }
    Ok(())
}

async fn ping(app: &App) -> Response<Body> {
    let anchor = app.ledger.anchor();
    let database = match app.ledger.storage() {
        StoreBackend::Database => "connected",
        StoreBackend::Memory => "disconnected",
    };
    let blockchain = if anchor.is_connected().await {
        "connected"
    } else {
        "disconnected"
    };

    json(
        StatusCode::OK,
        &Pong {
            message: "pong",
            database,
            blockchain,
            smart_contract: "enabled",
            anchor_mode: anchor.mode(),
        },
    )
}

async fn create_poll(app: &App, req: Request<Body>) -> Result<Response<Body>, VoteError> {
    let body: CreatePollBody = read_json(req).await?;
    let request = CreatePoll {
        question: required("question", body.question)?,
        options: required("options", body.options)?,
        creator_address: required("creator_address", body.creator_address)?,
    };

    let created = app.ledger.create_poll(request).await?;
    let anchor = app.ledger.anchor();
    let response = PollCreatedResponse {
        message: "Poll created successfully",
        blockchain_info: PollChainInfo {
            explorer_url: anchor.explorer_url(&created.receipt.reference),
            tx_id: created.receipt.reference,
            poll_address: created.poll.derived_address.clone(),
            status: created.receipt.status,
        },
        poll: created.poll,
        storage: app.ledger.storage().as_str(),
    };
    Ok(json(StatusCode::CREATED, &response))
}

async fn list_polls(app: &App) -> Result<Response<Body>, VoteError> {
    let polls = app.ledger.list_polls().await?;
    Ok(json(
        StatusCode::OK,
        &PollList {
            count: polls.len(),
            polls,
            storage: app.ledger.storage().as_str(),
        },
    ))
}

async fn get_poll(app: &App, id: &str) -> Result<Response<Body>, VoteError> {
    let poll = app.ledger.get_poll(parse_poll_id(id)?).await?;
    Ok(json(StatusCode::OK, &poll))
}

async fn cast_vote(app: &App, req: Request<Body>) -> Result<Response<Body>, VoteError> {
    let body: VoteBody = read_json(req).await?;
    let request = CastVote {
        poll_id: validate_poll_id(required("poll_id", body.poll_id)?)?,
        option_index: required("option_index", body.option_index)?,
        voter_address: required("voter_address", body.voter_address)?,
    };

    let cast = app.ledger.cast_vote(request).await?;
    let anchor = app.ledger.anchor();
    let response = VoteCastResponse {
        message: "Vote cast successfully",
        blockchain_info: VoteChainInfo {
            explorer_url: anchor.explorer_url(&cast.receipt.reference),
            tx_id: cast.receipt.reference,
            vote_address: cast.vote.derived_address.clone(),
            status: cast.receipt.status,
        },
        vote_record: cast.vote,
        poll: cast.poll,
        storage: app.ledger.storage().as_str(),
    };
    Ok(json(StatusCode::OK, &response))
}

fn chain_polls(app: &App) -> Response<Body> {
    json(
        StatusCode::OK,
        &ChainPlaceholder {
            message: "Blockchain polls fetching not implemented yet",
            note: "Polls are read from the database; on-chain reads require program account queries",
            program_id: Some(app.ledger.deriver().program_id().to_string()),
            address: None,
            implemented: app.ledger.anchor().reads_chain(),
        },
    )
}

fn chain_poll(app: &App, address: &str) -> Result<Response<Body>, VoteError> {
    let address = parse_address("blockchain", address)?;
    Ok(json(
        StatusCode::OK,
        &ChainPlaceholder {
            message: "Blockchain poll fetching not implemented yet",
            note: "On-chain poll accounts are not read back by this service",
            program_id: None,
            address: Some(address.to_string()),
            implemented: app.ledger.anchor().reads_chain(),
        },
    ))
}

async fn read_json<T: DeserializeOwned>(req: Request<Body>) -> Result<T, VoteError> {
    let bytes = hyper::body::to_bytes(req.into_body())
        .await
        .map_err(|err| VoteError::InvalidJson(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| VoteError::InvalidJson(err.to_string()))
}

fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(err) => {
            error!(error = %err, "failed to encode response");
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn message(status: StatusCode, text: &str) -> Response<Body> {
    json(
        status,
        &ErrorBody {
            error: text.to_string(),
            kind: if status == StatusCode::NOT_FOUND {
                "NotFoundError"
            } else {
                "ValidationError"
            },
        },
    )
}

fn error_response(err: &VoteError) -> Response<Body> {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, kind = err.kind(), "request failed");
    } else {
        debug!(error = %err, kind = err.kind(), "request rejected");
    }

    json(
        status,
        &ErrorBody {
            error: err.to_string(),
            kind: err.kind(),
        },
    )
}

fn empty(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

/// Runs the HTTP server until `shutdown` resolves.
pub async fn serve(
    app: Arc<App>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()>,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let app = app.clone();
        let remote = conn.remote_addr();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle(app.clone(), req, remote)))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_svc);
    info!(%addr, "vote backend listening");
    for (method, path) in ROUTES {
        info!("  {method} {path}");
    }

    server.with_graceful_shutdown(shutdown).await
}
