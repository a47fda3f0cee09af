//! HTTP API for the greview node.
//!
//! Implements the git smart HTTP endpoints a client pushes reviews to, plus
//! a small JSON API for looking reviews up.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use flate2::read::GzDecoder;
use greview_git::{
    advertise_refs, advertisement_content_type, result_content_type, GitError, PackAdapter,
    ReceiveOutcome, ReceivePack, Revision, RECEIVE_PACK_SERVICE,
};
use greview_store::{MemoryReviewStore, ReviewRecord, ReviewStore, StoreError};
use serde::{Deserialize, Serialize};
use std::io::{self, ErrorKind, Read};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::observability::request_id_middleware;

/// Receive-pack engine as wired into the node.
pub type Engine = ReceivePack<Arc<dyn PackAdapter>, Arc<MemoryReviewStore>>;

/// Default upper bound on push bodies.
pub const DEFAULT_MAX_BODY_SIZE: usize = 512 * 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Receive-pack engine.
    pub engine: Arc<Engine>,
    /// Base URL reviews are browsed under, if fixed by configuration.
    pub public_url: Option<String>,
    /// Largest accepted request body, in bytes.
    pub max_body_size: usize,
}

impl AppState {
    /// Creates state around a pack adapter and review store.
    pub fn new(adapter: Arc<dyn PackAdapter>, reviews: Arc<MemoryReviewStore>) -> Self {
        Self {
            engine: Arc::new(ReceivePack::new(adapter, reviews)),
            public_url: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Sets the public base URL.
    pub fn with_public_url(mut self, public_url: Option<String>) -> Self {
        self.public_url = public_url;
        self
    }

    /// Sets the body size limit.
    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    /// The review store.
    pub fn reviews(&self) -> &MemoryReviewStore {
        self.engine.store()
    }

    /// Base URL for review links in responses to a request with `headers`.
    fn base_url(&self, headers: &HeaderMap) -> String {
        if let Some(url) = &self.public_url {
            return url.clone();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{host}/")
    }
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("service not supported: {0:?}")]
    ServiceForbidden(String),
    #[error("review not found: {0}")]
    ReviewNotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("git error: {0}")]
    Git(#[from] GitError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::ServiceForbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ReviewNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_)
            | ApiError::Git(GitError::Protocol(_) | GitError::InvalidPktLine(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Git(_) | ApiError::Store(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request refused");
        }

        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// A review as returned by `GET /api/reviews/{id}`.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    /// Display id.
    pub id: String,
    /// Pushed revisions, oldest first.
    pub revisions: Vec<RevisionResponse>,
}

/// One revision of a review.
#[derive(Debug, Serialize)]
pub struct RevisionResponse {
    /// `<review id>:<revision number>`.
    pub id: String,
    /// Source commit id.
    pub source: String,
    /// Destination commit id.
    pub destination: String,
}

impl ReviewResponse {
    fn new(review: &ReviewRecord, revisions: &[Revision]) -> Self {
        Self {
            id: review.id.clone(),
            revisions: revisions
                .iter()
                .map(|r| RevisionResponse {
                    id: format!("{}:{}", review.id, r.number),
                    source: r.source.to_hex(),
                    destination: r.destination.to_hex(),
                })
                .collect(),
        }
    }
}

/// Query of `GET /info/refs`.
#[derive(Debug, Deserialize)]
pub struct InfoRefsQuery {
    /// Requested git service.
    #[serde(default)]
    pub service: String,
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    let max_body_size = state.max_body_size;

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Reviews
        .route("/api/reviews/{id}", get(get_review))
        // Git smart HTTP protocol
        .route("/info/refs", get(git_info_refs))
        .route("/git-receive-pack", post(git_receive_pack))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "reviews": state.reviews().len(),
    }))
}

/// Gets a review by display id, with the revisions found in the repository.
async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let review = state
        .reviews()
        .get(&id)?
        .ok_or(ApiError::ReviewNotFound(id))?;

    let engine = state.engine.clone();
    let ref_prefix = review.ref_prefix.clone();
    let revisions = tokio::task::spawn_blocking(move || engine.adapter().revisions(&ref_prefix))
        .await
        .map_err(|e| ApiError::Internal(format!("revision lookup failed: {e}")))??;

    Ok(Json(ReviewResponse::new(&review, &revisions)))
}

/// Git info/refs endpoint - advertises the receive-pack service.
async fn git_info_refs(Query(query): Query<InfoRefsQuery>) -> Result<Response, ApiError> {
    let service = query.service;
    if service != RECEIVE_PACK_SERVICE {
        return Err(ApiError::ServiceForbidden(service));
    }

    let mut output = Vec::new();
    advertise_refs(&mut output, &service, &[])?;

    Ok((
        [
            (header::CONTENT_TYPE, advertisement_content_type(&service)),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        output,
    )
        .into_response())
}

/// Git receive-pack endpoint - turns a push into a review.
async fn git_receive_pack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let base_url = state.base_url(&headers);
    let gzip = headers
        .get(header::CONTENT_ENCODING)
        .is_some_and(|v| v.as_bytes().eq_ignore_ascii_case(b"gzip"));
    let engine = state.engine.clone();

    let (outcome, output) = tokio::task::spawn_blocking(move || {
        let mut output = Vec::new();
        let input: &[u8] = &body;
        let outcome = if gzip {
            receive(&engine, GzDecoder::new(input), &mut output, &base_url)
        } else {
            receive(&engine, input, &mut output, &base_url)
        }?;
        Ok::<_, ApiError>((outcome, output))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("receive-pack task failed: {e}")))??;

    match &outcome {
        ReceiveOutcome::Created {
            display_id,
            review_id,
        } => tracing::info!(%display_id, %review_id, "Push completed"),
        ReceiveOutcome::Rejected { message } => tracing::info!(%message, "Push rejected"),
        ReceiveOutcome::Empty => tracing::debug!("Empty push"),
    }

    Ok((
        [
            (header::CONTENT_TYPE, result_content_type(RECEIVE_PACK_SERVICE)),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        output,
    )
        .into_response())
}

/// Runs `engine` over a request body. Failures reading the body itself,
/// including a body that ends mid-packet, are the client's fault.
fn receive<R: Read>(
    engine: &Engine,
    input: R,
    output: &mut Vec<u8>,
    base_url: &str,
) -> Result<ReceiveOutcome, ApiError> {
    let mut body = RequestBody {
        inner: input,
        failed: false,
    };
    engine
        .run(&mut body, output, base_url)
        .map_err(|e| match e {
            GitError::Io(e) if body.failed || e.kind() == ErrorKind::UnexpectedEof => {
                ApiError::BadRequest(format!("unreadable request body: {e}"))
            }
            e => e.into(),
        })
}

/// Request body reader that remembers whether a read failed.
struct RequestBody<R> {
    inner: R,
    failed: bool,
}

impl<R: Read> Read for RequestBody<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| self.failed = true)
    }
}
