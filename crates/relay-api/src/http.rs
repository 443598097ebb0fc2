use std::sync::Arc;

use axum::{
    Form, Json, Router,
    body::to_bytes,
    extract::{FromRequest, Path, Query, Request, State},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
        },
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::any,
};
use relay_model::ScriptResult;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{error::ApiError, handler::ApiHandler};

/// Default route prefix.
pub const DEFAULT_PREFIX: &str = "clip-save";

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    prefix: String,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Surrounding slashes are ignored; an empty prefix mounts scripts at the root.
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.prefix = prefix.as_ref().trim_matches('/').to_string();
        self
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET|POST /{prefix}/{identifier} - Run the script, answer with its result
    /// - OPTIONS on any path - CORS preflight, always 200
    ///
    /// Every response carries permissive CORS headers.
    pub fn router(self) -> Router {
        let base = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("/{}", self.prefix)
        };
        let root = if base.is_empty() { "/".to_string() } else { base.clone() };
        let scripts = format!("{base}/{{*identifier}}");
        Router::new()
            .route(&root, any(missing_identifier))
            .route(&scripts, any(invoke::<H>))
            .fallback(move |uri: Uri| fallback(base.clone(), uri))
            .with_state(self.handler)
            .layer(middleware::from_fn(cors))
    }
}

/// Key/value pairs of a query string or urlencoded body; repeated keys are kept.
type Pairs = Vec<(String, String)>;

/// First `content` value, like a browser form would submit it.
fn first_content(pairs: Pairs) -> Option<String> {
    pairs
        .into_iter()
        .find_map(|(key, value)| (key == "content").then_some(value))
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// /{prefix}
async fn missing_identifier() -> ApiError {
    ApiError::BadRequest("missing script identifier".to_string())
}

/// `/{prefix}/` does not match the wildcard route and lands here.
async fn fallback(base: String, uri: Uri) -> ApiError {
    let path = uri.path();
    if path.strip_prefix(base.as_str()) == Some("/") {
        ApiError::BadRequest("missing script identifier".to_string())
    } else {
        ApiError::NotFound(path.to_string())
    }
}

/// GET|POST /{prefix}/{identifier}
async fn invoke<H>(
    State(handler): State<Arc<H>>,
    Path(identifier): Path<String>,
    request: Request,
) -> Result<Response, ApiError>
where
    H: ApiHandler,
{
    let script = handler
        .lookup(&identifier)
        .ok_or_else(|| ApiError::NotFound(identifier.clone()))?;

    let method = request.method().clone();
    let query = Query::<Pairs>::try_from_uri(request.uri())
        .map(|Query(pairs)| first_content(pairs))
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let content = if method == Method::GET {
        query.unwrap_or_default()
    } else if method == Method::POST {
        read_post_content(request, query).await?
    } else {
        return Err(ApiError::MethodNotAllowed(method.to_string()));
    };

    debug!(%identifier, script_id = %script.id, "running script over http");
    let outcome = handler.execute(&script, content).await?;
    Ok(Json(ScriptResult::from(outcome)).into_response())
}

/// JSON bodies read `content` (non-string values count as empty), urlencoded forms
/// read the `content` field, anything else falls back to the query string.
async fn read_post_content(request: Request, query: Option<String>) -> Result<String, ApiError> {
    if has_content_type(request.headers(), "application/json") {
        let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
        let json: Map<String, Value> = serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("failed to parse JSON: {e}")))?;
        return Ok(json
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string());
    }

    if has_content_type(request.headers(), "application/x-www-form-urlencoded") {
        let Form(form) = Form::<Pairs>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to parse form: {}", e.body_text())))?;
        return Ok(first_content(form).or(query).unwrap_or_default());
    }

    Ok(query.unwrap_or_default())
}

fn has_content_type(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(expected))
}
