use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use crate::assistant::chat::{fallback_reply, AssistantReply, ChatSession};
use crate::assistant::client::{AssistantClient, AssistantError, ChatMessage};
use crate::catalog::index::CategoryFilter;
use crate::catalog::store::ProtocolCatalog;
use crate::cli::ServeArgs;
use crate::core::protocol::Protocol;
use crate::core::types::{CategoryMode, ProtocolId};
use crate::dosing::calculator::{
    convert_weight, drip_rate, weight_based_dose, DoseRequest, DosingError, DripRequest, WeightUnit,
};
use crate::matching::context::{build_context_preamble, extract_keywords, select_context};
use crate::matching::engine::{MatchingConfig, MatchingEngine};
use crate::quiz::generator::{select_candidates, QuizGenerator, DEFAULT_QUIZ_QUESTIONS};
use crate::utils::validation::{
    validate_categories, validate_history, validate_protocol_id, validate_query, ValidationError,
};

/// Security configuration constants to prevent `DoS` attacks
pub const MAX_BODY_SIZE: usize = 2 * 1024 * 1024; // 2MB, fits a full chat history
pub const MAX_SEARCH_RESULTS: usize = 100;
pub const DEFAULT_SEARCH_RESULTS: usize = 20;
pub const REQUEST_TIMEOUT_SECS: u64 = 60;
pub const MAX_CONCURRENT_REQUESTS: usize = 100;
/// Assistant work per request stops here so fallbacks still beat the request timeout
pub const ASSISTANT_BUDGET_SECS: u64 = 45;

/// Shared application state
pub struct AppState {
    pub catalog: ProtocolCatalog,
    pub engine: MatchingEngine,
    /// `None` when no API key is configured
    pub assistant: Option<AssistantClient>,
    /// Wall-clock cap on assistant calls for one chat or quiz request
    pub assistant_budget: Duration,
}

impl AppState {
    pub fn new(catalog: ProtocolCatalog, assistant: Option<AssistantClient>) -> Self {
        Self {
            catalog,
            engine: MatchingEngine::new(),
            assistant,
            assistant_budget: Duration::from_secs(ASSISTANT_BUDGET_SECS),
        }
    }
}

/// Enhanced error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub details: Option<String>,
}

/// Create a safe error response that prevents information disclosure
/// while logging detailed errors server-side for debugging
pub fn create_safe_error_response(
    error_type: &str,
    user_message: &str,
    internal_error: Option<&str>,
) -> ErrorResponse {
    // Log detailed error server-side for debugging (not exposed to client)
    if let Some(internal_msg) = internal_error {
        tracing::error!("Internal error ({}): {}", error_type, internal_msg);
    }

    ErrorResponse {
        error: user_message.to_string(),
        error_type: error_type.to_string(),
        details: None, // Never expose internal details to prevent information disclosure
    }
}

fn error_response(status: StatusCode, error_type: &str, user_message: &str) -> Response {
    (
        status,
        Json(create_safe_error_response(error_type, user_message, None)),
    )
        .into_response()
}

impl From<ValidationError> for Response {
    fn from(e: ValidationError) -> Self {
        error_response(StatusCode::BAD_REQUEST, "validation_error", &e.to_string())
    }
}

impl From<DosingError> for Response {
    fn from(e: DosingError) -> Self {
        error_response(StatusCode::BAD_REQUEST, "invalid_input", &e.to_string())
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err((
            rejection.status(),
            Json(create_safe_error_response(
                "invalid_request",
                "Request body is not valid JSON for this endpoint",
                Some(&rejection.body_text()),
            )),
        )
            .into_response()),
    }
}

/// Build a validated filter from `categories=a,b` and `mode=any|all`
fn parse_filter(categories: Option<&str>, mode: Option<&str>) -> Result<CategoryFilter, Response> {
    let mode: CategoryMode = mode.unwrap_or_default().parse().map_err(|e: String| {
        error_response(StatusCode::BAD_REQUEST, "invalid_mode", &e)
    })?;
    let filter = CategoryFilter::from_csv(categories, mode);
    validate_categories(&filter)?;
    Ok(filter)
}

/// Category selection as sent in JSON bodies
#[derive(Debug, Default, Deserialize)]
struct FilterBody {
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    mode: CategoryMode,
}

impl FilterBody {
    fn to_filter(&self) -> Result<CategoryFilter, Response> {
        let filter = CategoryFilter::new(&self.categories, self.mode);
        validate_categories(&filter)?;
        Ok(filter)
    }
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the tokio runtime cannot be created or the server fails to start.
pub fn run(args: ServeArgs, catalog: ProtocolCatalog) -> anyhow::Result<()> {
    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { run_server(args, catalog).await })
}

/// Create the application router over the embedded catalog, with the
/// assistant configured from the environment.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or the HTTP client cannot be built.
pub fn create_router() -> anyhow::Result<Router> {
    let catalog = ProtocolCatalog::load_embedded()?;
    let assistant = AssistantClient::from_env()?;
    create_router_with_state(Arc::new(AppState::new(catalog, assistant)))
}

/// Create the application router with all routes and middleware configured.
///
/// # Errors
///
/// Returns an error if the rate limiter configuration is rejected.
pub fn create_router_with_state(state: Arc<AppState>) -> anyhow::Result<Router> {
    // Configure IP-based rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10) // 10 requests per second per IP
        .burst_size(50) // Allow bursts of 50 requests
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limiter configuration"))?;

    // Build router with comprehensive security layers
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/api/protocols", get(protocols_handler))
        .route("/api/protocols/{id}", get(protocol_handler))
        .route("/api/categories", get(categories_handler))
        .route("/api/search", get(search_handler))
        .route("/api/context", post(context_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .route("/api/quiz", post(quiz_handler))
        .route("/api/calculate/dose", post(dose_handler))
        .route("/api/calculate/drip", post(drip_handler))
        .route("/api/calculate/convert", post(convert_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // Security headers for browser protection
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-xss-protection"),
                    HeaderValue::from_static("1; mode=block"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("strict-transport-security"),
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ))
                // IP-based rate limiting to prevent abuse
                .layer(GovernorLayer {
                    config: Arc::new(governor_conf),
                })
                // Request timeout to prevent slow client attacks
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(REQUEST_TIMEOUT_SECS),
                ))
                // Limit concurrent requests to prevent DOS
                .layer(ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
                .layer(DefaultBodyLimit::max(MAX_BODY_SIZE)),
        );

    Ok(app)
}

async fn run_server(args: ServeArgs, catalog: ProtocolCatalog) -> anyhow::Result<()> {
    let assistant = AssistantClient::from_env()?;
    match &assistant {
        Some(client) => tracing::info!(model = %client.config().model, "assistant enabled"),
        None => tracing::warn!("no API key set, assistant replies will use local fallbacks"),
    }

    let protocol_count = catalog.len();
    let app = create_router_with_state(Arc::new(AppState::new(catalog, assistant)))?;

    let addr = format!("{}:{}", args.address, args.port);
    println!("Starting ems-protocols web server at http://{addr} ({protocol_count} protocols)");

    if args.open {
        let _ = open::that(format!("http://{addr}"));
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Main page handler
async fn index_handler() -> Html<&'static str> {
    Html(include_str!("templates/index.html"))
}

fn protocol_summary(p: &Protocol) -> serde_json::Value {
    serde_json::json!({
        "id": p.id,
        "name": p.name,
        "source_file": p.source_file,
        "categories": p.categories,
    })
}

#[derive(Deserialize)]
struct FilterParams {
    categories: Option<String>,
    mode: Option<String>,
}

async fn protocols_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> Result<Json<serde_json::Value>, Response> {
    let filter = parse_filter(params.categories.as_deref(), params.mode.as_deref())?;
    let protocols: Vec<serde_json::Value> = state
        .catalog
        .filter_by_categories(&filter)
        .into_iter()
        .map(protocol_summary)
        .collect();

    Ok(Json(serde_json::json!({
        "count": protocols.len(),
        "total": state.catalog.len(),
        "protocols": protocols,
    })))
}

async fn protocol_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Protocol>, Response> {
    validate_protocol_id(&id)?;
    state
        .catalog
        .get(&ProtocolId::new(id))
        .cloned()
        .map(Json)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "not_found", "Protocol not found"))
}

async fn categories_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let categories: Vec<serde_json::Value> = state
        .catalog
        .categories()
        .into_iter()
        .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
        .collect();
    Json(serde_json::json!({ "categories": categories }))
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    categories: Option<String>,
    mode: Option<String>,
    limit: Option<usize>,
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<serde_json::Value>, Response> {
    let start_time = std::time::Instant::now();
    validate_query(&params.q)?;
    let filter = parse_filter(params.categories.as_deref(), params.mode.as_deref())?;

    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_RESULTS)
        .min(MAX_SEARCH_RESULTS);
    let engine = MatchingEngine::with_config(MatchingConfig {
        limit: Some(limit),
        ..state.engine.config().clone()
    });
    let hits = engine.search_catalog(&params.q, &state.catalog, &filter);

    let results: Vec<serde_json::Value> = hits
        .iter()
        .map(|h| {
            serde_json::json!({
                "protocol": protocol_summary(h.protocol),
                "relevance": h.relevance,
                "similarity": h.similarity(),
                "scores": h.scores,
            })
        })
        .collect();

    #[allow(clippy::cast_possible_truncation)] // Processing time won't exceed u64
    let processing_time = start_time.elapsed().as_millis() as u64;

    Ok(Json(serde_json::json!({
        "query": params.q,
        "count": results.len(),
        "results": results,
        "processing_time_ms": processing_time,
    })))
}

#[derive(Deserialize)]
struct ContextBody {
    query: String,
    #[serde(flatten)]
    filter: FilterBody,
}

async fn context_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ContextBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Response> {
    let body = json_body(body)?;
    validate_query(&body.query)?;
    let corpus = state.catalog.filter_by_categories(&body.filter.to_filter()?);

    let matches = select_context(&body.query, &corpus);
    let selected: Vec<serde_json::Value> = matches
        .iter()
        .map(|m| {
            serde_json::json!({
                "protocol": protocol_summary(m.protocol),
                "score": m.score,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "keywords": extract_keywords(&body.query),
        "matches": selected,
        "preamble": build_context_preamble(&matches),
    })))
}

#[derive(Deserialize)]
struct ChatBody {
    messages: Vec<ChatMessage>,
    #[serde(flatten)]
    filter: FilterBody,
}

impl ChatBody {
    fn validated(body: Result<Json<Self>, JsonRejection>) -> Result<(Self, CategoryFilter), Response> {
        let body = json_body(body)?;
        validate_history(&body.messages)?;
        let filter = body.filter.to_filter()?;
        Ok((body, filter))
    }
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, Response> {
    let (body, filter) = ChatBody::validated(body)?;
    let corpus = state.catalog.filter_by_categories(&filter);
    let session =
        ChatSession::new(corpus, state.assistant.as_ref()).with_budget(state.assistant_budget);
    let reply = session.reply(&body.messages).await;
    Ok(Json(reply).into_response())
}

fn sse_json<T: Serialize>(event: &str, value: &T) -> Event {
    Event::default()
        .event(event)
        .json_data(value)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to encode SSE event");
            Event::default().event(event).data("null")
        })
}

/// Streamed chat. Events: `context` (selected protocols), `token` for each
/// text delta, `fallback` when the assistant is unavailable or fails, then
/// `done`.
async fn chat_stream_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, Response> {
    let (body, filter) = ChatBody::validated(body)?;

    let stream = async_stream::stream! {
        let corpus = state.catalog.filter_by_categories(&filter);
        let session = ChatSession::new(corpus, state.assistant.as_ref());
        let prepared = session.prepare(&body.messages);
        yield Ok::<_, Infallible>(sse_json("context", &prepared.context_summary()));

        let failure = match state.assistant.as_ref() {
            None => Some(AssistantError::NotConfigured),
            Some(client) => {
                let mut tokens = client.stream(&prepared.messages);
                let mut failure = None;
                while let Some(item) = tokens.next().await {
                    match item {
                        Ok(text) => yield Ok(sse_json("token", &serde_json::json!({ "text": text }))),
                        Err(e) => {
                            tracing::warn!(error = %e, "assistant stream failed, using fallback");
                            failure = Some(e);
                            break;
                        }
                    }
                }
                failure
            }
        };

        if let Some(e) = failure {
            let reply = fallback_reply(&prepared.context, &e);
            if let AssistantReply::Fallback { text, reason } = reply {
                yield Ok(sse_json("fallback", &serde_json::json!({ "text": text, "reason": reason })));
            }
        }
        yield Ok(Event::default().event("done").data(""));
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::new()).into_response())
}

#[derive(Deserialize)]
struct QuizBody {
    #[serde(default = "default_quiz_count")]
    count: usize,
    #[serde(flatten)]
    filter: FilterBody,
}

fn default_quiz_count() -> usize {
    DEFAULT_QUIZ_QUESTIONS
}

async fn quiz_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<QuizBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Response> {
    let body = json_body(body)?;
    let filter = body.filter.to_filter()?;

    let mut rng = StdRng::from_entropy();
    let candidates = select_candidates(&state.catalog, &filter, body.count, &mut rng);
    if candidates.is_empty() {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            "no_protocols",
            "No protocols with content match the selected categories",
        ));
    }

    let pool = state.catalog.all();
    let items = QuizGenerator::new(state.assistant.as_ref())
        .with_budget(state.assistant_budget)
        .generate(&candidates, &pool, &mut rng)
        .await;

    Ok(Json(serde_json::json!({
        "count": items.len(),
        "questions": items,
    })))
}

#[derive(Deserialize)]
struct DoseBody {
    weight: f64,
    #[serde(default)]
    weight_unit: Option<WeightUnit>,
    dose_mg_per_kg: f64,
    concentration_mg: f64,
    #[serde(default)]
    concentration_ml: Option<f64>,
}

async fn dose_handler(
    body: Result<Json<DoseBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Response> {
    let body = json_body(body)?;
    let weight_kg = convert_weight(body.weight, body.weight_unit.unwrap_or(WeightUnit::Kg), WeightUnit::Kg)?;
    let result = weight_based_dose(&DoseRequest {
        weight_kg,
        dose_mg_per_kg: body.dose_mg_per_kg,
        concentration_mg: body.concentration_mg,
        concentration_ml: body.concentration_ml.unwrap_or(1.0),
    })?;

    Ok(Json(serde_json::json!({
        "weight_kg": weight_kg,
        "total_dose": result.total_dose,
        "total_dose_display": result.total_dose.to_string(),
        "volume": result.volume,
        "volume_display": result.volume.to_string(),
    })))
}

async fn drip_handler(
    body: Result<Json<DripRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Response> {
    let request = json_body(body)?;
    let rate = drip_rate(&request)?;
    Ok(Json(serde_json::json!({
        "rate": rate,
        "rate_display": rate.to_string(),
    })))
}

#[derive(Deserialize)]
struct ConvertBody {
    value: f64,
    from: WeightUnit,
    to: WeightUnit,
}

async fn convert_handler(
    body: Result<Json<ConvertBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, Response> {
    let body = json_body(body)?;
    let result = convert_weight(body.value, body.from, body.to)?;
    Ok(Json(serde_json::json!({
        "value": body.value,
        "from": body.from,
        "result": result,
        "to": body.to,
    })))
}
