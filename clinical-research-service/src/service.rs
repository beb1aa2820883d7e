use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use dashmap::DashMap;
use research_flow::{
    CancelToken, ContextEngine, FlowError, GenerationClient, HeuristicValidator,
    InMemoryInvestigationStore, InvestigationStore, PostgresInvestigationStore, ResearchPipeline,
    SourceValidator,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::models::{
    FeedbackRequest, InvestigationStatusResponse, StartInvestigationRequest,
    StartInvestigationResponse, StepActionResponse,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "investigation_id": id
        })),
    )
}

fn conflict_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn bad_gateway_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn map_flow_error(err: &FlowError, id: &str) -> ApiError {
    match err {
        FlowError::InvestigationNotFound(missing) => {
            not_found_error("Investigation not found", missing)
        }
        FlowError::InvalidPhase(detail) => {
            conflict_error("Operation not valid in the current phase", detail)
        }
        FlowError::NoCompletedSteps => conflict_error(
            "No completed steps to synthesize",
            "complete at least one step first",
        ),
        FlowError::StepNotFound(step_id) => {
            bad_request_error(&format!("Step {step_id} not found"))
        }
        FlowError::Generation(detail) => bad_gateway_error("Generation failed", detail),
        FlowError::Storage(detail) => internal_error("Storage failure", detail),
        FlowError::Cancelled => conflict_error("Investigation cancelled", id),
    }
}

/// One resident investigation. The token is kept outside the mutex so a
/// cancel request can take effect while an operation holds the lock.
#[derive(Clone)]
pub struct InvestigationHandle {
    pipeline: Arc<Mutex<ResearchPipeline>>,
    cancel: CancelToken,
}

#[derive(Clone)]
pub struct AppState {
    pub generation: Arc<dyn GenerationClient>,
    pub validator: Arc<dyn SourceValidator>,
    pub store: Arc<dyn InvestigationStore>,
    live: Arc<DashMap<String, InvestigationHandle>>,
}

impl AppState {
    pub fn new(
        generation: Arc<dyn GenerationClient>,
        validator: Arc<dyn SourceValidator>,
        store: Arc<dyn InvestigationStore>,
    ) -> Self {
        Self {
            generation,
            validator,
            store,
            live: Arc::new(DashMap::new()),
        }
    }
}

pub async fn create_app() -> Router {
    let app_state = create_app_state().await;
    build_router(app_state)
}

async fn create_app_state() -> AppState {
    let generation = create_generation_client();
    let store = create_store().await;
    AppState::new(generation, Arc::new(HeuristicValidator::new()), store)
}

fn create_generation_client() -> Arc<dyn GenerationClient> {
    if std::env::var("GEMINI_API_KEY").is_ok() {
        match research_flow::gemini::GeminiClient::from_env() {
            Ok(client) => {
                info!("Using Gemini generation backend");
                return Arc::new(client);
            }
            Err(e) => error!("Failed to build Gemini client: {}", e),
        }
    }
    match research_flow::openrouter::OpenRouterClient::from_env() {
        Ok(client) => {
            info!("Using OpenRouter generation backend");
            Arc::new(client)
        }
        Err(e) => {
            error!("No generation backend configured: {}", e);
            std::process::exit(1);
        }
    }
}

async fn create_store() -> Arc<dyn InvestigationStore> {
    if let Ok(database_url) = std::env::var("DATABASE_URL") {
        info!("Using PostgreSQL investigation storage");
        match PostgresInvestigationStore::connect(&database_url).await {
            Ok(store) => return Arc::new(store),
            Err(e) => error!(
                "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                e
            ),
        }
    } else {
        info!("Using in-memory investigation storage (set DATABASE_URL to use PostgreSQL)");
    }
    Arc::new(InMemoryInvestigationStore::new())
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();
    request.headers_mut().insert(
        "x-correlation-id",
        HeaderValue::from_str(&correlation_id).unwrap(),
    );
    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/research", post(start_investigation).get(list_investigations))
        .route("/research/{id}", get(get_investigation))
        .route("/research/{id}/step", post(execute_step))
        .route("/research/{id}/report", post(synthesize_report))
        .route("/research/{id}/feedback", post(provide_feedback))
        .route("/research/{id}/cancel", post(cancel_investigation))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Clinical Research Assistant Service",
        "version": "1.0.0",
        "description": "AI-assisted clinical research investigations with clinician-in-the-loop control",
        "endpoints": {
            "POST /research": "Start a new investigation from a clinical query",
            "GET /research": "List known investigation ids",
            "GET /research/{id}": "Get investigation state and context summary",
            "POST /research/{id}/step": "Execute the next research step",
            "POST /research/{id}/report": "Synthesize the final report",
            "POST /research/{id}/feedback": "Attach clinician feedback to a step",
            "POST /research/{id}/cancel": "Cancel the investigation",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn start_investigation(
    State(state): State<AppState>,
    Json(request): Json<StartInvestigationRequest>,
) -> ApiResult<StartInvestigationResponse> {
    if request.query.trim().is_empty() {
        return Err(bad_request_error("Query is required"));
    }
    let id_provided = request.investigation_id.is_some();
    let investigation_id = request
        .investigation_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    if id_provided && Uuid::parse_str(&investigation_id).is_err() {
        return Err(bad_request_error("Invalid investigation id format"));
    }
    info!(
        investigation_id = %investigation_id,
        mode = ?request.mode,
        query_length = %request.query.len(),
        "Starting investigation"
    );

    let handle = match state.store.get(&investigation_id).await {
        // A known id resumes; the pipeline's phase guard decides whether a
        // fresh start is legal (it is from Idle and Error).
        Ok(Some(_)) => get_or_rehydrate(&state, &investigation_id).await?,
        Ok(None) => match state.live.get(&investigation_id) {
            Some(live) => live.clone(),
            None => create_handle(&state, &investigation_id),
        },
        Err(e) => {
            error!("Failed to load investigation {}: {}", investigation_id, e);
            return Err(internal_error("Failed to load investigation", &e.to_string()));
        }
    };

    let mut pipeline = handle.pipeline.lock().await;
    if let Err(e) = state.store.save(pipeline.snapshot()).await {
        warn!(
            investigation_id = %investigation_id,
            error = %e,
            "Failed to persist initial snapshot"
        );
    }
    let result = pipeline
        .start_investigation(&request.query, request.mode)
        .await
        .map_err(|e| map_flow_error(&e, &investigation_id))?;

    Ok(Json(StartInvestigationResponse {
        investigation_id: investigation_id.clone(),
        mode: pipeline.state().metadata.mode,
        status: format!("{:?}", result.status),
        plan: pipeline.state().plan.clone(),
        response: result.response,
    }))
}

async fn list_investigations(State(state): State<AppState>) -> ApiResult<Value> {
    let ids = state.store.list_ids().await.map_err(|e| {
        error!("Failed to list investigations: {}", e);
        internal_error("Failed to list investigations", &e.to_string())
    })?;
    Ok(Json(json!({
        "count": ids.len(),
        "investigations": ids
    })))
}

async fn get_investigation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<InvestigationStatusResponse> {
    match state.store.get(&id).await {
        Ok(Some(record)) => {
            let mut investigation_state = record.state;
            // A cancel may not have hit the store yet while a generation
            // call is in flight; the live token is authoritative.
            if let Some(handle) = state.live.get(&id) {
                if handle.cancel.is_cancelled() {
                    investigation_state.cancelled = true;
                }
            }
            let context_summary = ContextEngine::summarize(&record.context);
            Ok(Json(InvestigationStatusResponse {
                investigation_id: id,
                state: investigation_state,
                patient_summary: record.patient_summary,
                context_summary,
            }))
        }
        Ok(None) => Err(not_found_error("Investigation not found", &id)),
        Err(e) => {
            error!("Failed to load investigation {}: {}", id, e);
            Err(internal_error("Failed to load investigation", &e.to_string()))
        }
    }
}

async fn execute_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StepActionResponse> {
    let handle = get_or_rehydrate(&state, &id).await?;
    let mut pipeline = handle.pipeline.lock().await;
    let result = pipeline
        .execute_next_step()
        .await
        .map_err(|e| map_flow_error(&e, &id))?;
    Ok(Json(StepActionResponse {
        investigation_id: id,
        status: format!("{:?}", result.status),
        response: result.response,
        remaining_steps: pipeline.state().remaining_steps(),
    }))
}

async fn synthesize_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StepActionResponse> {
    let handle = get_or_rehydrate(&state, &id).await?;
    let mut pipeline = handle.pipeline.lock().await;
    let result = pipeline
        .generate_report()
        .await
        .map_err(|e| map_flow_error(&e, &id))?;
    Ok(Json(StepActionResponse {
        investigation_id: id,
        status: format!("{:?}", result.status),
        response: result.response,
        remaining_steps: pipeline.state().remaining_steps(),
    }))
}

async fn provide_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<Value> {
    if request.feedback.trim().is_empty() {
        return Err(bad_request_error("Feedback cannot be empty"));
    }
    let handle = get_or_rehydrate(&state, &id).await?;
    let mut pipeline = handle.pipeline.lock().await;
    pipeline
        .attach_step_feedback(request.step_id, request.feedback.as_str())
        .await
        .map_err(|e| map_flow_error(&e, &id))?;
    info!(investigation_id = %id, step_id = %request.step_id, "Feedback recorded");
    Ok(Json(json!({
        "investigation_id": id,
        "step_id": request.step_id,
        "status": "feedback-recorded"
    })))
}

async fn cancel_investigation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    // Flip the token before taking the lock so an in-flight generation call
    // is discarded instead of waited for.
    if let Some(handle) = state.live.get(&id) {
        handle.cancel.cancel();
    }
    let handle = get_or_rehydrate(&state, &id).await?;
    let mut pipeline = handle.pipeline.lock().await;
    pipeline.cancel().await;
    Ok(Json(json!({
        "investigation_id": id,
        "status": "cancelled"
    })))
}

fn create_handle(state: &AppState, id: &str) -> InvestigationHandle {
    let pipeline = ResearchPipeline::new(id, state.generation.clone())
        .with_validator(state.validator.clone())
        .with_store(state.store.clone());
    let handle = InvestigationHandle {
        cancel: pipeline.cancel_token(),
        pipeline: Arc::new(Mutex::new(pipeline)),
    };
    state.live.entry(id.to_string()).or_insert(handle).clone()
}

async fn get_or_rehydrate(state: &AppState, id: &str) -> Result<InvestigationHandle, ApiError> {
    if let Some(handle) = state.live.get(id) {
        return Ok(handle.clone());
    }
    let record = state.store.get(id).await.map_err(|e| {
        error!("Failed to load investigation {}: {}", id, e);
        internal_error("Failed to load investigation", &e.to_string())
    })?;
    let Some(record) = record else {
        return Err(not_found_error("Investigation not found", id));
    };
    info!(investigation_id = %id, "Rehydrating investigation from storage");
    let pipeline = ResearchPipeline::resume(record, state.generation.clone())
        .with_validator(state.validator.clone())
        .with_store(state.store.clone());
    let handle = InvestigationHandle {
        cancel: pipeline.cancel_token(),
        pipeline: Arc::new(Mutex::new(pipeline)),
    };
    Ok(state.live.entry(id.to_string()).or_insert(handle).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request as HttpRequest, header};
    use research_flow::{GeneratedContent, GenerationRequest};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tower::ServiceExt;

    struct ScriptedClient {
        responses: StdMutex<VecDeque<String>>,
    }

    impl ScriptedClient {
        fn new(texts: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(texts.iter().map(|t| t.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> research_flow::Result<GeneratedContent> {
            let text = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted client ran out of responses");
            Ok(GeneratedContent {
                text,
                sources: Vec::new(),
            })
        }
    }

    fn test_app(texts: &[&str]) -> Router {
        let state = AppState::new(
            ScriptedClient::new(texts),
            Arc::new(HeuristicValidator::new()),
            Arc::new(InMemoryInvestigationStore::new()),
        );
        build_router(state)
    }

    async fn send(app: &Router, request: HttpRequest<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> HttpRequest<Body> {
        HttpRequest::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_uri(uri: &str) -> HttpRequest<Body> {
        HttpRequest::get(uri).body(Body::empty()).unwrap()
    }

    const PLAN_TEXT: &str =
        "1. Identify symptoms\n2. Review the differential\n3. Check guidelines\n4. Summarize";

    #[tokio::test]
    async fn health_endpoint_responds() {
        let app = test_app(&[]);
        let (status, body) = send(&app, get_uri("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn manual_flow_over_http() {
        let app = test_app(&[
            PLAN_TEXT,
            "Symptoms identified.",
            "Final report: conservative management.",
        ]);

        let (status, body) = send(
            &app,
            post_json(
                "/research",
                json!({ "query": "Mild intermittent dry eye symptoms", "mode": "manual" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "PlanReady");
        assert_eq!(body["mode"], "manual");
        assert_eq!(body["plan"].as_array().unwrap().len(), 4);
        let id = body["investigation_id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, post_json(&format!("/research/{id}/step"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "StepCompleted");
        assert_eq!(body["remaining_steps"], 3);

        let (status, body) =
            send(&app, post_json(&format!("/research/{id}/report"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ReportReady");
        assert!(body["response"].as_str().unwrap().contains("conservative"));

        let (status, body) = send(&app, get_uri(&format!("/research/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["phase"], "completed");
        assert!(!body["context_summary"].as_str().unwrap().is_empty());

        let (status, body) = send(&app, get_uri("/research")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn unknown_investigation_is_not_found() {
        let app = test_app(&[]);
        let missing = Uuid::new_v4();
        let (status, _) = send(&app, get_uri(&format!("/research/{missing}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            send(&app, post_json(&format!("/research/{missing}/step"), json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let app = test_app(&[]);
        let (status, _) = send(&app, post_json("/research", json!({ "query": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            post_json(
                "/research",
                json!({ "query": "ojo rojo", "investigation_id": "not-a-uuid" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancel_is_reflected_in_status() {
        let app = test_app(&[PLAN_TEXT]);
        let (_, body) = send(
            &app,
            post_json("/research", json!({ "query": "Mild dry eye", "mode": "manual" })),
        )
        .await;
        let id = body["investigation_id"].as_str().unwrap().to_string();

        let (status, body) =
            send(&app, post_json(&format!("/research/{id}/cancel"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");

        let (status, body) = send(&app, get_uri(&format!("/research/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["cancelled"], true);

        // Operations after cancellation short-circuit instead of failing.
        let (status, body) = send(&app, post_json(&format!("/research/{id}/step"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Cancelled");
    }

    #[tokio::test]
    async fn report_without_completed_steps_conflicts() {
        let app = test_app(&[PLAN_TEXT]);
        let (_, body) = send(
            &app,
            post_json("/research", json!({ "query": "Mild dry eye", "mode": "manual" })),
        )
        .await;
        let id = body["investigation_id"].as_str().unwrap().to_string();

        let (status, body) =
            send(&app, post_json(&format!("/research/{id}/report"), json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "No completed steps to synthesize");
    }
}
