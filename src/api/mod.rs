pub mod auth;
pub mod envelope;

use anyhow::Context;
use axum::{
    Extension, Json, Router,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::AppConfig;
use crate::core::{ProfileInput, SimulationInput, prompt, run_simulation};
use crate::dashboard::{ConsumptionDataset, DashboardQuery};
use crate::gateway::{GeminiClient, TextGenerator};
use crate::history::{HistoryRecord, HistoryRepository, JsonFileHistory};
use auth::{Credentials, LoginLimiter, SessionContext, SessionStore};
use envelope::{ApiError, ApiResult, failure, now_iso, ok};

pub struct AppState {
    pub generator: Arc<dyn TextGenerator>,
    pub history: Arc<dyn HistoryRepository>,
    pub sessions: SessionStore,
    pub credentials: Credentials,
    pub dashboard: ConsumptionDataset,
    pub login_limiter: LoginLimiter,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let client = GeminiClient::new(config.gateway.clone())
            .context("failed to configure the Gemini client")?;
        if !client.has_api_key() {
            log::warn!("GEMINI_API_KEY is not set; AI endpoints will report a configuration error");
        }

        let secret = config.secret_key.clone().unwrap_or_else(|| {
            log::warn!("SECRET_KEY is not set; sessions will not survive a restart");
            auth::random_secret()
        });

        let credentials = Credentials::new(config.login_user.clone(), &config.login_password)
            .map_err(anyhow::Error::msg)?;

        let dashboard = ConsumptionDataset::load(&config.dashboard_csv).with_context(|| {
            format!(
                "failed to read dashboard data from {}",
                config.dashboard_csv.display()
            )
        })?;

        Ok(Self {
            generator: Arc::new(client),
            history: Arc::new(JsonFileHistory::new(config.history_file.clone())),
            sessions: SessionStore::new(secret, config.session_ttl),
            credentials,
            dashboard,
            login_limiter: auth::login_limiter(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/logout", post(auth::logout_handler))
        .route(
            "/engagement/profile/questions",
            get(profile_questions_handler),
        )
        .route("/engagement/profile", post(analyze_profile_handler))
        .route(
            "/engagement/financial_advice",
            post(financial_advice_handler),
        )
        .route(
            "/engagement/investment_simulation",
            post(investment_simulation_handler),
        )
        .route("/support/chat", post(chat_handler))
        .route("/support/get_history", get(history_handler))
        .route("/dashboard/data", get(dashboard_handler))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_session,
        ));

    Router::new()
        .route("/login", post(auth::login_handler))
        .merge(protected)
        .fallback(not_found_handler)
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

pub async fn run_http_server(config: AppConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    log::info!(
        "history file: {}, dashboard data: {}, provider retries: {} x {:?}",
        config.history_file.display(),
        config.dashboard_csv.display(),
        config.gateway.retry.max_attempts,
        config.gateway.retry.delay
    );

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    log::info!("fin-assist listening on http://{}", config.listen);

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

fn panic_response(_: Box<dyn Any + Send + 'static>) -> Response {
    log::error!("handler panicked");
    failure(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error, please try again later",
    )
}

async fn not_found_handler() -> ApiError {
    ApiError::NotFound
}

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| ApiError::Validation("Invalid request format, JSON required".into()))
}

fn non_empty_text(body: &Value, field: &str) -> Option<String> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

async fn profile_questions_handler() -> Response {
    ok(json!({ "questions": prompt::PROFILE_QUESTIONS }))
}

async fn analyze_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let body = json_body(payload)?;
    let profile = ProfileInput::from_json(&body)?;

    let analysis = state
        .generator
        .generate(&prompt::build_profile_prompt(&profile))
        .await
        .map_err(|e| ApiError::from_gateway("Failed to generate analysis", e))?;
    if analysis.trim().is_empty() {
        return Err(ApiError::ProviderUnavailable(
            "Unable to generate analysis, please try again later".into(),
        ));
    }

    state
        .sessions
        .store_profile(session.session_id, profile)
        .await;

    Ok(ok(json!({
        "analysis": analysis,
        "profile_data": body,
        "timestamp": now_iso(),
    })))
}

async fn financial_advice_handler(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let body = json_body(payload)?;
    let question = non_empty_text(&body, "question")
        .ok_or_else(|| ApiError::Validation("Question cannot be empty".into()))?;

    let profile = session.profile.as_ref();
    let advice = state
        .generator
        .generate(&prompt::build_advice_prompt(&question, profile))
        .await
        .map_err(|e| ApiError::from_gateway("Failed to generate advice", e))?;
    if advice.trim().is_empty() {
        return Err(ApiError::ProviderUnavailable(
            "Unable to generate advice, please try again later".into(),
        ));
    }

    Ok(ok(json!({
        "advice": advice,
        "question": question,
        "timestamp": now_iso(),
    })))
}

async fn investment_simulation_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let body = json_body(payload)?;
    let input = SimulationInput::from_json(&body)?;
    let result = run_simulation(&input);

    // the schedule is still useful without commentary
    let ai_analysis = match state
        .generator
        .generate(&prompt::build_simulation_prompt(&result))
        .await
    {
        Ok(text) => text,
        Err(e) => format!("Unable to generate detailed analysis: {e}"),
    };

    Ok(ok(json!({
        "simulation_results": result,
        "ai_analysis": ai_analysis,
        "timestamp": now_iso(),
    })))
}

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Response> {
    let body = json_body(payload)?;
    let message = non_empty_text(&body, "message")
        .ok_or_else(|| ApiError::Validation("Message cannot be empty".into()))?;

    let reply = state
        .generator
        .generate(&prompt::build_chat_prompt(&message))
        .await
        .map_err(|e| ApiError::from_gateway("AI response generation failed", e))?;

    let record = HistoryRecord::now(message);
    let repository = Arc::clone(&state.history);
    let history = tokio::task::spawn_blocking(move || {
        repository.append(record.clone()).unwrap_or_else(|e| {
            log::error!("failed to save history: {e}");
            let mut history = repository.load();
            history.push(record);
            history
        })
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Request processing error: {e}")))?;

    Ok(ok(json!({
        "response": reply,
        "history": history,
    })))
}

async fn history_handler(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let repository = Arc::clone(&state.history);
    let history = tokio::task::spawn_blocking(move || repository.load())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to load history: {e}")))?;
    Ok(ok(json!({ "history": history })))
}

async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) =
        query.map_err(|e| ApiError::Validation(format!("Invalid dashboard filter: {e}")))?;
    Ok(ok(state.dashboard.view(query)))
}
