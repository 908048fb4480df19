use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use notifier::{DisabledNotifier, MailRelayNotifier, Notifier};
use serde_json::Value;
use server_api::{apply_state_update, dispatch_tool, get_aggregate_view, ApiContext};
use shared::{
    domain::ActorContext,
    error::{ApiError, ErrorCode},
    protocol::{
        AggregateView, HealthResponse, StateUpdateRequest, SuccessResponse, ToolCall,
        HEALTH_ROUTE, STATE_ROUTE, WEBHOOK_ROUTE_PREFIX,
    },
};
use storage::StoreConnection;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

const MAX_BODY_BYTES: usize = 1024 * 1024;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url);
    let store = StoreConnection::connect(database_url.clone(), settings.reconnect_policy()).await;
    if !store.is_connected().await {
        warn!(
            %database_url,
            "starting without a store connection; reads serve the fallback view until it recovers"
        );
    }

    let notifier: Arc<dyn Notifier> = match settings.mail_relay() {
        Some(relay) => {
            info!(recipient = %relay.recipient, "rsvp mail notifications enabled");
            Arc::new(MailRelayNotifier::new(relay))
        }
        None => {
            info!("mail relay not configured; rsvp notifications disabled");
            Arc::new(DisabledNotifier)
        }
    };

    let api = ApiContext::new(Arc::new(store))
        .with_notifier(notifier)
        .with_venue_location(settings.venue_location.clone());
    let cors = cors_layer(settings.cors_origin.as_deref())?;
    let app = build_router(Arc::new(AppState { api }), cors);

    let addr = settings.bind_addr()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn cors_layer(origin: Option<&str>) -> anyhow::Result<CorsLayer> {
    let Some(origin) = origin.map(str::trim).filter(|o| !o.is_empty() && *o != "*") else {
        return Ok(CorsLayer::permissive());
    };
    Ok(CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route(STATE_ROUTE, get(http_get_state).post(http_post_state))
        .route(WEBHOOK_ROUTE_PREFIX, post(http_webhook))
        .route(&format!("{WEBHOOK_ROUTE_PREFIX}/:agent_tool"), post(http_webhook))
        .route(HEALTH_ROUTE, get(http_health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::UnknownCommand => StatusCode::NOT_FOUND,
        ErrorCode::StorageUnavailable | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(error: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(error.code), Json(error))
}

/// Who made an admin change: the browser's user agent and the client address,
/// preferring the first `X-Forwarded-For` hop when behind a proxy.
fn actor_context(headers: &HeaderMap, peer: Option<SocketAddr>) -> ActorContext {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    ActorContext {
        user_agent,
        source_address: forwarded.or_else(|| peer.map(|addr| addr.ip().to_string())),
    }
}

async fn http_get_state(State(state): State<Arc<AppState>>) -> Json<AggregateView> {
    Json(get_aggregate_view(&state.api).await)
}

async fn http_post_state(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<StateUpdateRequest>,
) -> ApiResult<SuccessResponse> {
    let actor = actor_context(&headers, peer.map(|ConnectInfo(addr)| addr));
    apply_state_update(&state.api, req, &actor)
        .await
        .map(Json)
        .map_err(reject)
}

async fn http_webhook(
    State(state): State<Arc<AppState>>,
    agent_tool: Option<Path<String>>,
    Json(call): Json<ToolCall>,
) -> ApiResult<Value> {
    if let Some(Path(agent_tool)) = &agent_tool {
        info!(%agent_tool, tool = %call.tool_name, "webhook call");
    }
    dispatch_tool(&state.api, call).await.map(Json).map_err(reject)
}

async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(server_api::health(&state.api).await)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
