use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
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
use storage::{Storage, StoreConnection};
use tokio::net::TcpListener;

type Rejection = (StatusCode, Json<ApiError>);

fn reject(error: ApiError) -> Rejection {
    let status = match error.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::UnknownCommand => StatusCode::NOT_FOUND,
        ErrorCode::StorageUnavailable | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error))
}

async fn state(State(ctx): State<Arc<ApiContext>>) -> Json<AggregateView> {
    Json(get_aggregate_view(&ctx).await)
}

async fn update(
    State(ctx): State<Arc<ApiContext>>,
    Json(req): Json<StateUpdateRequest>,
) -> Result<Json<SuccessResponse>, Rejection> {
    apply_state_update(&ctx, req, &ActorContext::default())
        .await
        .map(Json)
        .map_err(reject)
}

async fn webhook(
    State(ctx): State<Arc<ApiContext>>,
    Path(_agent): Path<String>,
    Json(call): Json<ToolCall>,
) -> Result<Json<Value>, Rejection> {
    dispatch_tool(&ctx, call).await.map(Json).map_err(reject)
}

async fn health(State(ctx): State<Arc<ApiContext>>) -> Json<HealthResponse> {
    Json(server_api::health(&ctx).await)
}

/// Serves the wedding routes over an in-memory store on an ephemeral port.
pub(crate) async fn spawn_state_server() -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let storage = Storage::new("sqlite::memory:").await?;
    let ctx = Arc::new(ApiContext::new(Arc::new(StoreConnection::from_storage(
        storage,
    ))));
    let app = Router::new()
        .route(STATE_ROUTE, get(state).post(update))
        .route(&format!("{WEBHOOK_ROUTE_PREFIX}/:agent_tool"), post(webhook))
        .route(HEALTH_ROUTE, get(health))
        .with_state(ctx);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}
