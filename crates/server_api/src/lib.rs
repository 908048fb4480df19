use std::{sync::Arc, time::Duration};

use chrono::Utc;
use notifier::{DisabledNotifier, Notifier};
use shared::{
    domain::ActorContext,
    error::ApiError,
    protocol::{HealthResponse, StateUpdateRequest, SuccessResponse},
};
use storage::{StoreConnection, StoreUnavailable};

mod aggregate;
mod bridge;
pub mod defaults;
mod rsvp;
mod settings;

pub use aggregate::{fallback_view, get_aggregate_view};
pub use bridge::dispatch_tool;
pub use rsvp::{resolve_answers, submit_response};
pub use settings::{apply_patch, field_changes, get_settings, FieldChange};

const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<StoreConnection>,
    pub notifier: Arc<dyn Notifier>,
    pub venue_location: String,
    pub notification_timeout: Duration,
}

impl ApiContext {
    pub fn new(store: Arc<StoreConnection>) -> Self {
        Self {
            store,
            notifier: Arc::new(DisabledNotifier),
            venue_location: defaults::DEFAULT_VENUE_LOCATION.to_string(),
            notification_timeout: DEFAULT_NOTIFICATION_TIMEOUT,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_venue_location(mut self, venue_location: impl Into<String>) -> Self {
        self.venue_location = venue_location.into();
        self
    }
}

/// Handles a `POST /api/state` body: the RSVP first, then the settings patch.
pub async fn apply_state_update(
    ctx: &ApiContext,
    request: StateUpdateRequest,
    actor: &ActorContext,
) -> Result<SuccessResponse, ApiError> {
    if let Some(new_response) = request.new_response {
        submit_response(ctx, new_response, false).await?;
    }
    if !request.patch.is_empty() {
        apply_patch(ctx, request.patch, actor).await?;
    }
    Ok(SuccessResponse { success: true })
}

pub async fn health(ctx: &ApiContext) -> HealthResponse {
    let db_connected = ctx.store.is_connected().await;
    HealthResponse {
        status: if db_connected { "ok" } else { "degraded" }.to_string(),
        db_connected,
        timestamp: Utc::now(),
    }
}

fn unavailable(err: StoreUnavailable) -> ApiError {
    ApiError::storage_unavailable(err.to_string())
}

fn storage_error(err: anyhow::Error) -> ApiError {
    ApiError::storage_unavailable(format!("{err:#}"))
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
