use shared::{
    error::ApiError,
    protocol::{AggregateView, ADMIN_CHANGE_LOG_READ_CAP, INTERACTION_LOG_READ_CAP},
};
use tracing::warn;

use crate::{defaults::fallback_settings, get_settings, storage_error, unavailable, ApiContext};

/// Combined read of settings, responses and both logs. Never fails: when the
/// store can't be read the fixed fallback view is returned instead.
pub async fn get_aggregate_view(ctx: &ApiContext) -> AggregateView {
    match load_aggregate_view(ctx).await {
        Ok(view) => view,
        Err(error) => {
            warn!(code = ?error.code, message = %error.message, "serving fallback state view");
            fallback_view()
        }
    }
}

pub fn fallback_view() -> AggregateView {
    AggregateView {
        settings: fallback_settings(),
        responses: Vec::new(),
        interaction_logs: Vec::new(),
        admin_change_logs: Vec::new(),
        degraded: true,
    }
}

async fn load_aggregate_view(ctx: &ApiContext) -> Result<AggregateView, ApiError> {
    let settings = get_settings(ctx).await?;
    let storage = ctx.store.storage().await.map_err(unavailable)?;
    let (responses, interaction_logs, admin_change_logs) = tokio::try_join!(
        storage.list_guests(),
        storage.list_interaction_logs(INTERACTION_LOG_READ_CAP),
        storage.list_admin_change_logs(ADMIN_CHANGE_LOG_READ_CAP),
    )
    .map_err(storage_error)?;

    Ok(AggregateView {
        settings,
        responses,
        interaction_logs,
        admin_change_logs,
        degraded: false,
    })
}

#[cfg(test)]
#[path = "tests/aggregate_tests.rs"]
mod tests;
