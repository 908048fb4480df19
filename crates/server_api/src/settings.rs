use serde::Serialize;
use shared::{
    domain::{ActorContext, AdminChangeLog, Settings},
    error::{ApiError, ErrorCode},
    protocol::SettingsPatch,
};
use tracing::info;

use crate::{defaults::default_settings, storage_error, unavailable, ApiContext};

/// One top-level settings field whose canonical serialization differs from the patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field_name: &'static str,
    pub previous_value_serialized: String,
    pub new_value_serialized: String,
}

/// Returns the settings singleton, creating it from defaults on an empty store.
pub async fn get_settings(ctx: &ApiContext) -> Result<Settings, ApiError> {
    let storage = ctx.store.storage().await.map_err(unavailable)?;
    if let Some(settings) = storage.load_settings().await.map_err(storage_error)? {
        return Ok(settings);
    }

    let settings = storage
        .insert_settings_if_absent(&default_settings())
        .await
        .map_err(storage_error)?;
    info!("created default settings document");
    Ok(settings)
}

/// Diffs `patch` against the stored document, logs each changed field, then
/// commits only those fields. Concurrent patches to different fields both land;
/// patches to the same field race and the last write wins.
pub async fn apply_patch(
    ctx: &ApiContext,
    patch: SettingsPatch,
    actor: &ActorContext,
) -> Result<Vec<AdminChangeLog>, ApiError> {
    if patch.is_empty() {
        return Ok(Vec::new());
    }

    let storage = ctx.store.storage().await.map_err(unavailable)?;
    let current = storage.load_settings().await.map_err(storage_error)?;
    let exists = current.is_some();
    let base = current.unwrap_or_else(default_settings);

    let changes = field_changes(&base, &patch)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("unserializable settings value: {e}")))?;

    let mut logs = Vec::with_capacity(changes.len());
    for change in &changes {
        let log = storage
            .insert_admin_change_log(
                change.field_name,
                &change.previous_value_serialized,
                &change.new_value_serialized,
                actor,
            )
            .await
            .map_err(storage_error)?;
        info!(
            field = change.field_name,
            old = %change.previous_value_serialized,
            new = %change.new_value_serialized,
            user_agent = actor.user_agent.as_deref().unwrap_or("-"),
            source = actor.source_address.as_deref().unwrap_or("-"),
            "admin updated setting"
        );
        logs.push(log);
    }

    if exists && changes.is_empty() {
        return Ok(logs);
    }

    let fields: Vec<(&str, &str)> = changes
        .iter()
        .map(|c| (c.field_name, c.new_value_serialized.as_str()))
        .collect();
    storage
        .update_settings_fields(&base, &fields)
        .await
        .map_err(storage_error)?;
    Ok(logs)
}

fn push_change<T: Serialize>(
    changes: &mut Vec<FieldChange>,
    field_name: &'static str,
    current: &T,
    new: Option<&T>,
) -> serde_json::Result<()> {
    let Some(new) = new else {
        return Ok(());
    };
    let current = serde_json::to_value(current)?;
    let new = serde_json::to_value(new)?;
    if current != new {
        changes.push(FieldChange {
            field_name,
            previous_value_serialized: current.to_string(),
            new_value_serialized: new.to_string(),
        });
    }
    Ok(())
}

/// Field-level changes `patch` would make to `current`, in declaration order.
/// Equality is on the JSON value, so re-sending the stored value is a no-op.
pub fn field_changes(
    current: &Settings,
    patch: &SettingsPatch,
) -> serde_json::Result<Vec<FieldChange>> {
    let mut changes = Vec::new();
    push_change(&mut changes, "rsvpOpen", &current.rsvp_open, patch.rsvp_open.as_ref())?;
    push_change(&mut changes, "maxGuests", &current.max_guests, patch.max_guests.as_ref())?;
    push_change(
        &mut changes,
        "adminPassword",
        &current.admin_password,
        patch.admin_password.as_ref(),
    )?;
    push_change(
        &mut changes,
        "voiceAgentId",
        &current.voice_agent_id,
        patch.voice_agent_id.as_ref(),
    )?;
    push_change(&mut changes, "schedule", &current.schedule, patch.schedule.as_ref())?;
    push_change(&mut changes, "questions", &current.questions, patch.questions.as_ref())?;
    push_change(
        &mut changes,
        "lodgingInfo",
        &current.lodging_info,
        patch.lodging_info.as_ref(),
    )?;
    push_change(&mut changes, "travelInfo", &current.travel_info, patch.travel_info.as_ref())?;
    push_change(&mut changes, "mood", &current.mood, patch.mood.as_ref())?;
    push_change(&mut changes, "religion", &current.religion, patch.religion.as_ref())?;
    Ok(changes)
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
