use std::collections::BTreeMap;

use notifier::spawn_notification;
use shared::{
    domain::{GuestResponse, Question},
    error::ApiError,
    protocol::RsvpInput,
};
use storage::NewGuest;
use tracing::info;

use crate::{get_settings, storage_error, unavailable, ApiContext};

/// Validates and stores one guest response, then fires the notification port.
///
/// Capacity (`maxGuests`) and `rsvpOpen` are not checked here; those gates
/// belong to the front end.
pub async fn submit_response(
    ctx: &ApiContext,
    input: RsvpInput,
    via_voice_agent: bool,
) -> Result<GuestResponse, ApiError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let party_size = input.party_size.unwrap_or(1);
    if party_size < 1 {
        return Err(ApiError::validation("partySize must be at least 1"));
    }

    let settings = get_settings(ctx).await?;
    let answers = resolve_answers(&settings.questions, input.answers);
    let companions = input
        .companions
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let storage = ctx.store.storage().await.map_err(unavailable)?;
    let guest = storage
        .insert_guest(NewGuest {
            name: name.to_string(),
            companions,
            party_size,
            answers,
            via_voice_agent,
        })
        .await
        .map_err(storage_error)?;
    info!(
        guest = %guest.name,
        party_size = guest.party_size,
        attending_with = guest.companions.as_deref().unwrap_or("alone"),
        via_voice_agent,
        "new rsvp recorded"
    );

    spawn_notification(ctx.notifier.clone(), guest.clone(), ctx.notification_timeout);
    Ok(guest)
}

/// Re-keys submitted answers by the current label of the question they belong
/// to. Answers may be keyed by field id or label; unknown keys pass through.
/// Labels are captured as they read now, so renaming a question later leaves
/// older answers under the old label.
pub fn resolve_answers(
    questions: &[Question],
    answers: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    answers
        .into_iter()
        .map(|(key, value)| {
            let label = questions
                .iter()
                .find(|q| q.field_id == key || q.label == key)
                .map(|q| q.label.clone())
                .unwrap_or(key);
            (label, value)
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/rsvp_tests.rs"]
mod tests;
