use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::InteractionChannel,
    error::{ApiError, ErrorCode},
    protocol::{
        BridgeTool, LogInteractionInput, ToolCall, ToolStatus, VoiceRsvpInput, WeddingInfo,
    },
};
use tracing::{info, warn};

use crate::{get_settings, storage_error, submit_response, unavailable, ApiContext};

/// Stateless dispatch for the conversational agent's tool calls. Each call is
/// independent; repeating `add_rsvp` stores a second response. Once its guest
/// is stored `add_rsvp` reports success, even if the voice log entry is lost.
pub async fn dispatch_tool(ctx: &ApiContext, call: ToolCall) -> Result<Value, ApiError> {
    let Some(tool) = BridgeTool::parse(&call.tool_name) else {
        warn!(tool = %call.tool_name, "unknown bridge tool");
        return Err(ApiError::new(
            ErrorCode::UnknownCommand,
            format!("unknown tool '{}'", call.tool_name),
        ));
    };
    info!(tool = tool.name(), "bridge tool invoked");

    match tool {
        BridgeTool::GetWeddingInfo => {
            let settings = get_settings(ctx).await?;
            to_json(&WeddingInfo {
                schedule: settings.schedule,
                mood: settings.mood,
                location: ctx.venue_location.clone(),
            })
        }
        BridgeTool::AddRsvp => {
            let input: VoiceRsvpInput = parameters(call.parameters)?;
            let phone = input
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string);
            let guest = submit_response(ctx, input.rsvp, true).await?;
            let subject = phone.unwrap_or_else(|| guest.name.clone());
            let summary = format!("Voice RSVP for {} ({} ppl)", guest.name, guest.party_size);
            if let Err(error) =
                record_interaction(ctx, &subject, &summary, InteractionChannel::Voice).await
            {
                warn!(
                    guest_id = guest.id.0,
                    error = %error.message,
                    "voice rsvp stored without its interaction log"
                );
            }
            to_json(&ToolStatus::success())
        }
        BridgeTool::LogInteraction => {
            let input: LogInteractionInput = parameters(call.parameters)?;
            let subject = input.subject_identifier.trim();
            if subject.is_empty() {
                return Err(ApiError::validation("subjectIdentifier is required"));
            }
            record_interaction(ctx, subject, &input.summary, input.channel).await?;
            to_json(&ToolStatus::success())
        }
    }
}

async fn record_interaction(
    ctx: &ApiContext,
    subject: &str,
    summary: &str,
    channel: InteractionChannel,
) -> Result<(), ApiError> {
    let storage = ctx.store.storage().await.map_err(unavailable)?;
    storage
        .insert_interaction_log(subject, summary, channel)
        .await
        .map_err(storage_error)?;
    Ok(())
}

fn parameters<T: DeserializeOwned>(raw: Value) -> Result<T, ApiError> {
    let raw = if raw.is_null() {
        Value::Object(Default::default())
    } else {
        raw
    };
    serde_json::from_value(raw).map_err(|e| ApiError::validation(format!("invalid parameters: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::new(ErrorCode::Internal, e.to_string()))
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
