use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AdminChangeLog, GuestResponse, InteractionChannel, InteractionLog, LodgingOption, Question,
    ScheduleItem, Settings,
};

pub const STATE_ROUTE: &str = "/api/state";
pub const HEALTH_ROUTE: &str = "/api/health";
pub const WEBHOOK_ROUTE_PREFIX: &str = "/api/webhook";

pub const INTERACTION_LOG_READ_CAP: u32 = 50;
pub const ADMIN_CHANGE_LOG_READ_CAP: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpInput {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "attendingWith", skip_serializing_if = "Option::is_none")]
    pub companions: Option<String>,
    #[serde(default, alias = "guests", skip_serializing_if = "Option::is_none")]
    pub party_size: Option<i64>,
    /// Keyed by question field id or label.
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

/// `add_rsvp` parameters: the form fields plus the caller's number when known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceRsvpInput {
    #[serde(flatten)]
    pub rsvp: RsvpInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Closed set of settings fields an admin may change. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsvp_open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_guests: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<ScheduleItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Question>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lodging_info: Option<Vec<LodgingOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub religion: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_response: Option<RsvpInput>,
    #[serde(flatten)]
    pub patch: SettingsPatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Everything a client needs to render the site and the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateView {
    #[serde(flatten)]
    pub settings: Settings,
    pub responses: Vec<GuestResponse>,
    pub interaction_logs: Vec<InteractionLog>,
    pub admin_change_logs: Vec<AdminChangeLog>,
    /// Set when the store could not be read and the view is the fixed fallback.
    #[serde(default, skip_serializing_if = "is_false")]
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeTool {
    GetWeddingInfo,
    AddRsvp,
    LogInteraction,
}

impl BridgeTool {
    pub fn parse(tool_name: &str) -> Option<Self> {
        match tool_name {
            "get_wedding_info" => Some(Self::GetWeddingInfo),
            "add_rsvp" => Some(Self::AddRsvp),
            "log_interaction" => Some(Self::LogInteraction),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::GetWeddingInfo => "get_wedding_info",
            Self::AddRsvp => "add_rsvp",
            Self::LogInteraction => "log_interaction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeddingInfo {
    pub schedule: Vec<ScheduleItem>,
    pub mood: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInteractionInput {
    #[serde(alias = "subject")]
    pub subject_identifier: String,
    pub summary: String,
    #[serde(default = "default_interaction_channel")]
    pub channel: InteractionChannel,
}

fn default_interaction_channel() -> InteractionChannel {
    InteractionChannel::Text
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub status: String,
}

impl ToolStatus {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub db_connected: bool,
    pub timestamp: DateTime<Utc>,
}
