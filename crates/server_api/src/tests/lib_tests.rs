use super::*;
use crate::test_support::{memory_context, unreachable_context};
use shared::{
    error::ErrorCode,
    protocol::{RsvpInput, SettingsPatch},
};

#[tokio::test]
async fn state_update_stores_rsvp_and_patch() {
    let ctx = memory_context().await;
    let actor = ActorContext {
        user_agent: Some("admin-browser".to_string()),
        source_address: Some("10.0.0.7".to_string()),
    };
    let request = StateUpdateRequest {
        new_response: Some(RsvpInput {
            name: "Jane".to_string(),
            party_size: Some(3),
            ..RsvpInput::default()
        }),
        patch: SettingsPatch {
            mood: Some("Garden party".to_string()),
            ..SettingsPatch::default()
        },
    };
    let response = apply_state_update(&ctx, request, &actor)
        .await
        .expect("update");
    assert!(response.success);

    let view = get_aggregate_view(&ctx).await;
    assert_eq!(view.responses[0].name, "Jane");
    assert_eq!(view.responses[0].party_size, 3);
    assert_eq!(view.settings.mood, "Garden party");
    assert_eq!(view.admin_change_logs.len(), 1);
    assert_eq!(view.admin_change_logs[0].actor_context, actor);
}

#[tokio::test]
async fn invalid_rsvp_skips_the_patch() {
    let ctx = memory_context().await;
    let request = StateUpdateRequest {
        new_response: Some(RsvpInput::default()),
        patch: SettingsPatch {
            rsvp_open: Some(false),
            ..SettingsPatch::default()
        },
    };
    let err = apply_state_update(&ctx, request, &ActorContext::default())
        .await
        .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::Validation);

    let settings = get_settings(&ctx).await.expect("settings");
    assert!(settings.rsvp_open);
}

#[tokio::test]
async fn empty_update_succeeds() {
    let ctx = memory_context().await;
    let response = apply_state_update(&ctx, StateUpdateRequest::default(), &ActorContext::default())
        .await
        .expect("update");
    assert!(response.success);
}

#[tokio::test]
async fn health_reports_connection_state() {
    let ctx = memory_context().await;
    let healthy = health(&ctx).await;
    assert!(healthy.db_connected);
    assert_eq!(healthy.status, "ok");

    let root = tempfile::tempdir().expect("tempdir");
    let ctx = unreachable_context(&root);
    let degraded = health(&ctx).await;
    assert!(!degraded.db_connected);
    assert_eq!(degraded.status, "degraded");
}
