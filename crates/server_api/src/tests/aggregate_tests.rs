use super::*;
use crate::{
    apply_patch, submit_response,
    test_support::{memory_context, unreachable_context},
};
use shared::{
    domain::{ActorContext, InteractionChannel},
    protocol::{RsvpInput, SettingsPatch},
};

#[tokio::test]
async fn empty_store_serves_defaults() {
    let ctx = memory_context().await;
    let view = get_aggregate_view(&ctx).await;
    assert!(!view.degraded);
    assert!(view.settings.rsvp_open);
    assert_eq!(view.settings.schedule.len(), 4);
    assert!(view.responses.is_empty());
    assert!(view.interaction_logs.is_empty());
    assert!(view.admin_change_logs.is_empty());
}

#[tokio::test]
async fn newest_response_is_listed_first() {
    let ctx = memory_context().await;
    for (name, size) in [("Ann", 1), ("Ben", 2), ("Jane", 3)] {
        submit_response(
            &ctx,
            RsvpInput {
                name: name.to_string(),
                party_size: Some(size),
                ..RsvpInput::default()
            },
            false,
        )
        .await
        .expect("rsvp");
    }

    let view = get_aggregate_view(&ctx).await;
    let names: Vec<_> = view.responses.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["Jane", "Ben", "Ann"]);
    assert_eq!(view.responses[0].party_size, 3);
}

#[tokio::test]
async fn logs_are_capped() {
    let ctx = memory_context().await;
    let storage = ctx.store.storage().await.expect("storage");
    for i in 0..(INTERACTION_LOG_READ_CAP + 5) {
        storage
            .insert_interaction_log(&format!("guest-{i}"), "hello", InteractionChannel::Text)
            .await
            .expect("log");
    }
    for i in 0..(ADMIN_CHANGE_LOG_READ_CAP as i64 + 3) {
        apply_patch(
            &ctx,
            SettingsPatch {
                max_guests: Some(300 + i),
                ..SettingsPatch::default()
            },
            &ActorContext::default(),
        )
        .await
        .expect("patch");
    }

    let view = get_aggregate_view(&ctx).await;
    assert_eq!(view.interaction_logs.len(), INTERACTION_LOG_READ_CAP as usize);
    assert_eq!(view.admin_change_logs.len(), ADMIN_CHANGE_LOG_READ_CAP as usize);
    assert_eq!(
        view.interaction_logs[0].subject_identifier,
        format!("guest-{}", INTERACTION_LOG_READ_CAP + 4)
    );
    assert_eq!(
        view.admin_change_logs[0].new_value_serialized,
        (300 + ADMIN_CHANGE_LOG_READ_CAP as i64 + 2).to_string()
    );
}

#[tokio::test]
async fn unreachable_store_serves_fallback() {
    let root = tempfile::tempdir().expect("tempdir");
    let ctx = unreachable_context(&root);
    let view = get_aggregate_view(&ctx).await;
    assert_eq!(view, fallback_view());
    assert!(view.degraded);
    assert!(view.settings.rsvp_open);
    assert!(view.settings.schedule.is_empty());
    assert!(view.settings.questions.is_empty());
    assert!(view.responses.is_empty());
}
