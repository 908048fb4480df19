use std::{sync::Arc, time::Duration};

use server_api::{apply_state_update, dispatch_tool, get_aggregate_view, ApiContext};
use serde_json::json;
use shared::{
    domain::ActorContext,
    protocol::{RsvpInput, SettingsPatch, StateUpdateRequest, ToolCall},
};
use storage::{ReconnectPolicy, StoreConnection};

fn policy() -> ReconnectPolicy {
    ReconnectPolicy {
        attempts: 1,
        delay: Duration::from_millis(1),
        timeout: Duration::from_secs(2),
    }
}

fn database_url(root: &tempfile::TempDir) -> String {
    format!(
        "sqlite://{}",
        root.path().join("data").join("wedding.db").to_string_lossy()
    )
}

#[tokio::test]
async fn state_survives_a_restart() {
    let root = tempfile::tempdir().expect("tempdir");
    let url = database_url(&root);

    {
        let store = StoreConnection::connect(url.clone(), policy()).await;
        assert!(store.is_connected().await);
        let ctx = ApiContext::new(Arc::new(store));

        apply_state_update(
            &ctx,
            StateUpdateRequest {
                new_response: Some(RsvpInput {
                    name: "Jane".to_string(),
                    party_size: Some(3),
                    ..RsvpInput::default()
                }),
                patch: SettingsPatch {
                    max_guests: Some(100),
                    ..SettingsPatch::default()
                },
            },
            &ActorContext::default(),
        )
        .await
        .expect("update");

        dispatch_tool(
            &ctx,
            ToolCall {
                tool_name: "add_rsvp".to_string(),
                parameters: json!({ "name": "Tariro", "partySize": 2 }),
            },
        )
        .await
        .expect("voice rsvp");
    }

    let store = StoreConnection::connect(url, policy()).await;
    let ctx = ApiContext::new(Arc::new(store));
    let view = get_aggregate_view(&ctx).await;

    assert!(!view.degraded);
    assert_eq!(view.settings.max_guests, 100);
    let names: Vec<_> = view.responses.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, ["Tariro", "Jane"]);
    assert_eq!(view.interaction_logs.len(), 1);
    assert_eq!(view.admin_change_logs.len(), 1);
    assert_eq!(view.admin_change_logs[0].previous_value_serialized, "250");
}

#[tokio::test]
async fn store_recovers_after_an_outage() {
    let root = tempfile::tempdir().expect("tempdir");
    let blocker = root.path().join("data");
    std::fs::write(&blocker, b"not a directory").expect("blocker");

    let store = Arc::new(StoreConnection::connect(database_url(&root), policy()).await);
    let ctx = ApiContext::new(store.clone());
    assert!(get_aggregate_view(&ctx).await.degraded);

    std::fs::remove_file(&blocker).expect("remove blocker");
    let view = get_aggregate_view(&ctx).await;
    assert!(!view.degraded);
    assert_eq!(view.settings.schedule.len(), 4);
    assert!(store.is_connected().await);
}
