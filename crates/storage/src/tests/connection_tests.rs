use super::*;
use std::time::Duration;

fn quick_policy(attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        attempts,
        delay: Duration::from_millis(10),
        timeout: Duration::from_secs(2),
    }
}

/// A database url whose parent "directory" is a regular file, so opening always fails.
fn unreachable_url(root: &tempfile::TempDir) -> String {
    let blocker = root.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").expect("blocker file");
    let db_path = blocker.join("wedding.db");
    format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"))
}

#[tokio::test]
async fn connect_succeeds_for_reachable_store() {
    let connection = StoreConnection::connect("sqlite::memory:", quick_policy(2)).await;
    assert!(connection.is_connected().await);
    connection.storage().await.expect("storage");
}

#[tokio::test]
async fn connect_exhausts_attempts_and_starts_disconnected() {
    let root = tempfile::tempdir().expect("tempdir");
    let connection = StoreConnection::connect(unreachable_url(&root), quick_policy(3)).await;
    assert!(!connection.is_connected().await);

    let err = connection.storage().await.err().expect("unavailable");
    assert!(err.to_string().contains("unavailable"));
}

#[tokio::test]
async fn on_demand_reconnect_recovers_once_store_is_reachable() {
    let root = tempfile::tempdir().expect("tempdir");
    let url = unreachable_url(&root);
    let connection = StoreConnection::connect(url, quick_policy(1)).await;
    assert!(!connection.is_connected().await);

    std::fs::remove_file(root.path().join("blocker")).expect("remove blocker");

    connection.storage().await.expect("reconnected");
    assert!(connection.is_connected().await);
}

#[tokio::test]
async fn wrapped_storage_is_connected() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let connection = StoreConnection::from_storage(storage);
    assert!(connection.is_connected().await);
    assert!(connection.reconnect().await);
}
