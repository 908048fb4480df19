use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use notifier::{NotificationError, Notifier};
use shared::domain::GuestResponse;
use storage::{ReconnectPolicy, Storage, StoreConnection};
use tokio::sync::mpsc;

use crate::ApiContext;

pub(crate) struct RecordingNotifier {
    tx: mpsc::UnboundedSender<GuestResponse>,
}

impl RecordingNotifier {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<GuestResponse>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_rsvp(&self, response: &GuestResponse) -> Result<(), NotificationError> {
        let _ = self.tx.send(response.clone());
        Ok(())
    }
}

pub(crate) struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify_rsvp(&self, _response: &GuestResponse) -> Result<(), NotificationError> {
        Err(NotificationError::TimedOut(Duration::from_millis(1)))
    }
}

pub(crate) async fn memory_context() -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    ApiContext::new(Arc::new(StoreConnection::from_storage(storage)))
}

/// A context whose store can never be opened: its parent path is a regular file.
pub(crate) fn unreachable_context(root: &tempfile::TempDir) -> ApiContext {
    let blocker = root.path().join("blocker");
    std::fs::write(&blocker, b"file").expect("blocker");
    let url = format!(
        "sqlite://{}",
        blocker.join("wedding.db").to_string_lossy().replace('\\', "/")
    );
    let policy = ReconnectPolicy {
        attempts: 1,
        delay: Duration::from_millis(1),
        timeout: Duration::from_secs(1),
    };
    ApiContext::new(Arc::new(StoreConnection::disconnected(url, policy)))
}
