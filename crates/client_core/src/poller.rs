use std::{sync::Arc, time::Duration};

use shared::protocol::AggregateView;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, warn};

use crate::{ClientError, StateClient};

/// Keeps the latest aggregate view on a watch channel. Polls on a fixed
/// interval; writers call `refresh_now` to see their change without waiting.
pub struct StatePoller {
    client: StateClient,
    latest: watch::Sender<Option<AggregateView>>,
}

impl StatePoller {
    pub fn new(client: StateClient) -> Arc<Self> {
        let (latest, _) = watch::channel(None);
        Arc::new(Self { client, latest })
    }

    pub fn client(&self) -> &StateClient {
        &self.client
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AggregateView>> {
        self.latest.subscribe()
    }

    pub fn latest(&self) -> Option<AggregateView> {
        self.latest.borrow().clone()
    }

    /// Fetches and publishes a fresh view. A failed fetch leaves the last
    /// published view in place.
    pub async fn refresh_now(&self) -> Result<AggregateView, ClientError> {
        let view = self.client.get_state().await?;
        debug!(
            responses = view.responses.len(),
            degraded = view.degraded,
            "state refreshed"
        );
        self.latest.send_replace(Some(view.clone()));
        Ok(view)
    }

    pub fn spawn(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(error) = poller.refresh_now().await {
                    warn!(%error, "state refresh failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
