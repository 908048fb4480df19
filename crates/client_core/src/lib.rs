use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{
        AggregateView, HealthResponse, RsvpInput, SettingsPatch, StateUpdateRequest,
        SuccessResponse, ToolCall, HEALTH_ROUTE, STATE_ROUTE, WEBHOOK_ROUTE_PREFIX,
    },
};
use thiserror::Error;
use url::Url;

mod poller;

pub use poller::StatePoller;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("server url '{0}' cannot carry a path")]
    CannotBeBase(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {}", .error.message)]
    Api { status: StatusCode, error: ApiError },
}

impl ClientError {
    pub fn api_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Api { error, .. } => Some(error.code),
            _ => None,
        }
    }
}

/// Thin HTTP client over the state, webhook and health routes.
#[derive(Debug, Clone)]
pub struct StateClient {
    http: Client,
    base_url: Url,
}

impl StateClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(server_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::CannotBeBase(server_url.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get_state(&self) -> Result<AggregateView, ClientError> {
        let res = self.http.get(self.endpoint(STATE_ROUTE)?).send().await?;
        read_json(res).await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<(), ClientError> {
        self.post_state(&StateUpdateRequest {
            new_response: None,
            patch,
        })
        .await
    }

    pub async fn submit_rsvp(&self, input: RsvpInput) -> Result<(), ClientError> {
        self.post_state(&StateUpdateRequest {
            new_response: Some(input),
            patch: SettingsPatch::default(),
        })
        .await
    }

    /// Calls a bridge tool the way the voice agent would.
    pub async fn call_tool(&self, agent: &str, call: &ToolCall) -> Result<Value, ClientError> {
        let mut url = self.endpoint(WEBHOOK_ROUTE_PREFIX)?;
        url.path_segments_mut()
            .map_err(|()| ClientError::CannotBeBase(self.base_url.to_string()))?
            .push(agent);
        let res = self.http.post(url).json(call).send().await?;
        read_json(res).await
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let res = self.http.get(self.endpoint(HEALTH_ROUTE)?).send().await?;
        read_json(res).await
    }

    async fn post_state<T: Serialize>(&self, body: &T) -> Result<(), ClientError> {
        let res = self
            .http
            .post(self.endpoint(STATE_ROUTE)?)
            .json(body)
            .send()
            .await?;
        let _: SuccessResponse = read_json(res).await?;
        Ok(())
    }

    fn endpoint(&self, route: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(route)?)
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> Result<T, ClientError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res.json().await?);
    }
    let body = res.text().await.unwrap_or_default();
    let error = serde_json::from_str::<ApiError>(&body)
        .unwrap_or_else(|_| ApiError::new(ErrorCode::Internal, body));
    Err(ClientError::Api { status, error })
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RsvpTotals {
    pub responses: usize,
    pub guests: i64,
    pub capacity: i64,
    pub remaining: i64,
}

impl RsvpTotals {
    /// Share of capacity taken, clamped to `0.0..=1.0`.
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity <= 0 {
            return 1.0;
        }
        (self.guests as f64 / self.capacity as f64).clamp(0.0, 1.0)
    }
}

pub fn rsvp_totals(view: &AggregateView) -> RsvpTotals {
    let guests = view.responses.iter().map(|r| r.party_size).sum::<i64>();
    let capacity = view.settings.max_guests;
    RsvpTotals {
        responses: view.responses.len(),
        guests,
        capacity,
        remaining: (capacity - guests).max(0),
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
