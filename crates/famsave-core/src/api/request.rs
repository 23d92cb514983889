//! Per-request lifecycle for the refresh-on-401 protocol.
//!
//! ```text
//! Sending --(not 401)--> Done
//! Sending --(401)--> AwaitingRefresh --(refresh ok)--> Retrying --(any status but 401)--> Done
//!                                   \--(refresh failed)--> Failed      \--(401)--> Failed
//! ```
//!
//! A request is retried at most once. Whatever the retry returns is final.

use reqwest::{Method, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::{ApiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Sending,
    AwaitingRefresh,
    Retrying,
    Done,
    Failed,
}

impl RequestPhase {
    /// Phase after a response with `status` arrives in this phase.
    pub fn after_response(self, status: StatusCode) -> RequestPhase {
        let unauthorized = status == StatusCode::UNAUTHORIZED;
        match self {
            RequestPhase::Sending if unauthorized => RequestPhase::AwaitingRefresh,
            RequestPhase::Retrying if unauthorized => RequestPhase::Failed,
            RequestPhase::Sending | RequestPhase::Retrying => RequestPhase::Done,
            // Terminal or waiting phases ignore stray responses
            other => other,
        }
    }

    /// Phase once the refresh call has settled.
    pub fn after_refresh(self, refreshed: bool) -> RequestPhase {
        match self {
            RequestPhase::AwaitingRefresh if refreshed => RequestPhase::Retrying,
            RequestPhase::AwaitingRefresh => RequestPhase::Failed,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestPhase::Done | RequestPhase::Failed)
    }
}

/// An outbound call that can be replayed once with a new bearer token.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<serde_json::Value>,
    retried: bool,
    phase: RequestPhase,
}

impl PendingRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            retried: false,
            phase: RequestPhase::Sending,
        }
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach a JSON body. Serialized up front so the retry sends identical bytes.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn was_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn on_response(&mut self, status: StatusCode) -> RequestPhase {
        self.transition(self.phase.after_response(status))
    }

    pub(crate) fn on_refresh(&mut self, refreshed: bool) -> RequestPhase {
        let next = self.transition(self.phase.after_refresh(refreshed));
        if next == RequestPhase::Retrying {
            self.retried = true;
        }
        next
    }

    fn transition(&mut self, next: RequestPhase) -> RequestPhase {
        if next != self.phase {
            debug!(
                method = %self.method,
                url = %self.url,
                from = ?self.phase,
                to = ?next,
                "Request phase change"
            );
            self.phase = next;
        }
        next
    }
}
