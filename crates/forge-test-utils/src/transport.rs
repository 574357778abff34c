//! In-memory stand-in for a Gitea/Forgejo backend.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use forge_core::{ApiRequest, ApiResponse, ForgeTransport, TransportError};
use serde_json::{Value, json};

enum Step {
    Respond(ApiResponse),
    Fail(TransportError),
    Hang,
}

/// A [`ForgeTransport`] that replays scripted outcomes in order and records
/// every request it receives.
///
/// Requests beyond the script get a 500 response so that a missing script
/// entry shows up as a test failure rather than a hang.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn respond(&self, response: ApiResponse) -> &Self {
        self.push(Step::Respond(response))
    }

    /// Queue a response with `status` and JSON `body`.
    pub fn respond_json(&self, status: u16, body: Value) -> &Self {
        self.respond(ApiResponse::new(status, body))
    }

    /// Queue a transport-level failure.
    pub fn fail(&self, error: TransportError) -> &Self {
        self.push(Step::Fail(error))
    }

    /// Queue a request that never completes.
    pub fn hang(&self) -> &Self {
        self.push(Step::Hang)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, step: Step) -> &Self {
        self.script.lock().unwrap().push_back(step);
        self
    }
}

#[async_trait]
impl ForgeTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let step = self.script.lock().unwrap().pop_front();

        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => std::future::pending().await,
            None => Ok(ApiResponse::new(
                500,
                json!({"message": "unscripted request"}),
            )),
        }
    }
}
