//! Test doubles for the gateway and prompter seams.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::dispatch::{CallDispatcher, ChatOrigin, ReauthPrompter};
use crate::glpi::{GlpiMethod, Params, RemoteGateway, RpcError, Value};
use crate::session::{MemorySessionStore, SessionStore};

pub const AUTH_FAULT: i64 = 13;

/// Gateway returning queued results and recording every call it receives
#[derive(Clone, Default)]
pub struct StubGateway {
    responses: Arc<Mutex<VecDeque<Result<Value, RpcError>>>>,
    calls: Arc<Mutex<Vec<(GlpiMethod, Params)>>>,
}

impl StubGateway {
    pub fn new(responses: Vec<Result<Value, RpcError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(GlpiMethod, Params)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_params(&self) -> Option<Params> {
        self.calls.lock().unwrap().last().map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl RemoteGateway for StubGateway {
    async fn call(&self, method: GlpiMethod, params: Params) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push((method, params));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RpcError::Transport("stub exhausted".to_string())))
    }
}

/// Prompter recording every login prompt it is asked to show
#[derive(Clone, Default)]
pub struct RecordingPrompter {
    prompts: Arc<Mutex<Vec<(ChatOrigin, Option<String>)>>>,
}

impl RecordingPrompter {
    pub fn prompts(&self) -> Vec<(ChatOrigin, Option<String>)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReauthPrompter for RecordingPrompter {
    async fn prompt_login(
        &self,
        origin: &ChatOrigin,
        login_hint: Option<&str>,
    ) -> Result<(), String> {
        self.prompts
            .lock()
            .unwrap()
            .push((origin.clone(), login_hint.map(str::to_string)));
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemorySessionStore>,
    pub gateway: StubGateway,
    pub prompter: RecordingPrompter,
    pub dispatcher: Arc<CallDispatcher>,
}

impl Harness {
    pub fn new(responses: Vec<Result<Value, RpcError>>) -> Self {
        let store = Arc::new(MemorySessionStore::new());
        let gateway = StubGateway::new(responses);
        let prompter = RecordingPrompter::default();
        let dispatcher = Arc::new(CallDispatcher::new(
            store.clone(),
            Arc::new(gateway.clone()),
            Arc::new(prompter.clone()),
            AUTH_FAULT,
        ));
        Self {
            store,
            gateway,
            prompter,
            dispatcher,
        }
    }

    /// Store a logged-in session for `user_id`
    pub async fn login(&self, user_id: &str, token: &str, login_name: &str) {
        let fields = vec![
            ("glpi_session".to_string(), token.to_string()),
            ("glpi_name".to_string(), login_name.to_string()),
            ("glpi_id".to_string(), "7".to_string()),
        ];
        self.store.set_record(user_id, &fields).await.unwrap();
    }
}

pub fn fault(code: i64, message: &str) -> Result<Value, RpcError> {
    Err(RpcError::Fault {
        code,
        message: message.to_string(),
    })
}

pub fn ok_json(json: serde_json::Value) -> Result<Value, RpcError> {
    Ok(Value::from_json(&json))
}
