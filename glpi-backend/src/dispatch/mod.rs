//! Session-bound GLPI call dispatcher.
//!
//! Every remote call a chat handler makes goes through [`CallDispatcher`]: it
//! reads the caller's session token from the store, injects it together with
//! `id2name`, issues the call and folds the result into a
//! [`RemoteCallOutcome`]. Session-invalid faults (and a successful logout)
//! show the login prompt through a [`ReauthPrompter`].

pub mod calls;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::glpi::{self, GlpiMethod, Params, RemoteGateway, RpcError, Value};
use crate::session::SessionStore;

/// Where a chat action came from; enough to answer it in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOrigin {
    /// Telegram user id of the caller, the session store key
    pub user_id: String,
    pub chat_id: i64,
    /// Message the action is attached to
    pub message_id: Option<i32>,
    /// The message was authored by the bot (menu callbacks), so it can be
    /// edited in place
    pub bot_authored: bool,
    /// Message this one answers, for replies to forced-reply prompts
    pub reply_to: Option<i32>,
}

impl ChatOrigin {
    pub fn new(user_id: impl Into<String>, chat_id: i64) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id,
            message_id: None,
            bot_authored: false,
            reply_to: None,
        }
    }

    pub fn with_message(mut self, message_id: i32, bot_authored: bool) -> Self {
        self.message_id = Some(message_id);
        self.bot_authored = bot_authored;
        self
    }

    pub fn replying_to(mut self, message_id: Option<i32>) -> Self {
        self.reply_to = message_id;
        self
    }

    /// Target message for an in-place edit
    pub fn editable_message(&self) -> Option<i32> {
        if self.bot_authored { self.message_id } else { None }
    }
}

/// Shows the login prompt to a user whose session is gone
#[async_trait]
pub trait ReauthPrompter: Send + Sync {
    /// Edit `origin`'s message in place when it is bot-authored, otherwise send
    /// a new message. `login_hint` pre-fills the inline login query.
    async fn prompt_login(&self, origin: &ChatOrigin, login_hint: Option<&str>)
    -> Result<(), String>;
}

/// One remote call, built fresh per dispatch
#[derive(Debug, Clone)]
pub struct RemoteCallRequest {
    pub method: GlpiMethod,
    pub session_token: Option<String>,
    pub id2name: bool,
    pub extra_params: Params,
}

impl RemoteCallRequest {
    pub fn new(method: GlpiMethod, session_token: Option<String>, extra_params: Params) -> Self {
        Self {
            method,
            session_token,
            id2name: true,
            extra_params,
        }
    }

    /// Method and call parameters; `session` and `id2name` override anything
    /// the caller put under those names
    pub fn into_call(self) -> (GlpiMethod, Params) {
        let mut params = self.extra_params;
        match self.session_token {
            Some(token) => {
                params.insert("session".to_string(), Value::Str(token));
            }
            None => {
                params.remove("session");
            }
        }
        params.insert("id2name".to_string(), Value::Bool(self.id2name));
        (self.method, params)
    }
}

/// Classified result of one dispatched call
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCallOutcome {
    Success(Value),
    /// Session invalid or expired; the login prompt has been shown
    AuthExpired,
    Rejected { code: i64, message: String },
    TransportError(String),
}

impl RemoteCallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RemoteCallOutcome::Success(_))
    }

    pub fn into_result(self) -> Result<Value, GatewayError> {
        match self {
            RemoteCallOutcome::Success(value) => Ok(value),
            RemoteCallOutcome::AuthExpired => Err(GatewayError::AuthExpired),
            RemoteCallOutcome::Rejected { code, message } => {
                Err(GatewayError::Rejected { code, message })
            }
            RemoteCallOutcome::TransportError(msg) => Err(GatewayError::Transport(msg)),
        }
    }
}

pub struct CallDispatcher {
    store: Arc<dyn SessionStore>,
    gateway: Arc<dyn RemoteGateway>,
    prompter: Arc<dyn ReauthPrompter>,
    auth_fault_code: i64,
}

impl CallDispatcher {
    pub fn new(
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn RemoteGateway>,
        prompter: Arc<dyn ReauthPrompter>,
        auth_fault_code: i64,
    ) -> Self {
        Self {
            store,
            gateway,
            prompter,
            auth_fault_code,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn RemoteGateway> {
        &self.gateway
    }

    /// Issue `method` on behalf of `origin.user_id`.
    ///
    /// Never fails: every fault path resolves to an outcome variant. No retries.
    pub async fn dispatch(
        &self,
        method: GlpiMethod,
        origin: &ChatOrigin,
        extra_params: Params,
    ) -> RemoteCallOutcome {
        let session_token = match self.store.session_token(&origin.user_id).await {
            Ok(token) => token,
            Err(e) => {
                log::error!("Session: failed to read session of {}: {}", origin.user_id, e);
                return RemoteCallOutcome::TransportError(e);
            }
        };
        if session_token.is_none() {
            log::debug!(
                "GLPI: {} has no session, calling {} anyway",
                origin.user_id,
                method.as_ref()
            );
        }

        let (method, params) =
            RemoteCallRequest::new(method, session_token, extra_params).into_call();
        let outcome = match self.gateway.call(method, params).await {
            Ok(value) => RemoteCallOutcome::Success(value),
            Err(RpcError::Fault { code, message }) => {
                log::error!("GLPI: FaultCode: {}, FaultString: {}", code, message);
                if code == self.auth_fault_code {
                    RemoteCallOutcome::AuthExpired
                } else {
                    RemoteCallOutcome::Rejected { code, message }
                }
            }
            Err(RpcError::Transport(msg)) => {
                log::error!("GLPI: {} failed: {}", method.rpc_name(), msg);
                RemoteCallOutcome::TransportError(msg)
            }
        };

        let logged_out = method.is_logout() && outcome.is_success();
        if outcome == RemoteCallOutcome::AuthExpired || logged_out {
            self.prompt_reauth(origin).await;
        }
        outcome
    }

    /// Dispatch and decode the payload into a typed shape
    pub async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: GlpiMethod,
        origin: &ChatOrigin,
        extra_params: Params,
    ) -> Result<T, GatewayError> {
        let value = self.dispatch(method, origin, extra_params).await.into_result()?;
        glpi::decode(value).map_err(|e| {
            log::error!("GLPI: unexpected {} payload: {}", method.rpc_name(), e);
            e
        })
    }

    /// Dispatch and keep the raw payload, for diagnostic commands
    pub async fn call_raw(
        &self,
        method: GlpiMethod,
        origin: &ChatOrigin,
        extra_params: Params,
    ) -> Result<Value, GatewayError> {
        self.dispatch(method, origin, extra_params).await.into_result()
    }

    /// Show the login prompt; a failure here is logged, not propagated
    pub async fn prompt_reauth(&self, origin: &ChatOrigin) {
        let login_hint = match self.store.login_name(&origin.user_id).await {
            Ok(name) => name,
            Err(e) => {
                log::warn!("Session: no login hint for {}: {}", origin.user_id, e);
                None
            }
        };
        if let Err(e) = self
            .prompter
            .prompt_login(origin, login_hint.as_deref())
            .await
        {
            log::error!("Telegram: failed to show login prompt to {}: {}", origin.user_id, e);
        }
    }
}

#[cfg(test)]
mod dispatch_tests;
