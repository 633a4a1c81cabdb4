//! XML-RPC client for the GLPI webservices plugin.
//!
//! Bound to one GLPI base URL and the webservices service account. Every call
//! carries the service credentials; the caller supplies the user session.

use async_trait::async_trait;
use reqwest::{Client, header};
use std::fmt;
use std::time::Duration;

use super::methods::GlpiMethod;
use super::xmlrpc::{self, Response, Value};
use super::Params;

/// Path of the XML-RPC endpoint below the GLPI base URL
const XMLRPC_PATH: &str = "/plugins/webservices/xmlrpc.php";

/// Raw failure of a remote call, before classification
#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    /// Application-level XML-RPC fault
    Fault { code: i64, message: String },
    /// Connection, HTTP status, timeout or protocol failure
    Transport(String),
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Fault { code, message } => write!(f, "fault {}: {}", code, message),
            RpcError::Transport(msg) => write!(f, "transport: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

/// Anything that can execute a GLPI method
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn call(&self, method: GlpiMethod, params: Params) -> Result<Value, RpcError>;
}

pub struct GlpiClient {
    service_url: String,
    username: String,
    password: String,
    client: Client,
}

impl GlpiClient {
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build GLPI HTTP client: {}", e))?;
        Ok(Self {
            service_url: format!("{}{}", base_url.trim_end_matches('/'), XMLRPC_PATH),
            username: username.to_string(),
            password: password.to_string(),
            client,
        })
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// Service credentials first, call parameters on top
    fn merge_params(&self, params: Params) -> Params {
        let mut merged = Params::new();
        merged.insert("username".to_string(), Value::str(self.username.as_str()));
        merged.insert("password".to_string(), Value::str(self.password.as_str()));
        merged.extend(params);
        merged
    }
}

#[async_trait]
impl RemoteGateway for GlpiClient {
    async fn call(&self, method: GlpiMethod, params: Params) -> Result<Value, RpcError> {
        let rpc_name = method.rpc_name();
        let body = xmlrpc::encode_call(&rpc_name, &[Value::Struct(self.merge_params(params))]);
        log::debug!("[GLPI] {} to {}", rpc_name, self.service_url);

        let response = self
            .client
            .post(&self.service_url)
            .header(header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Transport(format!("{} timed out: {}", rpc_name, e))
                } else {
                    RpcError::Transport(format!("{} request failed: {}", rpc_name, e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RpcError::Transport(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            log::error!(
                "[GLPI] URL: {}, HTTP status: {}, body: {}",
                self.service_url,
                status,
                if text.is_empty() { "empty response" } else { &text }
            );
            return Err(RpcError::Transport(format!(
                "HTTP {} from {}",
                status, self.service_url
            )));
        }

        match xmlrpc::decode_response(&text) {
            Ok(Response::Success(value)) => Ok(value),
            Ok(Response::Fault { code, message }) => Err(RpcError::Fault { code, message }),
            Err(e) => Err(RpcError::Transport(e)),
        }
    }
}
