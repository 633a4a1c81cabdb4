//! Error taxonomy shared by the GLPI gateway, the session store and the
//! Telegram handlers.

use std::fmt;

/// Failure of a GLPI-backed operation, as seen by a chat handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The GLPI session is missing, invalid or expired. The user has already
    /// been shown the login prompt.
    AuthExpired,
    /// Application-level refusal from GLPI (bad file extension, no rights...).
    Rejected { code: i64, message: String },
    /// Network failure, timeout, non-2xx status or unreadable response.
    Transport(String),
    /// A successful response that does not have the expected shape.
    Decode(String),
    /// Downloaded document does not match its SHA-1 checksum.
    ChecksumMismatch { expected: String, actual: String },
    /// Telegram user is not in the allow-list.
    Unauthorized(String),
    /// Session store unavailable or closed.
    Store(String),
    /// Local filesystem failure while staging a document.
    Io(String),
}

impl GatewayError {
    /// Localized text shown to the chat user.
    pub fn user_message(&self) -> String {
        match self {
            GatewayError::AuthExpired => "❗ Войди для продолжения работы".to_string(),
            GatewayError::Rejected { message, .. } => format!("❌  GLPI отказал: {}", message),
            GatewayError::Transport(_) | GatewayError::Decode(_) | GatewayError::Store(_) => {
                "Что-то не так с сервером!".to_string()
            }
            GatewayError::ChecksumMismatch { .. } => {
                "❌  Документ повреждён при передаче, попробуй ещё раз".to_string()
            }
            GatewayError::Unauthorized(_) => "Только для своих".to_string(),
            GatewayError::Io(_) => "❌  Что-то пошло не так с файлом".to_string(),
        }
    }

    /// Whether the login prompt has already been shown for this failure.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, GatewayError::AuthExpired)
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::AuthExpired => write!(f, "GLPI session expired"),
            GatewayError::Rejected { code, message } => {
                write!(f, "GLPI fault {}: {}", code, message)
            }
            GatewayError::Transport(msg) => write!(f, "GLPI transport error: {}", msg),
            GatewayError::Decode(msg) => write!(f, "Unexpected GLPI response: {}", msg),
            GatewayError::ChecksumMismatch { expected, actual } => write!(
                f,
                "SHA-1 mismatch: expected {}, calculated {}",
                expected, actual
            ),
            GatewayError::Unauthorized(user) => write!(f, "User {} is not authorized", user),
            GatewayError::Store(msg) => write!(f, "Session store error: {}", msg),
            GatewayError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<std::io::Error> for GatewayError {
    fn from(e: std::io::Error) -> Self {
        GatewayError::Io(e.to_string())
    }
}
