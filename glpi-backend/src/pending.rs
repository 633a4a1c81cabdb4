//! What a user's next free-text or document message means.
//!
//! Set when the bot sends a forced-reply prompt ("comment for ticket #5"),
//! consumed by the first matching reply to that prompt.

use dashmap::DashMap;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingAction {
    #[default]
    AwaitingNone,
    AwaitingComment(String),
    AwaitingSolution(String),
    AwaitingDocument(String),
}

impl PendingAction {
    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            PendingAction::AwaitingNone => None,
            PendingAction::AwaitingComment(t)
            | PendingAction::AwaitingSolution(t)
            | PendingAction::AwaitingDocument(t) => Some(t),
        }
    }

    /// Consumed by a text message
    pub fn accepts_text(&self) -> bool {
        matches!(
            self,
            PendingAction::AwaitingComment(_) | PendingAction::AwaitingSolution(_)
        )
    }

    /// Consumed by a document message
    pub fn accepts_document(&self) -> bool {
        matches!(self, PendingAction::AwaitingDocument(_))
    }
}

/// Pending action plus the prompt message to clean up once it is handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub action: PendingAction,
    pub prompt_message_id: Option<i32>,
}

impl PendingReply {
    /// Whether a message replying to `reply_to` answers this prompt
    pub fn answered_by(&self, reply_to: Option<i32>) -> bool {
        reply_to.is_some() && reply_to == self.prompt_message_id
    }
}

#[derive(Default)]
pub struct PendingReplies {
    by_user: DashMap<String, PendingReply>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was pending for the user
    pub fn set(&self, user_id: &str, action: PendingAction, prompt_message_id: Option<i32>) {
        if action == PendingAction::AwaitingNone {
            self.clear(user_id);
            return;
        }
        log::debug!("Pending: {} -> {:?}", user_id, action);
        self.by_user.insert(
            user_id.to_string(),
            PendingReply {
                action,
                prompt_message_id,
            },
        );
    }

    #[cfg(test)]
    pub fn get(&self, user_id: &str) -> PendingAction {
        self.by_user
            .get(user_id)
            .map(|p| p.action.clone())
            .unwrap_or_default()
    }

    /// Remove and return the pending reply if the message replies to its
    /// prompt and `accepts` says this kind of message consumes it; otherwise
    /// leave it in place
    pub fn take_if<F>(
        &self,
        user_id: &str,
        reply_to: Option<i32>,
        accepts: F,
    ) -> Option<PendingReply>
    where
        F: Fn(&PendingAction) -> bool,
    {
        self.by_user
            .remove_if(user_id, |_, pending| {
                pending.answered_by(reply_to) && accepts(&pending.action)
            })
            .map(|(_, pending)| pending)
    }

    pub fn take_text(&self, user_id: &str, reply_to: Option<i32>) -> Option<PendingReply> {
        self.take_if(user_id, reply_to, PendingAction::accepts_text)
    }

    pub fn take_document(&self, user_id: &str, reply_to: Option<i32>) -> Option<PendingReply> {
        self.take_if(user_id, reply_to, PendingAction::accepts_document)
    }

    pub fn clear(&self, user_id: &str) {
        self.by_user.remove(user_id);
    }
}
