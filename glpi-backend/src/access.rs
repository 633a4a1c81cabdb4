//! Allow-list of Telegram users who may use the bot.

use std::collections::HashSet;

use crate::error::GatewayError;

#[derive(Debug, Clone, Default)]
pub struct AccessList {
    allowed: HashSet<String>,
}

impl AccessList {
    pub fn new<I, S>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: user_ids
                .into_iter()
                .map(Into::into)
                .map(|id: String| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }

    pub fn is_allowed(&self, user_id: &str) -> bool {
        self.allowed.contains(user_id)
    }

    pub fn check(&self, user_id: &str) -> Result<(), GatewayError> {
        if self.is_allowed(user_id) {
            Ok(())
        } else {
            log::warn!("Access: user {} is not in the allow-list", user_id);
            Err(GatewayError::Unauthorized(user_id.to_string()))
        }
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_list() {
        let access = AccessList::new(vec!["100", " 200 ", ""]);
        assert_eq!(access.len(), 2);
        assert!(access.is_allowed("100"));
        assert!(access.is_allowed("200"));
        assert!(!access.is_allowed("300"));
        assert!(matches!(
            access.check("300"),
            Err(GatewayError::Unauthorized(id)) if id == "300"
        ));
    }

    #[test]
    fn test_empty_list_allows_nobody() {
        assert!(!AccessList::default().is_allowed("1"));
    }
}
