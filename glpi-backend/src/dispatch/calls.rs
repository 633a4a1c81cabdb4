//! Typed call sites for the GLPI methods the bot uses.

use crate::error::GatewayError;
use crate::glpi::types::{
    DocumentPayload, Entity, List, LogoutInfo, MyInfo, Ticket, TicketCount, TicketSummary,
    TicketUpdate,
};
use crate::glpi::{self, GlpiMethod, Params, Value, params};

use super::{CallDispatcher, ChatOrigin};

/// Source name GLPI records for followups and documents added from the bot
pub const REQUEST_SOURCE: &str = "Telegram";

/// Solution type GLPI uses for "solved" in the reference deployment
pub const SOLUTION_TYPE: i64 = 8;

/// Unresolved tickets status filter
const STATUS_NOT_OLD: &str = "notold";
/// Status filter used for the "all current" count
const STATUS_CURRENT: &str = "2";

impl CallDispatcher {
    pub async fn my_info(&self, origin: &ChatOrigin) -> Result<MyInfo, GatewayError> {
        self.call(GlpiMethod::GetMyInfo, origin, Params::new()).await
    }

    /// Any successful answer ends the session; the farewell text is optional
    pub async fn logout(&self, origin: &ChatOrigin) -> Result<LogoutInfo, GatewayError> {
        let value = self.call_raw(GlpiMethod::DoLogout, origin, Params::new()).await?;
        Ok(glpi::decode(value).unwrap_or_else(|e| {
            log::warn!("GLPI: logout answer carries no message: {}", e);
            LogoutInfo::default()
        }))
    }

    pub async fn my_entities(&self, origin: &ChatOrigin) -> Result<Vec<Entity>, GatewayError> {
        let list: List<Entity> = self
            .call(GlpiMethod::ListMyEntities, origin, Params::new())
            .await?;
        Ok(list.0)
    }

    /// Switch the active entity (recursively); returns the selected entities
    pub async fn set_my_entity(
        &self,
        origin: &ChatOrigin,
        entity_id: &str,
    ) -> Result<Vec<Entity>, GatewayError> {
        let params: Params = [
            ("entity".to_string(), Value::str(entity_id)),
            ("recursive".to_string(), Value::Int(1)),
        ]
        .into_iter()
        .collect();
        let list: List<Entity> = self.call(GlpiMethod::SetMyEntity, origin, params).await?;
        Ok(list.0)
    }

    /// Unresolved tickets assigned to the caller
    pub async fn my_tickets(
        &self,
        origin: &ChatOrigin,
    ) -> Result<Vec<TicketSummary>, GatewayError> {
        let params: Params = [
            ("assign".to_string(), Value::Bool(true)),
            ("status".to_string(), Value::str(STATUS_NOT_OLD)),
        ]
        .into_iter()
        .collect();
        let list: List<TicketSummary> = self.call(GlpiMethod::ListTickets, origin, params).await?;
        Ok(list.0)
    }

    /// Number of current tickets visible to the caller
    pub async fn current_ticket_count(&self, origin: &ChatOrigin) -> Result<usize, GatewayError> {
        let params: Params = [
            ("status".to_string(), Value::str(STATUS_CURRENT)),
            ("count".to_string(), Value::Bool(true)),
        ]
        .into_iter()
        .collect();
        let count: TicketCount = self.call(GlpiMethod::ListTickets, origin, params).await?;
        Ok(count.value())
    }

    /// One page of unresolved tickets, paged by GLPI
    pub async fn current_tickets(
        &self,
        origin: &ChatOrigin,
        start: usize,
        limit: usize,
    ) -> Result<Vec<TicketSummary>, GatewayError> {
        let params: Params = [
            ("status".to_string(), Value::str(STATUS_NOT_OLD)),
            ("start".to_string(), Value::from(start as u64)),
            ("limit".to_string(), Value::from(limit as u64)),
        ]
        .into_iter()
        .collect();
        let list: List<TicketSummary> = self.call(GlpiMethod::ListTickets, origin, params).await?;
        Ok(list.0)
    }

    pub async fn ticket(
        &self,
        origin: &ChatOrigin,
        ticket_id: &str,
    ) -> Result<Ticket, GatewayError> {
        self.call(GlpiMethod::GetTicket, origin, params([("ticket", ticket_id)]))
            .await
    }

    pub async fn document(
        &self,
        origin: &ChatOrigin,
        ticket_id: &str,
        document_id: &str,
    ) -> Result<DocumentPayload, GatewayError> {
        self.call(
            GlpiMethod::GetDocument,
            origin,
            params([("ticket", ticket_id), ("document", document_id)]),
        )
        .await
    }

    pub async fn add_followup(
        &self,
        origin: &ChatOrigin,
        ticket_id: &str,
        content: &str,
        users_login: &str,
    ) -> Result<TicketUpdate, GatewayError> {
        self.call(
            GlpiMethod::AddTicketFollowup,
            origin,
            params([
                ("ticket", ticket_id),
                ("content", content),
                ("users_login", users_login),
                ("source", REQUEST_SOURCE),
            ]),
        )
        .await
    }

    pub async fn set_solution(
        &self,
        origin: &ChatOrigin,
        ticket_id: &str,
        solution: &str,
    ) -> Result<Value, GatewayError> {
        let mut params = params([("ticket", ticket_id), ("solution", solution)]);
        params.insert("type".to_string(), Value::Int(SOLUTION_TYPE));
        self.call_raw(GlpiMethod::SetTicketSolution, origin, params)
            .await
    }

    /// Attach a base64-encoded file to a ticket
    pub async fn add_document(
        &self,
        origin: &ChatOrigin,
        upload: DocumentUpload<'_>,
    ) -> Result<TicketUpdate, GatewayError> {
        self.call(
            GlpiMethod::AddTicketDocument,
            origin,
            params([
                ("ticket", upload.ticket_id),
                ("name", upload.name),
                ("base64", upload.base64),
                ("content", upload.comment),
                ("users_login", upload.users_login),
                ("source", REQUEST_SOURCE),
            ]),
        )
        .await
    }

    pub async fn create_ticket(
        &self,
        origin: &ChatOrigin,
        title: &str,
        content: &str,
    ) -> Result<Value, GatewayError> {
        self.call_raw(
            GlpiMethod::CreateTicket,
            origin,
            params([
                ("title", title),
                ("content", content),
                ("source", REQUEST_SOURCE),
            ]),
        )
        .await
    }

    pub async fn object(
        &self,
        origin: &ChatOrigin,
        itemtype: &str,
        id: &str,
    ) -> Result<Value, GatewayError> {
        let mut params = params([("itemtype", itemtype), ("id", id)]);
        params.insert("show_name".to_string(), Value::Bool(true));
        self.call_raw(GlpiMethod::GetObject, origin, params).await
    }
}

/// Arguments of `addTicketDocument`
#[derive(Debug, Clone, Copy)]
pub struct DocumentUpload<'a> {
    pub ticket_id: &'a str,
    pub name: &'a str,
    pub base64: &'a str,
    /// Telegram caption, may be empty
    pub comment: &'a str,
    pub users_login: &'a str,
}
