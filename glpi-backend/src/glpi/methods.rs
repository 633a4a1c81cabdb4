//! Closed set of GLPI webservices methods the bot calls.

use strum::{AsRefStr, EnumIter, EnumString};

/// Webservices plugin module every method lives in
pub const MODULE: &str = "glpi";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum GlpiMethod {
    DoLogin,
    DoLogout,
    GetMyInfo,
    ListMyEntities,
    SetMyEntity,
    ListTickets,
    GetTicket,
    GetDocument,
    AddTicketFollowup,
    AddTicketDocument,
    SetTicketSolution,
    CreateTicket,
    GetObject,
    Status,
    Test,
}

impl GlpiMethod {
    /// Fully qualified XML-RPC method name, e.g. `glpi.getTicket`
    pub fn rpc_name(&self) -> String {
        format!("{}.{}", MODULE, self.as_ref())
    }

    /// Logging out always re-offers the login prompt
    pub fn is_logout(&self) -> bool {
        matches!(self, GlpiMethod::DoLogout)
    }
}
