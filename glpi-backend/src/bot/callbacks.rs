//! Inline keyboard callback identifiers.
//!
//! Every button the bot shows carries one of these strings; parsing an
//! identifier gives back the action that produced it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

const MENU: &str = "cb_menu";
const TICKETS: &str = "cb_tickets";
const MY_TICKETS: &str = "cb_tickets_mine";
const ALL_CURRENT: &str = "cb_tickets_all_current";
const ENTITIES: &str = "cb_entities";
const MY_INFO: &str = "cb_my_info";
const LOGOUT: &str = "cb_logout";

static PAGED_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^cb_tickets_(mine|all_current)(\d+)$").unwrap());
static TICKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^cb_ticket_(\d+)$").unwrap());
static TICKET_PAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^cb_ticket_(\d+)_(followups|documents|history)(\d+)$").unwrap());
static TICKET_ADD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^cb_ticket_(\d+)_(followup|solution|document)_add$").unwrap());
static DOCUMENT_SEND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^cb_ticket_(\d+)_document_(\d+)_send$").unwrap());
static ENTITY_SET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^cb_entity_(\d+)_set$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Menu,
    Tickets,
    MyTickets { offset: usize },
    AllCurrentTickets { offset: usize },
    Ticket { ticket: String },
    Followups { ticket: String, offset: usize },
    Documents { ticket: String, offset: usize },
    History { ticket: String, offset: usize },
    AddFollowup { ticket: String },
    AddSolution { ticket: String },
    AddDocument { ticket: String },
    SendDocument { ticket: String, document: String },
    Entities,
    SetEntity { entity: String },
    MyInfo,
    Logout,
}

fn offset(s: &str) -> Option<usize> {
    s.parse().ok()
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            MENU => return Some(CallbackAction::Menu),
            TICKETS => return Some(CallbackAction::Tickets),
            ENTITIES => return Some(CallbackAction::Entities),
            MY_INFO => return Some(CallbackAction::MyInfo),
            LOGOUT => return Some(CallbackAction::Logout),
            _ => {}
        }

        if let Some(c) = PAGED_LIST.captures(data) {
            let offset = offset(&c[2])?;
            return Some(match &c[1] {
                "mine" => CallbackAction::MyTickets { offset },
                _ => CallbackAction::AllCurrentTickets { offset },
            });
        }
        if let Some(c) = TICKET.captures(data) {
            return Some(CallbackAction::Ticket {
                ticket: c[1].to_string(),
            });
        }
        if let Some(c) = TICKET_PAGE.captures(data) {
            let ticket = c[1].to_string();
            let offset = offset(&c[3])?;
            return Some(match &c[2] {
                "followups" => CallbackAction::Followups { ticket, offset },
                "documents" => CallbackAction::Documents { ticket, offset },
                _ => CallbackAction::History { ticket, offset },
            });
        }
        if let Some(c) = TICKET_ADD.captures(data) {
            let ticket = c[1].to_string();
            return Some(match &c[2] {
                "followup" => CallbackAction::AddFollowup { ticket },
                "solution" => CallbackAction::AddSolution { ticket },
                _ => CallbackAction::AddDocument { ticket },
            });
        }
        if let Some(c) = DOCUMENT_SEND.captures(data) {
            return Some(CallbackAction::SendDocument {
                ticket: c[1].to_string(),
                document: c[2].to_string(),
            });
        }
        if let Some(c) = ENTITY_SET.captures(data) {
            return Some(CallbackAction::SetEntity {
                entity: c[1].to_string(),
            });
        }
        None
    }

    /// Identifier prefix the page offset is appended to, for paged screens
    pub fn page_prefix(&self) -> Option<String> {
        match self {
            CallbackAction::MyTickets { .. } => Some(MY_TICKETS.to_string()),
            CallbackAction::AllCurrentTickets { .. } => Some(ALL_CURRENT.to_string()),
            CallbackAction::Followups { ticket, .. } => {
                Some(format!("cb_ticket_{}_followups", ticket))
            }
            CallbackAction::Documents { ticket, .. } => {
                Some(format!("cb_ticket_{}_documents", ticket))
            }
            CallbackAction::History { ticket, .. } => Some(format!("cb_ticket_{}_history", ticket)),
            _ => None,
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Menu => f.write_str(MENU),
            CallbackAction::Tickets => f.write_str(TICKETS),
            CallbackAction::MyTickets { offset } => write!(f, "{}{}", MY_TICKETS, offset),
            CallbackAction::AllCurrentTickets { offset } => write!(f, "{}{}", ALL_CURRENT, offset),
            CallbackAction::Ticket { ticket } => write!(f, "cb_ticket_{}", ticket),
            CallbackAction::Followups { ticket, offset } => {
                write!(f, "cb_ticket_{}_followups{}", ticket, offset)
            }
            CallbackAction::Documents { ticket, offset } => {
                write!(f, "cb_ticket_{}_documents{}", ticket, offset)
            }
            CallbackAction::History { ticket, offset } => {
                write!(f, "cb_ticket_{}_history{}", ticket, offset)
            }
            CallbackAction::AddFollowup { ticket } => {
                write!(f, "cb_ticket_{}_followup_add", ticket)
            }
            CallbackAction::AddSolution { ticket } => {
                write!(f, "cb_ticket_{}_solution_add", ticket)
            }
            CallbackAction::AddDocument { ticket } => {
                write!(f, "cb_ticket_{}_document_add", ticket)
            }
            CallbackAction::SendDocument { ticket, document } => {
                write!(f, "cb_ticket_{}_document_{}_send", ticket, document)
            }
            CallbackAction::Entities => f.write_str(ENTITIES),
            CallbackAction::SetEntity { entity } => write!(f, "cb_entity_{}_set", entity),
            CallbackAction::MyInfo => f.write_str(MY_INFO),
            CallbackAction::Logout => f.write_str(LOGOUT),
        }
    }
}
