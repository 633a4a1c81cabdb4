//! Typed shapes of the GLPI webservices responses the bot reads.
//!
//! The plugin is loose about types: ids arrive as strings or integers, empty
//! lists sometimes arrive as empty structs, and optional dates as nil. The
//! deserializers below absorb that.

use serde::{Deserialize, Deserializer};
use serde_json::Value as Json;
use std::collections::BTreeMap;

fn json_to_string(value: Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::String(s) => s,
        other => other.to_string(),
    }
}

/// Accept a string, number or null as a string
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(json_to_string(Json::deserialize(deserializer)?))
}

/// Accept a string, number or null; empty strings become `None`
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = json_to_string(Json::deserialize(deserializer)?);
    Ok(if s.is_empty() { None } else { Some(s) })
}

/// Accept an array, a struct (its values, in key order) or null as a list
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let items = match Json::deserialize(deserializer)? {
        Json::Null => return Ok(Vec::new()),
        Json::Array(items) => items,
        Json::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected a list, got {}",
                other
            )));
        }
    };
    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(serde::de::Error::custom))
        .collect()
}

/// `doLogin` answer. Everything GLPI returns is kept so it can be stored.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub session: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub firstname: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub realname: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Json>,
}

impl LoginInfo {
    /// All fields as `glpi_<key>` pairs for the session store
    pub fn session_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("glpi_session".to_string(), self.session.clone()),
            ("glpi_id".to_string(), self.id.clone()),
            ("glpi_name".to_string(), self.name.clone()),
            ("glpi_firstname".to_string(), self.firstname.clone()),
            ("glpi_realname".to_string(), self.realname.clone()),
        ];
        for (key, value) in &self.extra {
            fields.push((format!("glpi_{}", key), json_to_string(value.clone())));
        }
        fields
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogoutInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MyInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub realname: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub firstname: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub usertitles_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entity {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub completename: String,
}

/// Wrapper to read a list-shaped response through the lenient list rules
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent, bound = "T: serde::de::DeserializeOwned")]
pub struct List<T>(#[serde(deserialize_with = "lenient_list")] pub Vec<T>);

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUser {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub users_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub users_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUsers {
    #[serde(default, deserialize_with = "lenient_list")]
    pub requester: Vec<TicketUser>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub assign: Vec<TicketUser>,
}

/// Row of `listTickets`
#[derive(Debug, Clone, Deserialize)]
pub struct TicketSummary {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub time_to_resolve: Option<String>,
    #[serde(default)]
    pub users: TicketUsers,
}

impl TicketSummary {
    pub fn is_assigned_to(&self, glpi_user_id: &str) -> bool {
        self.users
            .assign
            .first()
            .map(|u| u.id == glpi_user_id)
            .unwrap_or(false)
    }
}

/// `listTickets` with `count = true`
#[derive(Debug, Clone, Deserialize)]
pub struct TicketCount {
    #[serde(deserialize_with = "lenient_string")]
    pub count: String,
}

impl TicketCount {
    pub fn value(&self) -> usize {
        self.count.trim().parse().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Followup {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tickets_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_mod: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub users_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketDocument {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tickets_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_creation: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_mod: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub users_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketEvent {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_mod: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub field: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub change: String,
}

/// `getTicket` answer
#[derive(Debug, Clone, Deserialize)]
pub struct Ticket {
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub time_to_resolve: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ticketcategories_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub entities_name: String,
    #[serde(default)]
    pub users: TicketUsers,
    #[serde(default, deserialize_with = "lenient_list")]
    pub followups: Vec<Followup>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub documents: Vec<TicketDocument>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub events: Vec<TicketEvent>,
}

/// Answer of `addTicketFollowup` / `addTicketDocument`: the ticket's
/// followups (newest first) or documents (oldest first)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdate {
    #[serde(default, deserialize_with = "lenient_list")]
    pub followups: Vec<Followup>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub documents: Vec<TicketDocument>,
}

impl TicketUpdate {
    pub fn latest_followup(&self) -> Option<&Followup> {
        self.followups.first()
    }

    pub fn latest_document(&self) -> Option<&TicketDocument> {
        self.documents.last()
    }
}

/// Sort by id, newest first. GLPI ids compare numerically when they parse.
fn newest_first<T, F>(items: &[T], id: F) -> Vec<&T>
where
    F: Fn(&T) -> &str,
{
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by(|a, b| {
        let (a, b) = (id(a), id(b));
        match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => y.cmp(&x),
            _ => b.cmp(a),
        }
    });
    sorted
}

impl Ticket {
    pub fn followups_newest_first(&self) -> Vec<&Followup> {
        newest_first(&self.followups, |f| f.id.as_str())
    }

    pub fn documents_newest_first(&self) -> Vec<&TicketDocument> {
        newest_first(&self.documents, |d| d.id.as_str())
    }

    pub fn events_newest_first(&self) -> Vec<&TicketEvent> {
        newest_first(&self.events, |e| e.id.as_str())
    }
}

/// `getDocument` answer: transfer representation of a stored file
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentPayload {
    #[serde(deserialize_with = "lenient_string")]
    pub filename: String,
    #[serde(deserialize_with = "lenient_string")]
    pub base64: String,
    #[serde(deserialize_with = "lenient_string")]
    pub sha1sum: String,
}
