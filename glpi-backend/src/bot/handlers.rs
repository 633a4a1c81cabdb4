//! Commands, menu callbacks and pending replies.
//!
//! Handlers never talk to Telegram directly: they return the [`Outgoing`]
//! actions to perform. Users outside the allow-list never reach GLPI.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

use super::callbacks::CallbackAction;
use super::menus;
use super::{BotContext, Outgoing, Screen};
use crate::channels::util::{MAX_MESSAGE_LEN, split_message};
use crate::dispatch::ChatOrigin;
use crate::dispatch::calls::DocumentUpload;
use crate::documents;
use crate::error::GatewayError;
use crate::glpi::{GlpiMethod, Params, Value, params};
use crate::pending::{PendingAction, PendingReply};
use crate::session::fields;

static COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^/([A-Za-z_]+)(?:@\w+)?(?:\s+(.*))?$").unwrap());
static TICKET_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)").unwrap());
static OBJECT_ARGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)\s+(\d+)").unwrap());

const NEW_TICKET_SEPARATOR: &str = "###";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Menu,
    Ticket(String),
    NewTicket { title: String, content: String },
    Object { itemtype: String, id: String },
    Status,
    Test,
    Profile,
    Logout,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        let captures = COMMAND.captures(text.trim())?;
        let args = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");
        match captures[1].to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "menu" => Some(Command::Menu),
            "ticket" => TICKET_ARG
                .captures(args)
                .map(|c| Command::Ticket(c[1].to_string())),
            "newticket" => {
                let mut parts = args.splitn(2, NEW_TICKET_SEPARATOR).map(str::trim);
                let title = parts.next().unwrap_or("").to_string();
                let content = parts.next().unwrap_or("").to_string();
                if title.is_empty() {
                    None
                } else {
                    Some(Command::NewTicket { title, content })
                }
            }
            "obj" => OBJECT_ARGS.captures(args).map(|c| Command::Object {
                itemtype: c[1].to_string(),
                id: c[2].to_string(),
            }),
            "status" => Some(Command::Status),
            "test" => Some(Command::Test),
            "profile" => Some(Command::Profile),
            "logout" => Some(Command::Logout),
            _ => None,
        }
    }
}

/// Where a Telegram document is fetched from
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Stream the file into `dest`
    async fn download_to(&self, dest: &Path) -> Result<(), String>;
}

/// Edit the bot message the action came from, or send a new one
fn show(origin: &ChatOrigin, screen: Screen) -> Outgoing {
    match origin.editable_message() {
        Some(message_id) => Outgoing::Edit { message_id, screen },
        None => Outgoing::Send(screen),
    }
}

fn send(text: impl Into<String>) -> Vec<Outgoing> {
    vec![Outgoing::Send(Screen::plain(text))]
}

/// What the user sees after a failed call; nothing more after AuthExpired
fn failure(err: &GatewayError) -> Vec<Outgoing> {
    if err.is_auth_expired() {
        Vec::new()
    } else {
        send(err.user_message())
    }
}

/// Raw payload for the diagnostic commands, split to Telegram's limit
fn dump(value: Value) -> Vec<Outgoing> {
    let json = value.into_json();
    let text = serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string());
    split_message(&text, MAX_MESSAGE_LEN)
        .into_iter()
        .map(|chunk| Outgoing::Send(Screen::plain(chunk)))
        .collect()
}

pub async fn handle_command(ctx: &BotContext, origin: &ChatOrigin, text: &str) -> Vec<Outgoing> {
    let Some(command) = Command::parse(text) else {
        log::debug!("Telegram: unknown command from {}: {}", origin.user_id, text);
        return Vec::new();
    };

    if let Err(e) = ctx.access.check(&origin.user_id) {
        return match command {
            Command::Start | Command::Menu => send(e.user_message()),
            _ => Vec::new(),
        };
    }

    log::info!("Telegram: {:?} from {}", command, origin.user_id);
    match run_command(ctx, origin, command).await {
        Ok(outgoing) => outgoing,
        Err(e) => {
            log::error!("Telegram: command from {} failed: {}", origin.user_id, e);
            failure(&e)
        }
    }
}

async fn run_command(
    ctx: &BotContext,
    origin: &ChatOrigin,
    command: Command,
) -> Result<Vec<Outgoing>, GatewayError> {
    let dispatcher = &ctx.dispatcher;
    match command {
        Command::Start | Command::Menu => start(ctx, origin).await,
        Command::Ticket(ticket) => {
            let value = dispatcher
                .call_raw(GlpiMethod::GetTicket, origin, params([("ticket", ticket.as_str())]))
                .await?;
            Ok(dump(value))
        }
        Command::NewTicket { title, content } => {
            Ok(dump(dispatcher.create_ticket(origin, &title, &content).await?))
        }
        Command::Object { itemtype, id } => {
            Ok(dump(dispatcher.object(origin, &itemtype, &id).await?))
        }
        Command::Status => Ok(dump(
            dispatcher
                .call_raw(GlpiMethod::Status, origin, Params::new())
                .await?,
        )),
        Command::Test => Ok(dump(
            dispatcher
                .call_raw(GlpiMethod::Test, origin, Params::new())
                .await?,
        )),
        Command::Profile => Ok(dump(
            dispatcher
                .call_raw(GlpiMethod::GetMyInfo, origin, Params::new())
                .await?,
        )),
        Command::Logout => logout(ctx, origin).await,
    }
}

/// Main menu when logged in, login prompt otherwise
async fn start(ctx: &BotContext, origin: &ChatOrigin) -> Result<Vec<Outgoing>, GatewayError> {
    let record = ctx
        .dispatcher
        .store()
        .get_record(&origin.user_id)
        .await
        .map_err(GatewayError::Store)?;
    let screen = match record {
        Some(session) if session.is_logged_in() => {
            menus::main_menu_screen(&ctx.settings.glpi_base_url)
        }
        session => menus::login_screen(
            &ctx.settings.bot_username,
            session.as_ref().and_then(|s| s.display_name.as_deref()),
        ),
    };
    Ok(vec![Outgoing::Send(screen)])
}

/// Log out of GLPI and blank the stored token. The login prompt itself comes
/// from the dispatcher.
async fn logout(ctx: &BotContext, origin: &ChatOrigin) -> Result<Vec<Outgoing>, GatewayError> {
    let info = ctx.dispatcher.logout(origin).await?;
    ctx.dispatcher
        .store()
        .clear_session(&origin.user_id)
        .await
        .map_err(GatewayError::Store)?;
    ctx.pending.clear(&origin.user_id);
    log::info!("GLPI: {} logged out", origin.user_id);
    if info.message.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(send(info.message))
    }
}

pub async fn handle_callback(ctx: &BotContext, origin: &ChatOrigin, data: &str) -> Vec<Outgoing> {
    if ctx.access.check(&origin.user_id).is_err() {
        return Vec::new();
    }
    let Some(action) = CallbackAction::parse(data) else {
        log::warn!("Telegram: unknown callback {} from {}", data, origin.user_id);
        return Vec::new();
    };

    log::debug!("Telegram: callback {:?} from {}", action, origin.user_id);
    match run_callback(ctx, origin, action).await {
        Ok(outgoing) => outgoing,
        Err(e) => {
            log::error!("Telegram: callback {} from {} failed: {}", data, origin.user_id, e);
            failure(&e)
        }
    }
}

async fn run_callback(
    ctx: &BotContext,
    origin: &ChatOrigin,
    action: CallbackAction,
) -> Result<Vec<Outgoing>, GatewayError> {
    let dispatcher = &ctx.dispatcher;
    let settings = &ctx.settings;
    let page_size = settings.page_size;

    let screen = match action {
        CallbackAction::Menu => menus::main_menu_screen(&settings.glpi_base_url),
        CallbackAction::Tickets => menus::tickets_screen(),
        CallbackAction::MyTickets { offset } => {
            let tickets = dispatcher.my_tickets(origin).await?;
            menus::my_tickets_screen(&tickets, offset, page_size)
        }
        CallbackAction::AllCurrentTickets { offset } => {
            let my_glpi_id = dispatcher
                .store()
                .get_field(&origin.user_id, fields::GLPI_ID)
                .await
                .map_err(GatewayError::Store)?;
            let total = dispatcher.current_ticket_count(origin).await?;
            let page = dispatcher.current_tickets(origin, offset, page_size).await?;
            menus::all_current_screen(total, &page, offset, page_size, my_glpi_id.as_deref())
        }
        CallbackAction::Ticket { ticket } => {
            let ticket = dispatcher.ticket(origin, &ticket).await?;
            menus::ticket_screen(&ticket, &settings.glpi_base_url)
        }
        CallbackAction::Followups { ticket, offset } => {
            let ticket = dispatcher.ticket(origin, &ticket).await?;
            menus::followups_screen(&ticket, offset, page_size)
        }
        CallbackAction::Documents { ticket, offset } => {
            let ticket = dispatcher.ticket(origin, &ticket).await?;
            menus::documents_screen(&ticket, offset, page_size)
        }
        CallbackAction::History { ticket, offset } => {
            let ticket = dispatcher.ticket(origin, &ticket).await?;
            menus::history_screen(&ticket, offset, page_size)
        }
        CallbackAction::AddFollowup { ticket } => {
            return Ok(vec![Outgoing::Prompt {
                text: menus::followup_prompt(&ticket),
                action: PendingAction::AwaitingComment(ticket),
            }]);
        }
        CallbackAction::AddSolution { ticket } => {
            return Ok(vec![Outgoing::Prompt {
                text: menus::solution_prompt(&ticket),
                action: PendingAction::AwaitingSolution(ticket),
            }]);
        }
        CallbackAction::AddDocument { ticket } => {
            return Ok(vec![Outgoing::Prompt {
                text: menus::document_prompt(&ticket),
                action: PendingAction::AwaitingDocument(ticket),
            }]);
        }
        CallbackAction::SendDocument { ticket, document } => {
            return send_document(ctx, origin, &ticket, &document).await;
        }
        CallbackAction::Entities => {
            let entities = dispatcher.my_entities(origin).await?;
            menus::entities_screen(&entities, &settings.excluded_entities)
        }
        CallbackAction::SetEntity { entity } => {
            let selected = dispatcher.set_my_entity(origin, &entity).await?;
            menus::entity_selected_screen(&selected, &settings.glpi_base_url)
        }
        CallbackAction::MyInfo => {
            let info = dispatcher.my_info(origin).await?;
            menus::my_info_screen(&info, &settings.glpi_base_url)
        }
        CallbackAction::Logout => return logout(ctx, origin).await,
    };
    Ok(vec![show(origin, screen)])
}

/// Fetch a ticket document from GLPI, verify it and send it to the chat
async fn send_document(
    ctx: &BotContext,
    origin: &ChatOrigin,
    ticket: &str,
    document: &str,
) -> Result<Vec<Outgoing>, GatewayError> {
    let mut outgoing = vec![Outgoing::UploadingDocument];
    let payload = match ctx.dispatcher.document(origin, ticket, document).await {
        Ok(payload) => payload,
        Err(e) => {
            log::error!("GLPI: document {} of ticket {} unavailable: {}", document, ticket, e);
            outgoing.extend(failure(&e));
            return Ok(outgoing);
        }
    };
    let dir = download_dir(&ctx.settings.docs_tmp_path, &origin.user_id);
    match documents::stage_document(dir, payload).await {
        Ok(staged) => {
            let caption = staged.original_name.clone();
            outgoing.push(Outgoing::File {
                document: staged,
                caption,
            });
        }
        Err(e) => {
            log::error!("Documents: document {} of ticket {} not staged: {}", document, ticket, e);
            outgoing.extend(failure(&e));
        }
    }
    Ok(outgoing)
}

/// Free text: a reply to a comment or solution prompt consumes it, anything
/// else is ignored
pub async fn handle_text(ctx: &BotContext, origin: &ChatOrigin, text: &str) -> Vec<Outgoing> {
    if ctx.access.check(&origin.user_id).is_err() {
        return Vec::new();
    }
    let Some(reply) = ctx.pending.take_text(&origin.user_id, origin.reply_to) else {
        return Vec::new();
    };

    let dispatcher = &ctx.dispatcher;
    match &reply.action {
        PendingAction::AwaitingComment(ticket) => {
            let users_login = users_login(ctx, origin).await;
            match dispatcher
                .add_followup(origin, ticket, text, &users_login)
                .await
            {
                Ok(update) => {
                    let confirmation = match update.latest_followup() {
                        Some(followup) => menus::followup_added(followup),
                        None => Screen::plain("✅  Комментарий добавлен!"),
                    };
                    with_prompt_removed(&reply, confirmation)
                }
                Err(e) => {
                    log::error!("GLPI: followup to ticket {} failed: {}", ticket, e);
                    if e.is_auth_expired() {
                        Vec::new()
                    } else {
                        send(menus::FOLLOWUP_NOT_ADDED)
                    }
                }
            }
        }
        PendingAction::AwaitingSolution(ticket) => {
            match dispatcher.set_solution(origin, ticket, text).await {
                Ok(_) => with_prompt_removed(&reply, Screen::plain(menus::SOLUTION_ADDED)),
                Err(e) => {
                    log::error!("GLPI: solution of ticket {} failed: {}", ticket, e);
                    failure(&e)
                }
            }
        }
        PendingAction::AwaitingDocument(_) | PendingAction::AwaitingNone => Vec::new(),
    }
}

/// Document message: uploads it to the ticket the user was asked about
pub async fn handle_document(
    ctx: &BotContext,
    origin: &ChatOrigin,
    file_name: &str,
    caption: Option<&str>,
    source: &dyn FileSource,
) -> Vec<Outgoing> {
    if ctx.access.check(&origin.user_id).is_err() {
        return Vec::new();
    }
    let Some(reply) = ctx.pending.take_document(&origin.user_id, origin.reply_to) else {
        return send(menus::UNEXPECTED_FILE);
    };
    let Some(ticket) = reply.action.ticket_id().map(str::to_string) else {
        return Vec::new();
    };

    let name = documents::sanitize_filename(file_name);
    let staged = staging_path(&ctx.settings.docs_tmp_path, &origin.user_id, &name);
    let comment = caption.unwrap_or("");
    let result = upload_document(ctx, origin, &ticket, &name, comment, &staged, source).await;
    if let Err(e) = tokio::fs::remove_file(&staged).await {
        log::debug!("Documents: staged upload {} not removed: {}", staged.display(), e);
    }

    match result {
        Ok(update) => {
            let confirmation = match update.latest_document() {
                Some(doc) => menus::document_added(doc),
                None => Screen::plain("✅  Документ добавлен!"),
            };
            with_prompt_removed(&reply, confirmation)
        }
        Err(GatewayError::AuthExpired) => Vec::new(),
        Err(GatewayError::Rejected { message, .. }) if message.contains("name") => {
            log::error!("GLPI: {} ({})", message, name);
            send(menus::FILE_FORMAT_FORBIDDEN)
        }
        Err(e) => {
            log::error!("GLPI: document upload to ticket {} failed: {}", ticket, e);
            send(menus::DOCUMENT_NOT_ADDED)
        }
    }
}

/// Uploads and downloads are staged in per-user subdirectories so two users
/// moving a file of the same name never share a path
fn staging_path(root: &Path, user_id: &str, name: &str) -> PathBuf {
    root.join(format!("upload_{}", user_id)).join(name)
}

fn download_dir(root: &Path, user_id: &str) -> PathBuf {
    root.join(format!("download_{}", user_id))
}

async fn upload_document(
    ctx: &BotContext,
    origin: &ChatOrigin,
    ticket: &str,
    name: &str,
    comment: &str,
    staged: &Path,
    source: &dyn FileSource,
) -> Result<crate::glpi::types::TicketUpdate, GatewayError> {
    if let Some(dir) = staged.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    source.download_to(staged).await.map_err(GatewayError::Io)?;
    let base64 = documents::encode_staged(staged.to_path_buf()).await?;
    let users_login = users_login(ctx, origin).await;
    ctx.dispatcher
        .add_document(
            origin,
            DocumentUpload {
                ticket_id: ticket,
                name,
                base64: &base64,
                comment,
                users_login: &users_login,
            },
        )
        .await
}

async fn users_login(ctx: &BotContext, origin: &ChatOrigin) -> String {
    match ctx.dispatcher.store().login_name(&origin.user_id).await {
        Ok(name) => name.unwrap_or_default(),
        Err(e) => {
            log::warn!("Session: no login name for {}: {}", origin.user_id, e);
            String::new()
        }
    }
}

fn with_prompt_removed(reply: &PendingReply, confirmation: Screen) -> Vec<Outgoing> {
    let mut outgoing = Vec::with_capacity(2);
    if let Some(message_id) = reply.prompt_message_id {
        outgoing.push(Outgoing::Delete { message_id });
    }
    outgoing.push(Outgoing::Send(confirmation));
    outgoing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessList;
    use crate::bot::BotSettings;
    use crate::documents::{encode_bytes, sha1_hex};
    use crate::session::SessionStore;
    use crate::testing::{AUTH_FAULT, Harness, fault, ok_json};
    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        h: Harness,
        ctx: BotContext,
        _dir: TempDir,
    }

    fn fixture(responses: Vec<Result<Value, crate::glpi::RpcError>>) -> Fixture {
        let dir = tempdir().unwrap();
        let h = Harness::new(responses);
        let ctx = BotContext::new(
            h.dispatcher.clone(),
            AccessList::new(vec!["100", "200"]),
            BotSettings {
                glpi_base_url: "http://glpi.local".to_string(),
                page_size: 5,
                excluded_entities: vec!["12".to_string()],
                docs_tmp_path: dir.path().to_path_buf(),
                login_thumb_url: None,
                bot_username: "glpi_bot".to_string(),
            },
        );
        Fixture { h, ctx, _dir: dir }
    }

    fn menu_origin() -> ChatOrigin {
        ChatOrigin::new("100", 100).with_message(55, true)
    }

    fn user_origin(user: &str) -> ChatOrigin {
        ChatOrigin::new(user, 100).with_message(60, false)
    }

    fn reply_origin(user: &str, prompt: i32) -> ChatOrigin {
        user_origin(user).replying_to(Some(prompt))
    }

    struct BytesSource(Vec<u8>);

    #[async_trait]
    impl FileSource for BytesSource {
        async fn download_to(&self, dest: &Path) -> Result<(), String> {
            tokio::fs::write(dest, &self.0).await.map_err(|e| e.to_string())
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/menu@glpi_bot"), Some(Command::Menu));
        assert_eq!(Command::parse("/ticket 42"), Some(Command::Ticket("42".to_string())));
        assert_eq!(Command::parse("/ticket abc"), None);
        assert_eq!(
            Command::parse("/newticket Printer ### It jams\nevery day"),
            Some(Command::NewTicket {
                title: "Printer".to_string(),
                content: "It jams\nevery day".to_string()
            })
        );
        assert_eq!(
            Command::parse("/obj Computer 5"),
            Some(Command::Object {
                itemtype: "Computer".to_string(),
                id: "5".to_string()
            })
        );
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("hello"), None);
    }

    #[tokio::test]
    async fn test_unauthorized_user_never_reaches_glpi() {
        let f = fixture(vec![ok_json(json!({}))]);
        let stranger = user_origin("999");

        assert_eq!(
            handle_command(&f.ctx, &stranger, "/start").await,
            send(menus::NOT_ALLOWED)
        );
        assert!(handle_command(&f.ctx, &stranger, "/status").await.is_empty());
        assert!(handle_command(&f.ctx, &stranger, "/ticket 5").await.is_empty());
        assert!(handle_callback(&f.ctx, &stranger, "cb_tickets_mine0").await.is_empty());
        assert!(handle_callback(&f.ctx, &stranger, "cb_logout").await.is_empty());
        f.ctx.pending.set("999", PendingAction::AwaitingComment("1".to_string()), Some(70));
        let reply = stranger.clone().replying_to(Some(70));
        assert!(handle_text(&f.ctx, &reply, "hi").await.is_empty());
        let source = BytesSource(b"x".to_vec());
        assert!(handle_document(&f.ctx, &stranger, "a.txt", None, &source).await.is_empty());

        assert_eq!(f.h.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_start_shows_login_prompt_when_logged_out() {
        let f = fixture(vec![]);
        f.h.store.set_field("100", fields::LOGIN_NAME, "ivanov").await.unwrap();

        let out = handle_command(&f.ctx, &user_origin("100"), "/start").await;

        let Outgoing::Send(screen) = &out[0] else { panic!("{:?}", out) };
        assert!(screen.text.contains("@glpi_bot user password login"));
        assert_eq!(
            screen.keyboard.as_ref().unwrap().inline_keyboard[0][0].kind,
            teloxide::types::InlineKeyboardButtonKind::SwitchInlineQueryCurrentChat(
                "ivanov ".to_string()
            )
        );
        assert_eq!(f.h.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_start_shows_menu_when_logged_in() {
        let f = fixture(vec![]);
        f.h.login("100", "tok", "ivanov").await;

        let out = handle_command(&f.ctx, &user_origin("100"), "/menu").await;

        assert_eq!(out, vec![Outgoing::Send(menus::main_menu_screen("http://glpi.local"))]);
    }

    #[tokio::test]
    async fn test_menu_callback_edits_in_place() {
        let f = fixture(vec![]);
        let out = handle_callback(&f.ctx, &menu_origin(), "cb_tickets").await;
        assert_eq!(
            out,
            vec![Outgoing::Edit {
                message_id: 55,
                screen: menus::tickets_screen()
            }]
        );
    }

    #[tokio::test]
    async fn test_expired_session_shows_only_login_prompt() {
        let f = fixture(vec![fault(AUTH_FAULT, "expired")]);
        f.h.login("100", "stale", "ivanov").await;

        let out = handle_callback(&f.ctx, &menu_origin(), "cb_my_info").await;

        assert!(out.is_empty());
        assert_eq!(f.h.prompter.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_shows_server_message() {
        let f = fixture(vec![Err(crate::glpi::RpcError::Transport("down".to_string()))]);
        f.h.login("100", "tok", "ivanov").await;

        let out = handle_callback(&f.ctx, &menu_origin(), "cb_entities").await;

        assert_eq!(out, send("Что-то не так с сервером!"));
    }

    #[tokio::test]
    async fn test_all_current_tickets_page() {
        let f = fixture(vec![
            ok_json(json!({"count": "12"})),
            ok_json(json!([
                {"id": "11", "name": "A", "users": {"assign": [{"id": "7"}]}},
                {"id": "12", "name": "B", "users": {"assign": []}}
            ])),
        ]);
        f.h.login("100", "tok", "ivanov").await;

        let out = handle_callback(&f.ctx, &menu_origin(), "cb_tickets_all_current10").await;

        let Outgoing::Edit { screen, .. } = &out[0] else { panic!("{:?}", out) };
        assert!(screen.text.contains("(12)"));
        let kb = screen.keyboard.as_ref().unwrap();
        assert!(kb.inline_keyboard[0][0].text.starts_with("👨‍💻"));
        let calls = f.h.gateway.calls();
        assert_eq!(calls[1].1.get("start"), Some(&Value::Int(10)));
    }

    #[tokio::test]
    async fn test_logout_clears_token_and_prompts() {
        let f = fixture(vec![ok_json(json!({"message": "Bye"}))]);
        f.h.login("100", "tok", "ivanov").await;

        let out = handle_callback(&f.ctx, &menu_origin(), "cb_logout").await;

        assert_eq!(out, send("Bye"));
        assert_eq!(f.h.store.session_token("100").await.unwrap(), None);
        assert_eq!(f.h.prompter.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_without_message_still_clears_token() {
        let f = fixture(vec![ok_json(json!(true))]);
        f.h.login("100", "tok", "ivanov").await;
        f.ctx.pending.set("100", PendingAction::AwaitingComment("9".to_string()), Some(77));

        let out = handle_callback(&f.ctx, &menu_origin(), "cb_logout").await;

        assert!(out.is_empty());
        assert_eq!(f.h.store.session_token("100").await.unwrap(), None);
        assert_eq!(f.ctx.pending.get("100"), PendingAction::AwaitingNone);
        assert_eq!(f.h.prompter.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_comment_flow() {
        let f = fixture(vec![ok_json(json!({
            "followups": [{"id": "3", "tickets_id": "9", "date_mod": "now", "content": "done"}]
        }))]);
        f.h.login("100", "tok", "ivanov").await;

        let prompt = handle_callback(&f.ctx, &menu_origin(), "cb_ticket_9_followup_add").await;
        assert_eq!(
            prompt,
            vec![Outgoing::Prompt {
                text: "Комментарий к заявке #9".to_string(),
                action: PendingAction::AwaitingComment("9".to_string()),
            }]
        );
        f.ctx.pending.set("100", PendingAction::AwaitingComment("9".to_string()), Some(77));

        let out = handle_text(&f.ctx, &reply_origin("100", 77), "done").await;

        assert_eq!(out[0], Outgoing::Delete { message_id: 77 });
        let Outgoing::Send(screen) = &out[1] else { panic!("{:?}", out) };
        assert!(screen.text.contains("Комментарий добавлен"));
        let sent = f.h.gateway.last_params().unwrap();
        assert_eq!(sent.get("content"), Some(&Value::str("done")));
        assert_eq!(sent.get("users_login"), Some(&Value::str("ivanov")));
        assert_eq!(sent.get("source"), Some(&Value::str("Telegram")));

        assert!(handle_text(&f.ctx, &reply_origin("100", 77), "again").await.is_empty());
        assert_eq!(f.h.gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_text_outside_the_prompt_thread_keeps_it_pending() {
        let f = fixture(vec![ok_json(json!({}))]);
        f.h.login("100", "tok", "ivanov").await;
        f.ctx.pending.set("100", PendingAction::AwaitingComment("9".to_string()), Some(77));

        let typed = "@glpi_bot ivanov s3cret login";
        assert!(handle_text(&f.ctx, &user_origin("100"), typed).await.is_empty());
        assert!(handle_text(&f.ctx, &reply_origin("100", 12), typed).await.is_empty());

        assert_eq!(f.h.gateway.call_count(), 0);
        assert_eq!(
            f.ctx.pending.get("100"),
            PendingAction::AwaitingComment("9".to_string())
        );
    }

    #[tokio::test]
    async fn test_solution_flow() {
        let f = fixture(vec![ok_json(json!(true))]);
        f.h.login("100", "tok", "ivanov").await;
        f.ctx.pending.set("100", PendingAction::AwaitingSolution("9".to_string()), Some(78));

        let out = handle_text(&f.ctx, &reply_origin("100", 78), "rebooted").await;

        assert_eq!(out, send(menus::SOLUTION_ADDED));
        let sent = f.h.gateway.last_params().unwrap();
        assert_eq!(sent.get("type"), Some(&Value::Int(8)));
        assert_eq!(sent.get("solution"), Some(&Value::str("rebooted")));
    }

    #[tokio::test]
    async fn test_document_without_prompt_is_refused() {
        let f = fixture(vec![]);
        let source = BytesSource(b"x".to_vec());
        let out = handle_document(&f.ctx, &user_origin("100"), "a.txt", None, &source).await;
        assert_eq!(out, send(menus::UNEXPECTED_FILE));
        assert_eq!(f.h.gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_document_upload_flow() {
        let f = fixture(vec![ok_json(json!({
            "documents": [
                {"id": "1", "tickets_id": "9", "filename": "old.txt"},
                {"id": "2", "tickets_id": "9", "filename": "otchet.txt"}
            ]
        }))]);
        f.h.login("100", "tok", "ivanov").await;
        f.ctx.pending.set("100", PendingAction::AwaitingDocument("9".to_string()), Some(80));
        let source = BytesSource(b"report".to_vec());

        let origin = reply_origin("100", 80);
        let out = handle_document(&f.ctx, &origin, "отчет.txt", Some("for you"), &source).await;

        assert_eq!(out[0], Outgoing::Delete { message_id: 80 });
        let Outgoing::Send(screen) = &out[1] else { panic!("{:?}", out) };
        assert!(screen.text.contains("otchet.txt"));
        let sent = f.h.gateway.last_params().unwrap();
        assert_eq!(sent.get("name"), Some(&Value::str("otchet.txt")));
        assert_eq!(sent.get("base64"), Some(&Value::str(encode_bytes(b"report"))));
        assert_eq!(sent.get("content"), Some(&Value::str("for you")));
        assert!(!staging_path(&f.ctx.settings.docs_tmp_path, "100", "otchet.txt").exists());
    }

    #[tokio::test]
    async fn test_forbidden_document_format() {
        let f = fixture(vec![fault(1, "Invalid document name: x.exe")]);
        f.h.login("100", "tok", "ivanov").await;
        f.ctx.pending.set("100", PendingAction::AwaitingDocument("9".to_string()), Some(81));
        let source = BytesSource(b"MZ".to_vec());

        let out = handle_document(&f.ctx, &reply_origin("100", 81), "x.exe", None, &source).await;

        assert_eq!(out, send(menus::FILE_FORMAT_FORBIDDEN));
    }

    #[tokio::test]
    async fn test_send_document_verifies_checksum() {
        let f = fixture(vec![
            ok_json(json!({
                "filename": "scan 1.png",
                "base64": encode_bytes(b"png-bytes"),
                "sha1sum": sha1_hex(b"png-bytes")
            })),
            ok_json(json!({
                "filename": "bad.pdf",
                "base64": encode_bytes(b"pdf"),
                "sha1sum": "0000"
            })),
        ]);
        f.h.login("100", "tok", "ivanov").await;

        let out = handle_callback(&f.ctx, &menu_origin(), "cb_ticket_9_document_4_send").await;
        assert_eq!(out[0], Outgoing::UploadingDocument);
        let Outgoing::File { document, caption } = &out[1] else { panic!("{:?}", out) };
        assert_eq!(caption, "scan 1.png");
        assert!(document.is_image());
        assert_eq!(std::fs::read(&document.path).unwrap(), b"png-bytes");

        let out = handle_callback(&f.ctx, &menu_origin(), "cb_ticket_9_document_5_send").await;
        assert_eq!(out[0], Outgoing::UploadingDocument);
        let Outgoing::Send(screen) = &out[1] else { panic!("{:?}", out) };
        assert!(screen.text.contains("повреждён"));
        assert!(!download_dir(&f.ctx.settings.docs_tmp_path, "100").join("bad.pdf").exists());
    }

    #[tokio::test]
    async fn test_downloads_are_staged_per_user() {
        let document = json!({
            "filename": "act.pdf",
            "base64": encode_bytes(b"pdf-bytes"),
            "sha1sum": sha1_hex(b"pdf-bytes")
        });
        let f = fixture(vec![ok_json(document.clone()), ok_json(document)]);
        f.h.login("100", "tok", "ivanov").await;
        f.h.login("200", "tok2", "petrov").await;
        let other = ChatOrigin::new("200", 200).with_message(56, true);

        let first = handle_callback(&f.ctx, &menu_origin(), "cb_ticket_9_document_4_send").await;
        let second = handle_callback(&f.ctx, &other, "cb_ticket_9_document_4_send").await;

        let (Outgoing::File { document: a, .. }, Outgoing::File { document: b, .. }) =
            (&first[1], &second[1])
        else {
            panic!("{:?} {:?}", first, second)
        };
        assert_ne!(a.path, b.path);
        assert_eq!(a.path, download_dir(&f.ctx.settings.docs_tmp_path, "100").join("act.pdf"));
        assert_eq!(b.path, download_dir(&f.ctx.settings.docs_tmp_path, "200").join("act.pdf"));
        assert_eq!(std::fs::read(&a.path).unwrap(), b"pdf-bytes");
        assert_eq!(std::fs::read(&b.path).unwrap(), b"pdf-bytes");
    }

    #[tokio::test]
    async fn test_long_dump_is_split() {
        let long = "x".repeat(MAX_MESSAGE_LEN * 2);
        let f = fixture(vec![ok_json(json!({ "content": long }))]);
        f.h.login("100", "tok", "ivanov").await;

        let out = handle_command(&f.ctx, &user_origin("100"), "/ticket 9").await;

        assert!(out.len() >= 3);
        for item in &out {
            let Outgoing::Send(screen) = item else { panic!("{:?}", item) };
            assert!(screen.text.chars().count() <= MAX_MESSAGE_LEN);
        }
    }
}
