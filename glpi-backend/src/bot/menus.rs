//! Menu texts and inline keyboards.

use chrono::NaiveDateTime;
use quick_xml::escape::escape;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use super::Screen;
use super::callbacks::CallbackAction;
use crate::glpi::types::{Entity, Followup, MyInfo, Ticket, TicketDocument, TicketSummary};
use crate::pagination::{self, NavigationControls};

pub const BTN_MENU: &str = "🏠  Главное меню";
pub const BTN_TICKETS: &str = "🔙  Заявки";
pub const BTN_DESC: &str = "🔙  Описание";
pub const BTN_LOGIN: &str = "🔐  Вход в GLPI";

pub const NO_DATE: &str = "нет даты";
pub const NOT_ALLOWED: &str = "Только для своих";
pub const UNEXPECTED_FILE: &str =
    "Что это за файл? Я просто так файлы не принимаю, только через меню заявки!";
pub const FILE_FORMAT_FORBIDDEN: &str = "❌  Формат файла запрещен к загрузке в настройках GLPI!";
pub const DOCUMENT_NOT_ADDED: &str = "❌  Что-то пошло не так, документ не добавлен!";
pub const FOLLOWUP_NOT_ADDED: &str = "❌  Что-то пошло не так, комментарий не добавлен!";
pub const SOLUTION_ADDED: &str = "✅  Решение добавлено";
pub const ENTITIES_TEXT: &str =
    "Укажи организацию. От организации зависит, какие заявки и активы будут доступны";

const GLPI_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `2019-05-14 10:00:00` -> `14.05.2019`
pub fn format_date(raw: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(raw.trim(), GLPI_DATE_FORMAT)
        .ok()
        .map(|dt| dt.format("%d.%m.%Y").to_string())
}

fn date_or_placeholder(raw: Option<&str>) -> String {
    raw.and_then(format_date)
        .unwrap_or_else(|| NO_DATE.to_string())
}

fn html(s: &str) -> String {
    escape(s).into_owned()
}

pub fn button(text: impl Into<String>, action: CallbackAction) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.to_string())
}

fn menu_row() -> Vec<InlineKeyboardButton> {
    vec![button(BTN_MENU, CallbackAction::Menu)]
}

fn description_row(ticket: &str) -> Vec<InlineKeyboardButton> {
    vec![button(
        BTN_DESC,
        CallbackAction::Ticket {
            ticket: ticket.to_string(),
        },
    )]
}

/// prev/next buttons, or nothing when everything fits on one page
pub fn nav_row(controls: &NavigationControls) -> Option<Vec<InlineKeyboardButton>> {
    if controls.is_empty() {
        return None;
    }
    Some(
        controls
            .iter()
            .map(|c| InlineKeyboardButton::callback(c.direction.label(), c.callback.clone()))
            .collect(),
    )
}

/// Items, then the navigation row, then the footer
fn paged_keyboard(
    items: Vec<Vec<InlineKeyboardButton>>,
    controls: &NavigationControls,
    footer: Vec<Vec<InlineKeyboardButton>>,
) -> InlineKeyboardMarkup {
    let mut rows = items;
    rows.extend(nav_row(controls));
    rows.extend(footer);
    InlineKeyboardMarkup::new(rows)
}

pub fn main_menu(glpi_base_url: &str) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![button("🎫  Заявки", CallbackAction::Tickets)],
        vec![button("🏘️  Выбрать организацию", CallbackAction::Entities)],
        vec![button("ℹ️  Кто я?", CallbackAction::MyInfo)],
    ];
    match url::Url::parse(glpi_base_url) {
        Ok(site) => rows.push(vec![InlineKeyboardButton::url("🔗  Открыть сайт GLPI", site)]),
        Err(e) => log::warn!("Menu: GLPI base URL is not a valid link: {}", e),
    }
    rows.push(vec![button("🚪  Выйти из GLPI", CallbackAction::Logout)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn main_menu_screen(glpi_base_url: &str) -> Screen {
    Screen::markdown("Меню").with_keyboard(main_menu(glpi_base_url))
}

/// Single button opening the inline login query, pre-filled with the last
/// known login name
pub fn login_keyboard(login_hint: Option<&str>) -> InlineKeyboardMarkup {
    let query = login_hint
        .map(|name| format!("{} ", name))
        .unwrap_or_default();
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::switch_inline_query_current_chat(BTN_LOGIN, query),
    ]])
}

pub fn login_text(bot_username: &str) -> String {
    format!(
        "Нажми кнопку *{}* под сообщением и вводи данные, \
чтобы получилась такая строка:\n\n\
`@{} user password login`\n\n\
*user и password* - замени на свои\n\
*login* - специальное слово, прямо так и написать login\n\
*1 пробел* между частями заклинания\n\n\
Если всё сделал правильно, всплывет карточка «Вход в GLPI» с приветствием. \
Нажми на неё, чтобы продолжить работу с GLPI через бота!\n\n\
_P.S. Если заходишь через десктоп, то не нажимай Enter, иначе отправишь свой пароль в чат. \
В данном случае это не страшно, просто удали сообщение с ним._",
        BTN_LOGIN, bot_username
    )
}

pub fn login_screen(bot_username: &str, login_hint: Option<&str>) -> Screen {
    Screen::markdown(login_text(bot_username)).with_keyboard(login_keyboard(login_hint))
}

/// Login prompt shown when the session is gone
pub fn reauth_screen(bot_username: &str, login_hint: Option<&str>) -> Screen {
    Screen::markdown(format!(
        "❗*Войди для продолжения работы*❗\n{}",
        login_text(bot_username)
    ))
    .with_keyboard(login_keyboard(login_hint))
}

pub fn tickets_screen() -> Screen {
    Screen::plain("Заявки").with_keyboard(InlineKeyboardMarkup::new(vec![
        vec![button("👨‍💻  Мои заявки", CallbackAction::MyTickets { offset: 0 })],
        vec![button(
            "👥  Все нерешенные",
            CallbackAction::AllCurrentTickets { offset: 0 },
        )],
        menu_row(),
    ]))
}

fn ticket_button(ticket: &TicketSummary, mine: bool) -> Vec<InlineKeyboardButton> {
    let text = format!(
        "[{}] {}",
        date_or_placeholder(ticket.time_to_resolve.as_deref()),
        ticket.name
    );
    let text = if mine { format!("👨‍💻  {}", text) } else { text };
    vec![button(
        text,
        CallbackAction::Ticket {
            ticket: ticket.id.clone(),
        },
    )]
}

/// Tickets assigned to the user; the whole list is fetched and sliced here
pub fn my_tickets_screen(tickets: &[TicketSummary], offset: usize, page_size: usize) -> Screen {
    let prefix = CallbackAction::MyTickets { offset }
        .page_prefix()
        .unwrap_or_default();
    let controls = pagination::render(tickets.len(), offset, page_size, &prefix);
    let items = pagination::page_slice(tickets, offset, page_size)
        .iter()
        .map(|t| ticket_button(t, false))
        .collect();
    let keyboard = paged_keyboard(
        items,
        &controls,
        vec![vec![button(BTN_TICKETS, CallbackAction::Tickets)]],
    );
    Screen::plain(format!("👨‍💻  Назначенные мне заявки ({})", tickets.len()))
        .with_keyboard(keyboard)
}

/// One page of all unresolved tickets, already paged by GLPI
pub fn all_current_screen(
    total: usize,
    page: &[TicketSummary],
    offset: usize,
    page_size: usize,
    my_glpi_id: Option<&str>,
) -> Screen {
    let prefix = CallbackAction::AllCurrentTickets { offset }
        .page_prefix()
        .unwrap_or_default();
    let controls = pagination::render(total, offset, page_size, &prefix);
    let items = page
        .iter()
        .take(page_size)
        .map(|t| ticket_button(t, my_glpi_id.map(|id| t.is_assigned_to(id)).unwrap_or(false)))
        .collect();
    let keyboard = paged_keyboard(
        items,
        &controls,
        vec![vec![button(BTN_TICKETS, CallbackAction::Tickets)]],
    );
    Screen::plain(format!("👥  Все нерешенные ({})", total)).with_keyboard(keyboard)
}

pub fn ticket_screen(ticket: &Ticket, glpi_base_url: &str) -> Screen {
    let requester = ticket
        .users
        .requester
        .first()
        .map(|u| u.users_name.as_str())
        .unwrap_or_default();
    let assigned = ticket
        .users
        .assign
        .iter()
        .map(|u| u.users_name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let deadline = ticket
        .time_to_resolve
        .as_deref()
        .and_then(format_date)
        .unwrap_or_default();

    let text = format!(
        "<b><a href=\"{}/front/ticket.form.php?id={}\">🔗  {}</a></b>\n\
<b>Описание:</b> {}\n\
<b>Срок:</b> {}\n\
<b>Категория:</b> {}\n\
<b>Организация:</b> {}\n\
<b>Автор:</b> {}\n\
<b>Назначено:</b> {}",
        html(glpi_base_url),
        html(&ticket.id),
        html(&ticket.name),
        html(&ticket.content),
        deadline,
        html(&ticket.ticketcategories_name),
        html(&ticket.entities_name.replace("&gt;", ">")),
        html(requester),
        html(&assigned),
    );

    let id = ticket.id.clone();
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            button("✔️  Решение", CallbackAction::AddSolution { ticket: id.clone() }),
            button(
                format!("💬  Комментарии ({})", ticket.followups.len()),
                CallbackAction::Followups {
                    ticket: id.clone(),
                    offset: 0,
                },
            ),
        ],
        vec![
            button(
                format!("📄  Документ ({})", ticket.documents.len()),
                CallbackAction::Documents {
                    ticket: id.clone(),
                    offset: 0,
                },
            ),
            button(
                format!("📖️  История ({})", ticket.events.len()),
                CallbackAction::History { ticket: id, offset: 0 },
            ),
        ],
        vec![
            button("🔙  Мои заявки", CallbackAction::MyTickets { offset: 0 }),
            button(
                "🔙  Все нерешенные заявки",
                CallbackAction::AllCurrentTickets { offset: 0 },
            ),
        ],
        menu_row(),
    ]);
    Screen::html(text).with_keyboard(keyboard)
}

pub fn followups_screen(ticket: &Ticket, offset: usize, page_size: usize) -> Screen {
    let action = CallbackAction::Followups {
        ticket: ticket.id.clone(),
        offset,
    };
    let sorted = ticket.followups_newest_first();
    let controls = pagination::render(
        sorted.len(),
        offset,
        page_size,
        &action.page_prefix().unwrap_or_default(),
    );
    let items: String = pagination::page_slice(&sorted, offset, page_size)
        .iter()
        .map(|f| {
            format!(
                "\n<b>{}</b>, {}\n💬  {}\n",
                html(&f.date_mod),
                html(&f.users_name),
                html(&f.content)
            )
        })
        .collect();

    let text = if sorted.is_empty() {
        format!("<b>У заявки «{}» пока нет комментариев</b>", html(&ticket.name))
    } else {
        format!("<b>Комментарии к заявке «{}»\n</b>{}", html(&ticket.name), items)
    };
    let keyboard = paged_keyboard(
        Vec::new(),
        &controls,
        vec![
            vec![button(
                "📝  Добавить комментарий",
                CallbackAction::AddFollowup {
                    ticket: ticket.id.clone(),
                },
            )],
            description_row(&ticket.id),
            menu_row(),
        ],
    );
    Screen::html(text).with_keyboard(keyboard)
}

pub fn documents_screen(ticket: &Ticket, offset: usize, page_size: usize) -> Screen {
    let action = CallbackAction::Documents {
        ticket: ticket.id.clone(),
        offset,
    };
    let sorted = ticket.documents_newest_first();
    let controls = pagination::render(
        sorted.len(),
        offset,
        page_size,
        &action.page_prefix().unwrap_or_default(),
    );
    let page = pagination::page_slice(&sorted, offset, page_size);
    let items: String = page
        .iter()
        .map(|d| {
            format!(
                "\n<b>{}</b>, {}\n💾  {}\n",
                html(&d.date_creation),
                html(&d.users_name),
                html(&d.filename)
            )
        })
        .collect();
    let buttons = page
        .iter()
        .map(|d| {
            let ticket_id = if d.tickets_id.is_empty() {
                ticket.id.clone()
            } else {
                d.tickets_id.clone()
            };
            vec![button(
                format!("💾  {}", d.filename),
                CallbackAction::SendDocument {
                    ticket: ticket_id,
                    document: d.id.clone(),
                },
            )]
        })
        .collect();

    let text = if sorted.is_empty() {
        format!("<b>У заявки «{}» пока нет документов</b>", html(&ticket.name))
    } else {
        format!("<b>Документы к заявке «{}»</b>\n{}", html(&ticket.name), items)
    };
    let keyboard = paged_keyboard(
        buttons,
        &controls,
        vec![
            vec![button(
                "📂  Добавить документ",
                CallbackAction::AddDocument {
                    ticket: ticket.id.clone(),
                },
            )],
            description_row(&ticket.id),
            menu_row(),
        ],
    );
    Screen::html(text).with_keyboard(keyboard)
}

pub fn history_screen(ticket: &Ticket, offset: usize, page_size: usize) -> Screen {
    let action = CallbackAction::History {
        ticket: ticket.id.clone(),
        offset,
    };
    let sorted = ticket.events_newest_first();
    let controls = pagination::render(
        sorted.len(),
        offset,
        page_size,
        &action.page_prefix().unwrap_or_default(),
    );
    let items: String = pagination::page_slice(&sorted, offset, page_size)
        .iter()
        .map(|e| {
            format!(
                "\n<b>{}</b>, {}\n{}, {}\n",
                html(&e.date_mod),
                html(&e.user_name),
                html(&e.field),
                html(&e.change)
            )
        })
        .collect();
    let keyboard = paged_keyboard(
        Vec::new(),
        &controls,
        vec![description_row(&ticket.id), menu_row()],
    );
    Screen::html(format!("<b>История заявки «{}»</b>\n{}", html(&ticket.name), items))
        .with_keyboard(keyboard)
}

/// Entity picker, two buttons per row, excluded ids hidden
pub fn entities_screen(entities: &[Entity], excluded: &[String]) -> Screen {
    let buttons: Vec<InlineKeyboardButton> = entities
        .iter()
        .filter(|e| !excluded.contains(&e.id))
        .map(|e| {
            button(
                e.name.clone(),
                CallbackAction::SetEntity {
                    entity: e.id.clone(),
                },
            )
        })
        .collect();
    let mut rows: Vec<Vec<InlineKeyboardButton>> =
        buttons.chunks(2).map(|pair| pair.to_vec()).collect();
    rows.push(menu_row());
    Screen::markdown(ENTITIES_TEXT).with_keyboard(InlineKeyboardMarkup::new(rows))
}

pub fn entity_selected_screen(selected: &[Entity], glpi_base_url: &str) -> Screen {
    let name = selected
        .first()
        .map(|e| e.completename.as_str())
        .unwrap_or_default();
    Screen::html(format!("Выбранная организация: {}", html(name)))
        .with_keyboard(main_menu(glpi_base_url))
}

pub fn my_info_screen(info: &MyInfo, glpi_base_url: &str) -> Screen {
    Screen::html(format!(
        "<b>{} {}</b>\n{}\n{}",
        html(&info.realname),
        html(&info.firstname),
        html(&info.usertitles_name),
        html(&info.email)
    ))
    .with_keyboard(main_menu(glpi_base_url))
}

pub fn followup_prompt(ticket: &str) -> String {
    format!("Комментарий к заявке #{}", ticket)
}

pub fn solution_prompt(ticket: &str) -> String {
    format!("Решение заявки #{}", ticket)
}

pub fn document_prompt(ticket: &str) -> String {
    format!("Документ к заявке #{}", ticket)
}

pub fn followup_added(followup: &Followup) -> Screen {
    Screen::html(format!(
        "✅  Комментарий добавлен!\n\n\
На всякий случай, это последний комментарий из заявки #{}:\n\n\
<b>{}</b>\n💬  {}\n\n\
🗑️  Можешь удалить это и предыдущее сообщение, чтобы чат стал чище!",
        html(&followup.tickets_id),
        html(&followup.date_mod),
        html(&followup.content)
    ))
}

pub fn document_added(document: &TicketDocument) -> Screen {
    Screen::html(format!(
        "✅  Документ добавлен!\n\n\
На всякий случай, это последний документ из заявки #{}:\n\
<b>{}</b>\n💾  {}\n\n\
🗑️  Можешь удалить это и предыдущее сообщение, чтобы чат стал чище!",
        html(&document.tickets_id),
        html(&document.date_mod),
        html(&document.filename)
    ))
}
