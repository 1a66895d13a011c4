//! Text shaping for tickets, team alerts and chat replies.

use crate::{
    domain::{CreatedTicket, TicketId},
    messaging::types::{ChatInfo, ChatKind, Sender},
};

/// Marker agents' mail clients append before a signature block.
pub const SIGNATURE_DELIMITER: &str = "—\nSent from";

/// Characters of the user's message quoted in the team alert.
const ALERT_PREVIEW_CHARS: usize = 250;

pub const RATE_LIMITED_NOTICE: &str = "⏳ Please wait before sending another request.";
pub const CREATE_FAILED_NOTICE: &str =
    "❌ Failed to create a support ticket. Please try again later.";
pub const RESOLVED_NOTICE: &str = "✅ Your request has been resolved. Thank you!";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Cut a comment body before its signature block.
pub fn strip_signature(body: &str) -> &str {
    match body.find(SIGNATURE_DELIMITER) {
        Some(idx) => body[..idx].trim(),
        None => body.trim(),
    }
}

const SUPPORT_REPLY_HEADER: &str = "💬 <b>Support reply:</b>\n";

/// An agent reply as one or more HTML messages of at most `max_len` chars.
///
/// Only the first message carries the header. Splits never land inside an
/// escaped entity.
pub fn support_reply_messages(body: &str, max_len: usize) -> Vec<String> {
    let header_len = SUPPORT_REPLY_HEADER.chars().count();
    // Room for the header plus the longest entity (`&quot;`).
    let max_len = max_len.max(header_len + 6);

    let mut out = Vec::new();
    let mut cur = String::from(SUPPORT_REPLY_HEADER);
    let mut cur_len = header_len;
    let mut has_body = false;

    for ch in strip_signature(body).chars() {
        let mut buf = [0u8; 4];
        let piece = match ch {
            '&' => "&amp;",
            '<' => "&lt;",
            '>' => "&gt;",
            '"' => "&quot;",
            _ => &*ch.encode_utf8(&mut buf),
        };
        let piece_len = piece.chars().count();
        if has_body && cur_len + piece_len > max_len {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        cur.push_str(piece);
        cur_len += piece_len;
        has_body = true;
    }
    out.push(cur);
    out
}

pub fn too_long_notice(max_len: usize) -> String {
    format!("❌ Message is too long. Maximum allowed: {max_len} characters.")
}

pub fn ticket_created_notice(id: TicketId) -> String {
    format!("✅ Support ticket #{id} has been created.")
}

pub fn ticket_subject(category: &str) -> String {
    format!("[Telegram] {category}")
}

pub fn requester_name(sender: &Sender) -> String {
    sender
        .full_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "Telegram User".to_string())
}

/// One line describing where a request came from.
pub fn chat_info_line(chat: &ChatInfo, sender: &Sender) -> String {
    if chat.kind == ChatKind::Private {
        return format!(
            "Private chat with {}",
            sender.full_name.as_deref().unwrap_or("User")
        );
    }
    match &chat.title {
        Some(title) => match &chat.username {
            Some(handle) => format!("Group: {title} (@{handle})"),
            None => format!("Group: {title}"),
        },
        None => format!("Chat ID: {}", chat.id.0),
    }
}

pub fn ticket_description(message: &str, chat: &ChatInfo, sender: &Sender) -> String {
    format!(
        "Message: {message}\nFrom: {} (@{})\n{}",
        sender.full_name.as_deref().unwrap_or("—"),
        sender.username.as_deref().unwrap_or("unknown"),
        chat_info_line(chat, sender)
    )
}

/// Slack mrkdwn alert for a freshly created ticket.
pub fn team_alert(
    category: &str,
    message: &str,
    chat: &ChatInfo,
    sender: &Sender,
    ticket: &CreatedTicket,
) -> String {
    let mut preview: String = message.chars().take(ALERT_PREVIEW_CHARS).collect();
    if message.chars().count() > ALERT_PREVIEW_CHARS {
        preview.push_str("...");
    }
    let user = match &sender.username {
        Some(handle) => format!(
            "{} (<https://t.me/{handle}|@{handle}>)",
            sender.full_name.as_deref().unwrap_or("—")
        ),
        None => sender.full_name.as_deref().unwrap_or("—").to_string(),
    };
    let chat_title = chat.title.as_deref().unwrap_or("Private chat");

    format!(
        "🆕 New request from Telegram\n\n\
         📌 *Category:* {category}\n\
         💬 *Message:* {preview}\n\
         👤 *User:* {user}\n\
         🏢 *Chat:* {chat_title}\n\
         🔗 *Ticket:* <{}|Open in Zendesk>",
        ticket.url
    )
}
