//! Telegram update handlers.
//!
//! Converts teloxide messages into the relay's inbound model and hands them to
//! the intake pipeline. Non-text messages are dropped here.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Chat, MessageEntity, MessageEntityKind},
};
use tracing::debug;

use relay_core::{
    domain::{ChatId, MessageId, UserId},
    messaging::types::{ChatInfo, ChatKind, InboundMessage, MentionSpan, Sender},
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(inbound) = to_inbound(&msg) else {
        return Ok(());
    };
    let outcome = state.intake.handle(inbound).await;
    debug!(chat_id = msg.chat.id.0, ?outcome, "message handled");
    Ok(())
}

/// Text messages with a known sender; everything else yields `None`.
pub fn to_inbound(msg: &Message) -> Option<InboundMessage> {
    let text = msg.text()?;
    let user = msg.from()?;

    let full_name = user.full_name();
    Some(InboundMessage {
        chat: chat_info(&msg.chat),
        sender: Sender {
            id: UserId(user.id.0 as i64),
            full_name: (!full_name.trim().is_empty()).then_some(full_name),
            username: user.username.clone(),
        },
        message_id: MessageId(msg.id.0),
        text: text.to_string(),
        mentions: msg.entities().map(mention_spans).unwrap_or_default(),
    })
}

fn chat_info(chat: &Chat) -> ChatInfo {
    let kind = if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_group() {
        ChatKind::Group
    } else {
        ChatKind::Channel
    };
    ChatInfo {
        id: ChatId(chat.id.0),
        kind,
        title: chat.title().map(str::to_string),
        username: chat.username().map(str::to_string),
    }
}

/// `@username` mentions only; text mentions carry no handle to match.
pub fn mention_spans(entities: &[MessageEntity]) -> Vec<MentionSpan> {
    entities
        .iter()
        .filter(|e| matches!(e.kind, MessageEntityKind::Mention))
        .map(|e| MentionSpan {
            offset: e.offset,
            length: e.length,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(value: serde_json::Value) -> Message {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn supergroup_text_message_converts() {
        let msg = message(serde_json::json!({
            "message_id": 42,
            "date": 1700000000,
            "chat": { "id": -100123, "type": "supergroup", "title": "Ops", "username": "ops_chat" },
            "from": { "id": 7, "is_bot": false, "first_name": "Ann", "last_name": "Lee", "username": "ann" },
            "text": "@support_bot cannot login",
            "entities": [
                { "type": "mention", "offset": 0, "length": 12 },
                { "type": "bold", "offset": 13, "length": 6 },
                {
                    "type": "text_mention", "offset": 20, "length": 5,
                    "user": { "id": 9, "is_bot": false, "first_name": "Bob" }
                }
            ]
        }));

        let inbound = to_inbound(&msg).unwrap();
        assert_eq!(inbound.chat.id, ChatId(-100123));
        assert_eq!(inbound.chat.kind, ChatKind::Supergroup);
        assert_eq!(inbound.chat.title.as_deref(), Some("Ops"));
        assert_eq!(inbound.chat.username.as_deref(), Some("ops_chat"));
        assert_eq!(inbound.sender.id, UserId(7));
        assert_eq!(inbound.sender.full_name.as_deref(), Some("Ann Lee"));
        assert_eq!(inbound.sender.username.as_deref(), Some("ann"));
        assert_eq!(inbound.message_id, MessageId(42));
        assert_eq!(
            inbound.mentions,
            vec![MentionSpan {
                offset: 0,
                length: 12
            }]
        );
        assert_eq!(inbound.mentions[0].slice(&inbound.text), Some("@support_bot"));
    }

    #[test]
    fn private_chat_and_missing_entities() {
        let msg = message(serde_json::json!({
            "message_id": 1,
            "date": 1700000000,
            "chat": { "id": 7, "type": "private", "first_name": "Ann" },
            "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
            "text": "hello"
        }));

        let inbound = to_inbound(&msg).unwrap();
        assert_eq!(inbound.chat.kind, ChatKind::Private);
        assert!(inbound.mentions.is_empty());
        assert_eq!(inbound.sender.full_name.as_deref(), Some("Ann"));
    }

    #[test]
    fn non_text_messages_are_skipped() {
        let msg = message(serde_json::json!({
            "message_id": 2,
            "date": 1700000000,
            "chat": { "id": -5, "type": "group", "title": "Team" },
            "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
            "location": { "longitude": 30.3, "latitude": 59.9 }
        }));
        assert!(to_inbound(&msg).is_none());
    }
}
