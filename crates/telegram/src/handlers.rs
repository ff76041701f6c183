//! Translation of Telegram updates into dispatcher events.

use {
    courier_channels::{ChatId, Command, ControlAction, InboundEvent, MessageId, PhotoVariant},
    courier_sessions::UserId,
    teloxide::{
        prelude::*,
        types::{MediaKind, MessageKind, PhotoSize},
    },
    tracing::{debug, info, warn},
};

/// Turn an incoming message into an event.
///
/// Returns `None` for messages the bot does not handle: service messages,
/// messages without a sender and media other than photos.
pub fn event_from_message(msg: &Message) -> Option<InboundEvent> {
    let chat_id = ChatId(msg.chat.id.0);
    let Some(user_id) = msg.from.as_ref().map(|u| UserId(u.id.0)) else {
        debug!(%chat_id, "ignoring message without sender");
        return None;
    };

    if let Some(text) = msg.text() {
        return Some(match Command::parse(text) {
            Some(command) => InboundEvent::Command {
                user_id,
                chat_id,
                command,
            },
            None => InboundEvent::Text {
                user_id,
                chat_id,
                text: text.to_string(),
            },
        });
    }

    if let Some(sizes) = msg.photo() {
        return Some(InboundEvent::Photo {
            user_id,
            chat_id,
            variants: sizes.iter().map(photo_variant).collect(),
            caption: msg.caption().map(str::to_string),
        });
    }

    match describe_media_kind(msg) {
        Some(kind) => info!(%user_id, %chat_id, kind, "unsupported media, ignoring"),
        None => debug!(%user_id, %chat_id, "ignoring non-content message"),
    }
    None
}

/// Turn a button press into an event. Unknown payloads yield `None`.
pub fn event_from_callback(query: &CallbackQuery) -> Option<InboundEvent> {
    let data = query.data.as_deref()?;
    let Some(action) = ControlAction::from_callback_data(data) else {
        warn!(data, "unknown callback data");
        return None;
    };
    let Some(message) = query.message.as_ref() else {
        debug!(data, "callback query without message, ignoring");
        return None;
    };

    Some(InboundEvent::Control {
        user_id: UserId(query.from.id.0),
        chat_id: ChatId(message.chat().id.0),
        message_id: Some(MessageId(message.id().0)),
        action,
    })
}

/// Answer the query to dismiss the client's loading spinner, then translate it.
pub async fn handle_callback_query(bot: &Bot, query: CallbackQuery) -> Option<InboundEvent> {
    if let Err(e) = bot.answer_callback_query(&query.id).await {
        warn!(error = %e, "failed to answer callback query");
    }
    event_from_callback(&query)
}

fn photo_variant(size: &PhotoSize) -> PhotoVariant {
    PhotoVariant {
        file_id: size.file.id.clone(),
        width: size.width,
        height: size.height,
        file_size: Some(size.file.size).filter(|s| *s > 0),
    }
}

/// Describe a media kind for logging purposes.
fn describe_media_kind(msg: &Message) -> Option<&'static str> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(_) | MediaKind::Photo(_) => None,
            MediaKind::Animation(_) => Some("animation"),
            MediaKind::Audio(_) => Some("audio"),
            MediaKind::Contact(_) => Some("contact"),
            MediaKind::Document(_) => Some("document"),
            MediaKind::Location(_) => Some("location"),
            MediaKind::Poll(_) => Some("poll"),
            MediaKind::Sticker(_) => Some("sticker"),
            MediaKind::Venue(_) => Some("venue"),
            MediaKind::Video(_) => Some("video"),
            MediaKind::VideoNote(_) => Some("video note"),
            MediaKind::Voice(_) => Some("voice"),
            _ => Some("unknown media"),
        },
        _ => None,
    }
}
