//! Telegram transport for courier.
//!
//! Long-polls the Bot API with teloxide, turns updates into
//! [`courier_channels::InboundEvent`]s for the dispatcher, and implements the
//! outbound and media traits on top of the same `Bot`.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod outbound;

pub use {
    bot::{Polling, build_bot, start_polling},
    error::{Error, Result},
    outbound::TelegramOutbound,
};
