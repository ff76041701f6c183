//! Chat-platform plumbing shared by the dispatcher and the transports.
//!
//! Inbound events are a closed enum parsed at the transport boundary; outbound
//! delivery goes through the [`ChannelOutbound`] and [`ChannelMedia`] traits so
//! the dispatcher never touches a platform SDK directly. [`chunk`] splits long
//! replies to the platform's message size.

pub mod chunk;
pub mod error;
pub mod event;
pub mod plugin;

pub use {
    chunk::{OutboundMessage, TELEGRAM_MAX_MESSAGE_LEN},
    error::{Error, Result},
    event::{
        ChatId, Command, ControlAction, InboundEvent, MessageId, PhotoVariant, largest_variant,
    },
    plugin::{ChannelMedia, ChannelOutbound, MenuButton},
};
