//! Event dispatch: turns inbound chat events into backend calls, history
//! updates and outbound messages.

pub mod dispatcher;
pub mod error;
pub mod replies;

pub use {
    dispatcher::{DispatchSettings, Dispatcher},
    error::{Error, Result},
};
