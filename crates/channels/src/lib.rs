//! Channel abstractions shared by the gateway and the channel adapters.
//!
//! Tenant bindings, the exchange log, inbound message shape and the
//! outbound/event traits live here so the WhatsApp and Telegram crates do
//! not depend on the gateway.

pub mod error;
pub mod message_log;
pub mod plugin;
pub mod registry;
pub mod store;

pub use {
    error::{Error, Result},
    message_log::{ExchangeLog, ExchangeLogEntry, NewExchange},
    plugin::{
        BindingCredentials, ChannelEvent, ChannelEventSink, ChannelOutbound, ChannelReplyTarget,
        ChannelType, InboundMessage,
    },
    registry::OutboundRegistry,
    store::{BindingStatus, BindingStore, TenantChannelBinding},
};
