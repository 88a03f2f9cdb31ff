//! WhatsApp channel: one supervised, persistent session per tenant binding.
//!
//! The actual WhatsApp Web protocol is spoken by an external Baileys sidecar.
//! This crate owns everything around it: the session table, the reconnect
//! state machine, durable encrypted credential blobs and the outbound
//! adapter the message pipeline sends replies through.

pub mod auth_store;
pub mod error;
pub mod manager;
pub mod outbound;
pub mod sidecar;
pub mod transport;
pub mod types;

pub use {
    auth_store::FileSessionStore,
    error::{Result, SessionError},
    manager::{BackoffPolicy, SessionHandle, SessionManager},
    outbound::WhatsAppOutbound,
    sidecar::SidecarConnector,
    transport::{ConnectRequest, Connection, SessionConnector, SessionLink},
    types::{CloseReason, SessionEvent, SessionKey, SessionState},
};
