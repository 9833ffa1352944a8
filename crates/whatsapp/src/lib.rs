//! WhatsApp Cloud API transport: webhook verification and parsing on the
//! way in, sequential text delivery (with multi-part splitting) on the way
//! out.
//!
//! The crate is deliberately thin: it converts between wire payloads and the
//! core message types. Conversation handling lives in `venta-server`'s
//! pipeline, which consumes [`webhook::IncomingText`] and drives an
//! [`client::OutboundMessenger`].

pub mod client;
pub mod webhook;

pub use client::{delivery_parts, CloudApiClient, NoopMessenger, OutboundMessenger};
pub use webhook::{
    normalize_phone, parse_incoming, verify_signature, verify_subscription, IncomingText,
    VerifyParams, WebhookError,
};
