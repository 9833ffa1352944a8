//! Core domain for the venta sales assistant: conversation state, the
//! routing policy, tenant bot profiles, and application configuration.
//!
//! Everything here is pure data and pure functions. The engine that threads
//! state through LLM-backed nodes lives in `venta-agent`; persistence and
//! transports live in their own crates and depend on this one.

pub mod config;
pub mod domain;
pub mod flows;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::{BotProfile, ChatMessage, Contact, MessageRole, PART_SEPARATOR};
pub use flows::{
    route, Branch, CollectedData, ConversationMode, ConversationState, DurableState, Sentiment,
    Stage, StatePatch,
};
