//! Conversation workflow engine - analysis pipeline, router dispatch, and
//! stage handlers over pluggable capabilities.
//!
//! One inbound message is one pass through a fixed graph:
//!
//! 1. **Welcome** (`nodes::stages`) - greets on the first user turn
//! 2. **Analysis** (`nodes::analysis`) - intent score, sentiment, structured
//!    data extraction; each falls back to a safe default on failure
//! 3. **Routing** (`venta_core::flows::router`) - pure, first match wins
//! 4. **Branch handler** (`nodes::stages`) - conversation, closing, payment,
//!    follow-up, or handoff; payment and follow-up chain into a summary
//!
//! # Key Types
//!
//! - `SalesWorkflow` - runs a pass to completion; never raises
//! - `Capabilities` - the injected collaborator seams
//! - `LanguageModel` / `KnowledgeBase` / `CrmSync` / `FollowUpScheduler` -
//!   capability traits; production impls live in `venta-server`
//!
//! # Safety Principle
//!
//! The LLM only produces text. Routing, escalation, scheduling, and payment
//! gating are deterministic decisions made from typed state.

pub mod crm;
pub mod engine;
pub mod format;
pub mod llm;
pub mod nodes;
pub mod prompts;
pub mod retrieval;
pub mod schedule;
pub mod testing;

pub use crm::{CrmContact, CrmSync, DisabledCrm};
pub use engine::{Capabilities, PassInput, SalesWorkflow, FALLBACK_REPLY};
pub use llm::{GenerationOptions, IntentCategory, IntentClassification, LanguageModel};
pub use retrieval::{EmptyKnowledgeBase, KnowledgeBase};
pub use schedule::{DisabledScheduler, FollowUpScheduler};
