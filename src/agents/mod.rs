//! Specialist subagents
//!
//! Each subagent is a focused tool-calling loop over the store database,
//! plus a graph node wrapper so it can serve as a handoff destination.

pub mod invoice;
pub mod music;
pub mod react;

pub use invoice::{InvoiceAgent, InvoiceAgentNode, INVOICE_NODE};
pub use music::{MusicAgentNode, MusicCatalogAgent, MUSIC_NODE};
