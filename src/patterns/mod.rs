//! Orchestration patterns
//!
//! Three wirings of the same supervisor/subagent team, each built as its own
//! graph-flow graph:
//!
//! - [`subagents_as_tools`]: the supervisor calls whole subagent runs as
//!   tools, executing simultaneous calls in parallel.
//! - [`handoff_tools`]: transfer tools return routing commands that move
//!   control to subagent nodes.
//! - [`command_send`]: a structured-output router picks the next subagent and
//!   sends it a focused input instead of the full conversation.
//!
//! All three share the same session state layout: a `messages` transcript,
//! an optional `customer_id`, and a `remaining_steps` budget.

pub mod command_send;
pub mod handoff_tools;
pub mod runner;
pub mod subagents_as_tools;

use crate::llm::ChatMessage;
use graph_flow::Context;

/// Context key holding the conversation transcript (`Vec<ChatMessage>`)
pub const MESSAGES_KEY: &str = "messages";
/// Context key holding the customer id (`i64`), when known
pub const CUSTOMER_ID_KEY: &str = "customer_id";
/// Context key holding the remaining supervisor turn budget (`i64`)
pub const REMAINING_STEPS_KEY: &str = "remaining_steps";

/// Node id of the supervisor in every pattern graph
pub const SUPERVISOR_NODE: &str = "supervisor";
/// Node id of the tool-execution node in the tool-calling pattern
pub const TOOL_NODE: &str = "subagent_tools";

/// Context key carrying a focused input for a node (`Vec<ChatMessage>`)
///
/// Follows the `"{id}.{slot}"` key convention used for per-node context data.
pub fn input_key(node: &str) -> String {
    format!("{}.input", node)
}

/// A routing instruction produced by a handoff tool
///
/// `update` is merged into the transcript before navigation, so the handoff
/// itself is visible in the conversation history.
#[derive(Debug, Clone)]
pub struct Command {
    /// Destination node id
    pub goto: String,
    /// Messages to merge into the transcript before navigating
    pub update: Vec<ChatMessage>,
}

/// Load the transcript from the session context
pub async fn load_messages(context: &Context) -> Vec<ChatMessage> {
    context
        .get::<Vec<ChatMessage>>(MESSAGES_KEY)
        .await
        .unwrap_or_default()
}

/// Store the transcript back into the session context
pub async fn save_messages(context: &Context, messages: Vec<ChatMessage>) {
    context.set(MESSAGES_KEY, messages).await;
}

/// Decrement the remaining-steps budget, returning the value before the
/// decrement. Missing budget counts as exhausted.
pub async fn consume_step(context: &Context) -> i64 {
    let remaining = context
        .get::<i64>(REMAINING_STEPS_KEY)
        .await
        .unwrap_or_default();
    context.set(REMAINING_STEPS_KEY, remaining - 1).await;
    remaining
}

/// Final reply used when a supervisor runs out of turn budget
pub const OUT_OF_STEPS_REPLY: &str =
    "I wasn't able to finish working on your request within the allotted number of steps. \
     Could you try rephrasing or narrowing down your question?";
