//! Handoff pattern
//!
//! The supervisor carries "transfer" tools. Calling one does not produce an
//! answer; it hands the whole conversation to the chosen subagent node, which
//! answers over the full transcript and returns control to the supervisor for
//! a final synthesis turn.

use crate::agents::{InvoiceAgentNode, MusicAgentNode, INVOICE_NODE, MUSIC_NODE};
use crate::llm::types::ToolCall;
use crate::llm::{ChatMessage, ChatModel, ChatRequest, ToolSpec};
use crate::patterns::{
    consume_step, load_messages, save_messages, Command, OUT_OF_STEPS_REPLY, SUPERVISOR_NODE,
};
use crate::store::StoreDb;
use async_trait::async_trait;
use graph_flow::{Context, Graph, GraphBuilder, NextAction, Task, TaskResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const TRANSFER_TO_INVOICE: &str = "transfer-to-invoice-agent";
const TRANSFER_TO_MUSIC: &str = "transfer-to-music-catalog-agent";

const SUPERVISOR_PROMPT: &str = "You are an expert customer support assistant for a digital \
music store, acting as the first point of contact for customers.

You can transfer the conversation to one of two specialists:
1. Use 'transfer-to-invoice-agent' for questions about past purchases, billing \
information, invoice details, or payment history
2. Use 'transfer-to-music-catalog-agent' for questions about songs, albums, artists, \
music recommendations, or catalog availability

When transferring, include a clear reason and any helpful context for the specialist. \
Transfer to at most one specialist per turn.

If a specialist has already answered in this conversation, synthesize their findings \
into a final, friendly reply for the customer instead of transferring again. If the \
question is unrelated to music or invoices, answer it directly.";

#[derive(Deserialize)]
struct TransferArgs {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    context: Option<String>,
}

fn transfer_tool_specs() -> Vec<ToolSpec> {
    let parameters = json!({
        "type": "object",
        "properties": {
            "reason": {
                "type": "string",
                "description": "Why the conversation is being transferred"
            },
            "context": {
                "type": "string",
                "description": "Relevant context for the specialist"
            }
        }
    });

    vec![
        ToolSpec {
            name: TRANSFER_TO_INVOICE.to_string(),
            description: "Transfer the conversation to the invoice information specialist"
                .to_string(),
            parameters: parameters.clone(),
        },
        ToolSpec {
            name: TRANSFER_TO_MUSIC.to_string(),
            description: "Transfer the conversation to the music catalog specialist".to_string(),
            parameters,
        },
    ]
}

/// Resolve one transfer tool call into a routing command
fn execute_transfer(call: &ToolCall) -> Result<Command, graph_flow::GraphError> {
    let (target, default_reason) = match call.name.as_str() {
        TRANSFER_TO_INVOICE => (INVOICE_NODE, "Invoice-related inquiry"),
        TRANSFER_TO_MUSIC => (MUSIC_NODE, "Music catalog inquiry"),
        other => {
            return Err(graph_flow::GraphError::TaskExecutionFailed(format!(
                "Unknown transfer tool: '{}'",
                other
            )))
        }
    };

    let args: TransferArgs = serde_json::from_value(call.arguments.clone()).map_err(|e| {
        graph_flow::GraphError::TaskExecutionFailed(format!(
            "Transfer tool '{}' called with invalid arguments: {}",
            call.name, e
        ))
    })?;

    let reason = args.reason.unwrap_or_else(|| default_reason.to_string());
    let context = args
        .context
        .unwrap_or_else(|| "No additional context provided".to_string());

    let acknowledgement = ChatMessage::tool(
        format!(
            "Successfully transferred to {}. Reason: {}. Context: {}",
            target, reason, context
        ),
        call.id.clone(),
        call.name.clone(),
    );

    Ok(Command {
        goto: target.to_string(),
        update: vec![acknowledgement],
    })
}

/// Supervisor node: transfers via handoff tools or answers itself
struct HandoffSupervisorTask {
    model: Arc<dyn ChatModel>,
}

#[async_trait]
impl Task for HandoffSupervisorTask {
    fn id(&self) -> &str {
        SUPERVISOR_NODE
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let mut messages = load_messages(&context).await;

        if consume_step(&context).await <= 0 {
            messages.push(ChatMessage::assistant(OUT_OF_STEPS_REPLY));
            save_messages(&context, messages).await;
            return Ok(TaskResult::new(
                Some(OUT_OF_STEPS_REPLY.to_string()),
                NextAction::End,
            ));
        }

        let mut request_messages = Vec::with_capacity(messages.len() + 1);
        request_messages.push(ChatMessage::system(SUPERVISOR_PROMPT));
        request_messages.extend(messages.iter().cloned());

        let response = self
            .model
            .complete(ChatRequest {
                messages: request_messages,
                tools: transfer_tool_specs(),
                response_format: None,
            })
            .await
            .map_err(|e| {
                graph_flow::GraphError::TaskExecutionFailed(format!(
                    "Supervisor completion failed: {}",
                    e
                ))
            })?;

        if response.tool_calls.is_empty() {
            let content = response.content.clone();
            messages.push(response);
            save_messages(&context, messages).await;
            tracing::debug!(reply_len = content.len(), "Supervisor answered directly");
            return Ok(TaskResult::new(Some(content), NextAction::End));
        }

        // One destination per turn; every call id still gets an acknowledgement
        let calls = response.tool_calls.clone();
        messages.push(response);

        let mut destination = None;
        for call in &calls {
            let command = execute_transfer(call)?;
            messages.extend(command.update);
            if destination.is_none() {
                destination = Some(command.goto);
            }
        }
        save_messages(&context, messages).await;

        // Checked non-empty above
        let goto = destination.ok_or_else(|| {
            graph_flow::GraphError::TaskExecutionFailed(
                "Transfer produced no destination".to_string(),
            )
        })?;

        tracing::debug!(destination = %goto, "Supervisor handed off conversation");
        Ok(TaskResult::new(None, NextAction::GoTo(goto)))
    }
}

/// Build the handoff graph
pub fn build_graph(model: Arc<dyn ChatModel>, db: Arc<StoreDb>) -> Arc<Graph> {
    let supervisor = Arc::new(HandoffSupervisorTask {
        model: model.clone(),
    });
    let invoice = Arc::new(InvoiceAgentNode::new(model.clone(), db.clone()));
    let music = Arc::new(MusicAgentNode::new(model, db));

    Arc::new(
        GraphBuilder::new("handoff_tools")
            .add_task(supervisor)
            .add_task(invoice)
            .add_task(music)
            .set_start_task(SUPERVISOR_NODE)
            .build(),
    )
}
