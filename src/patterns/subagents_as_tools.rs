//! Supervisor (tool-calling) pattern with parallel subagents
//!
//! Subagents are wrapped as tools on the supervisor's model. The supervisor
//! decides each turn whether to call tools or answer directly; when it calls
//! several tools at once they execute concurrently, and control returns to
//! the supervisor after all of them finish.

use crate::agents::{InvoiceAgent, MusicCatalogAgent};
use crate::error::AppError;
use crate::llm::{ChatMessage, ChatModel, ChatRequest, ToolSpec};
use crate::patterns::{
    consume_step, load_messages, save_messages, CUSTOMER_ID_KEY, OUT_OF_STEPS_REPLY,
    SUPERVISOR_NODE, TOOL_NODE,
};
use crate::store::StoreDb;
use async_trait::async_trait;
use futures_util::future::try_join_all;
use graph_flow::{Context, Graph, GraphBuilder, NextAction, Task, TaskResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const INVOICE_TOOL: &str = "invoice_agent";
const MUSIC_TOOL: &str = "music_catalog_agent";

const SUPERVISOR_PROMPT: &str = "You are an expert customer support assistant for a digital \
music store. You can handle music catalog or invoice related questions regarding past \
purchases, song or album availabilities. Your primary role is to serve as a \
supervisor/planner for this multi-agent team that helps answer queries from customers.

You have access to two specialist tools that can execute in parallel:
1. invoice_agent: Use this for questions about past purchases, billing information, \
invoice details, or payment history
2. music_catalog_agent: Use this for questions about songs, albums, artists, music \
recommendations, or catalog availability

When using these tools:
- Pass the specific task/question as the 'task' parameter
- Be clear and specific about what you want the specialist to handle
- You can break down complex questions into multiple tool calls if needed
- IMPORTANT: If a question involves both music and invoice aspects, call BOTH tools \
simultaneously - they will execute in parallel for a faster response
- For example, if asked \"What music did I buy last month?\", call both invoice_agent \
and music_catalog_agent at the same time

If a question is unrelated to music or invoices, answer it directly without using the \
specialist tools.";

fn subagent_tool_specs() -> Vec<ToolSpec> {
    let task_parameters = json!({
        "type": "object",
        "properties": {
            "task": {
                "type": "string",
                "description": "The specific task or question for the specialist"
            }
        },
        "required": ["task"]
    });

    vec![
        ToolSpec {
            name: INVOICE_TOOL.to_string(),
            description: "Handle invoice-related queries about past purchases, billing \
                          information, and invoice details"
                .to_string(),
            parameters: task_parameters.clone(),
        },
        ToolSpec {
            name: MUSIC_TOOL.to_string(),
            description: "Handle music catalog queries about songs, albums, artists, and \
                          music recommendations"
                .to_string(),
            parameters: task_parameters,
        },
    ]
}

/// Supervisor node: decides between calling subagent tools and answering
struct SupervisorTask {
    model: Arc<dyn ChatModel>,
}

#[async_trait]
impl Task for SupervisorTask {
    fn id(&self) -> &str {
        SUPERVISOR_NODE
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let mut messages = load_messages(&context).await;

        if consume_step(&context).await <= 0 {
            let reply = ChatMessage::assistant(OUT_OF_STEPS_REPLY);
            messages.push(reply);
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
                tools: subagent_tool_specs(),
                response_format: None,
            })
            .await
            .map_err(|e| {
                graph_flow::GraphError::TaskExecutionFailed(format!(
                    "Supervisor completion failed: {}",
                    e
                ))
            })?;

        let has_tool_calls = !response.tool_calls.is_empty();
        let content = response.content.clone();
        messages.push(response);
        save_messages(&context, messages).await;

        if has_tool_calls {
            tracing::debug!("Supervisor requested subagent tools");
            Ok(TaskResult::new(None, NextAction::GoTo(TOOL_NODE.to_string())))
        } else {
            tracing::debug!(reply_len = content.len(), "Supervisor answered directly");
            Ok(TaskResult::new(Some(content), NextAction::End))
        }
    }
}

#[derive(Deserialize)]
struct SubagentTaskArgs {
    task: String,
}

/// Tool node: executes all pending subagent tool calls concurrently
struct SubagentToolsTask {
    invoice: InvoiceAgent,
    music: MusicCatalogAgent,
}

impl SubagentToolsTask {
    async fn dispatch(
        &self,
        name: String,
        call_id: String,
        arguments: serde_json::Value,
        customer_id: Option<i64>,
    ) -> Result<ChatMessage, AppError> {
        let args: SubagentTaskArgs = serde_json::from_value(arguments).map_err(|e| {
            AppError::TaskExecutionFailed(format!(
                "Subagent tool '{}' called with invalid arguments: {}",
                name, e
            ))
        })?;

        let output = match name.as_str() {
            INVOICE_TOOL => self.invoice.answer(&args.task, customer_id).await?,
            MUSIC_TOOL => self.music.answer(&args.task, customer_id).await?,
            other => {
                return Err(AppError::TaskExecutionFailed(format!(
                    "Unknown subagent tool: '{}'",
                    other
                )))
            }
        };

        Ok(ChatMessage::tool(output, call_id, name))
    }
}

#[async_trait]
impl Task for SubagentToolsTask {
    fn id(&self) -> &str {
        TOOL_NODE
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let mut messages = load_messages(&context).await;
        let customer_id = context.get::<i64>(CUSTOMER_ID_KEY).await;

        let pending = messages
            .last()
            .filter(|m| !m.tool_calls.is_empty())
            .map(|m| m.tool_calls.clone())
            .ok_or_else(|| {
                graph_flow::GraphError::TaskExecutionFailed(
                    "Tool node reached without pending tool calls".to_string(),
                )
            })?;

        tracing::debug!(call_count = pending.len(), "Executing subagent tools in parallel");

        // All calls run concurrently; one failure fails the whole step
        let futures = pending.into_iter().map(|call| {
            self.dispatch(call.name, call.id, call.arguments, customer_id)
        });
        let tool_messages = try_join_all(futures).await.map_err(|e| {
            graph_flow::GraphError::TaskExecutionFailed(format!(
                "Subagent tool execution failed: {}",
                e
            ))
        })?;

        messages.extend(tool_messages);
        save_messages(&context, messages).await;

        Ok(TaskResult::new(
            None,
            NextAction::GoTo(SUPERVISOR_NODE.to_string()),
        ))
    }
}

/// Build the supervisor (tool-calling) graph
pub fn build_graph(model: Arc<dyn ChatModel>, db: Arc<StoreDb>) -> Arc<Graph> {
    let supervisor = Arc::new(SupervisorTask {
        model: model.clone(),
    });
    let tool_node = Arc::new(SubagentToolsTask {
        invoice: InvoiceAgent::new(model.clone(), db.clone()),
        music: MusicCatalogAgent::new(model, db),
    });

    Arc::new(
        GraphBuilder::new("subagents_as_tools")
            .add_task(supervisor)
            .add_task(tool_node)
            .set_start_task(SUPERVISOR_NODE)
            .build(),
    )
}
