//! Invoice information subagent
//!
//! Answers questions about a customer's past purchases and billing using the
//! store database. The customer id comes from shared session state, never
//! from the model.

use crate::agents::react::{run_react, ToolHandler};
use crate::error::AppError;
use crate::llm::{ChatMessage, ChatModel, ToolSpec};
use crate::patterns::{
    input_key, load_messages, save_messages, CUSTOMER_ID_KEY, SUPERVISOR_NODE,
};
use crate::store::StoreDb;
use async_trait::async_trait;
use graph_flow::{Context, NextAction, Task, TaskResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Graph node id of this subagent
pub const INVOICE_NODE: &str = "invoice_information_subagent";

const SYSTEM_PROMPT: &str = "You are an invoice specialist for a digital music store. \
Help the customer with questions about their invoices, billing, and purchase history. \
Use your tools to look up real invoice data; never guess amounts or dates. \
Focus on providing accurate information about invoices, billing, and purchase history.";

/// Invoice subagent: a react loop over invoice lookup tools
pub struct InvoiceAgent {
    model: Arc<dyn ChatModel>,
    db: Arc<StoreDb>,
}

impl InvoiceAgent {
    pub fn new(model: Arc<dyn ChatModel>, db: Arc<StoreDb>) -> Self {
        Self { model, db }
    }

    /// Answer a single focused task (used when wrapped as a supervisor tool)
    pub async fn answer(&self, task: &str, customer_id: Option<i64>) -> Result<String, AppError> {
        self.respond(vec![ChatMessage::user(task)], customer_id).await
    }

    /// Run the react loop over an arbitrary conversation
    pub async fn respond(
        &self,
        conversation: Vec<ChatMessage>,
        customer_id: Option<i64>,
    ) -> Result<String, AppError> {
        let tools = InvoiceTools {
            db: self.db.clone(),
            customer_id,
        };
        run_react(self.model.as_ref(), SYSTEM_PROMPT, conversation, &tools).await
    }
}

struct InvoiceTools {
    db: Arc<StoreDb>,
    customer_id: Option<i64>,
}

#[derive(Deserialize)]
struct LineItemArgs {
    invoice_id: i64,
}

#[async_trait]
impl ToolHandler for InvoiceTools {
    fn specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "get_customer_invoices".to_string(),
                description: "List the customer's invoices with dates and totals, most recent first"
                    .to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            },
            ToolSpec {
                name: "get_invoice_line_items".to_string(),
                description: "List the purchased tracks on one invoice".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "invoice_id": {"type": "integer", "description": "Invoice id"}
                    },
                    "required": ["invoice_id"]
                }),
            },
        ]
    }

    async fn call(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<String, AppError> {
        match name {
            "get_customer_invoices" => {
                let Some(customer_id) = self.customer_id else {
                    return Ok(
                        "No customer id is associated with this conversation, so invoices \
                         cannot be looked up. Ask the customer to sign in."
                            .to_string(),
                    );
                };
                let invoices = self.db.invoices_for_customer(customer_id).await?;
                serde_json::to_string(&invoices)
                    .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
            }
            "get_invoice_line_items" => {
                let args: LineItemArgs =
                    serde_json::from_value(arguments.clone()).map_err(|e| {
                        AppError::TaskExecutionFailed(format!(
                            "get_invoice_line_items called with invalid arguments: {}",
                            e
                        ))
                    })?;
                let items = self.db.invoice_line_items(args.invoice_id).await?;
                serde_json::to_string(&items).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
            }
            other => Err(AppError::TaskExecutionFailed(format!(
                "Invoice agent has no tool named '{}'",
                other
            ))),
        }
    }
}

/// Graph node wrapper for the invoice subagent
///
/// Reads a focused input slot when one was sent, otherwise the full
/// transcript; appends its answer to the transcript and returns control to
/// the supervisor.
pub struct InvoiceAgentNode {
    agent: InvoiceAgent,
}

impl InvoiceAgentNode {
    pub fn new(model: Arc<dyn ChatModel>, db: Arc<StoreDb>) -> Self {
        Self {
            agent: InvoiceAgent::new(model, db),
        }
    }
}

#[async_trait]
impl Task for InvoiceAgentNode {
    fn id(&self) -> &str {
        INVOICE_NODE
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let slot = input_key(INVOICE_NODE);
        let focused = context
            .get::<Vec<ChatMessage>>(&slot)
            .await
            .filter(|messages| !messages.is_empty());

        let conversation = match focused {
            Some(messages) => {
                // Consume the focused input so later visits see the transcript
                context.set(&slot, Vec::<ChatMessage>::new()).await;
                messages
            }
            None => load_messages(&context).await,
        };

        let customer_id = context.get::<i64>(CUSTOMER_ID_KEY).await;

        tracing::debug!(
            node = INVOICE_NODE,
            conversation_len = conversation.len(),
            customer_id = ?customer_id,
            "Running invoice subagent"
        );

        let answer = self
            .agent
            .respond(conversation, customer_id)
            .await
            .map_err(|e| {
                graph_flow::GraphError::TaskExecutionFailed(format!(
                    "Invoice subagent failed: {}",
                    e
                ))
            })?;

        let mut transcript = load_messages(&context).await;
        let mut message = ChatMessage::assistant(answer.clone());
        message.name = Some(INVOICE_NODE.to_string());
        crate::llm::append_messages(&mut transcript, vec![message]);
        save_messages(&context, transcript).await;

        Ok(TaskResult::new(
            Some(answer),
            NextAction::GoTo(SUPERVISOR_NODE.to_string()),
        ))
    }
}
