//! Router pattern with focused dispatch
//!
//! A structured-output router picks the next subagent and writes it a focused
//! input containing only the context it needs, instead of the full transcript.
//! When the router decides the conversation is done it produces a closing
//! summary for the customer.

use crate::agents::{InvoiceAgentNode, MusicAgentNode, INVOICE_NODE, MUSIC_NODE};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, StructuredFormat};
use crate::patterns::{
    consume_step, input_key, load_messages, save_messages, OUT_OF_STEPS_REPLY, SUPERVISOR_NODE,
};
use crate::store::StoreDb;
use async_trait::async_trait;
use graph_flow::{Context, Graph, GraphBuilder, NextAction, Task, TaskResult};
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const ROUTER_PROMPT: &str = "You are a routing supervisor for a digital music store support \
team. Given the conversation so far, decide the next step:

- Route to 'music_catalog_subagent' for questions about songs, albums, artists, or \
recommendations
- Route to 'invoice_information_subagent' for questions about past purchases, billing, \
or invoices
- Choose 'END' when the specialists have gathered everything needed to answer, or when \
no specialist is required

When routing to a subagent, fill 'context' with a focused description of exactly what \
that subagent should do. Do not pass the whole conversation; distill it. The subagent \
only sees your context, nothing else.";

const SUMMARY_PROMPT: &str = "You are a customer support assistant for a digital music \
store. Write the final reply to the customer based on the conversation so far, \
synthesizing any specialist findings into one clear, friendly answer.";

/// Where the router can send the conversation next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RouteTarget {
    #[serde(rename = "music_catalog_subagent")]
    MusicCatalogSubagent,
    #[serde(rename = "invoice_information_subagent")]
    InvoiceInformationSubagent,
    #[serde(rename = "END")]
    End,
}

/// One structured routing decision
#[derive(Debug, Clone, Deserialize)]
pub struct RouteStep {
    pub subagent: RouteTarget,
    #[serde(default)]
    pub context: String,
}

static ROUTE_SCHEMA: Lazy<serde_json::Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "subagent": {
                "type": "string",
                "enum": [
                    "music_catalog_subagent",
                    "invoice_information_subagent",
                    "END"
                ],
                "description": "The next subagent to run, or END to finish"
            },
            "context": {
                "type": "string",
                "description": "Focused task description for the chosen subagent"
            }
        },
        "required": ["subagent", "context"],
        "additionalProperties": false
    })
});

/// A focused dispatch to one node: the node sees only this input
struct SendTo {
    node: &'static str,
    input: Vec<ChatMessage>,
}

impl SendTo {
    async fn dispatch(self, context: &Context) -> NextAction {
        context.set(&input_key(self.node), self.input).await;
        NextAction::GoTo(self.node.to_string())
    }
}

/// Router node: structured-output routing with focused handoffs
struct RouterSupervisorTask {
    model: Arc<dyn ChatModel>,
}

impl RouterSupervisorTask {
    async fn decide(&self, messages: &[ChatMessage]) -> Result<RouteStep, graph_flow::GraphError> {
        let mut request_messages = Vec::with_capacity(messages.len() + 1);
        request_messages.push(ChatMessage::system(ROUTER_PROMPT));
        request_messages.extend(messages.iter().cloned());

        let response = self
            .model
            .complete(ChatRequest {
                messages: request_messages,
                tools: Vec::new(),
                response_format: Some(StructuredFormat {
                    name: "route_step".to_string(),
                    schema: ROUTE_SCHEMA.clone(),
                }),
            })
            .await
            .map_err(|e| {
                graph_flow::GraphError::TaskExecutionFailed(format!(
                    "Router completion failed: {}",
                    e
                ))
            })?;

        serde_json::from_str(&response.content).map_err(|e| {
            graph_flow::GraphError::TaskExecutionFailed(format!(
                "Router returned an invalid route: {} (content: {})",
                e, response.content
            ))
        })
    }

    async fn summarize(&self, messages: &[ChatMessage]) -> Result<String, graph_flow::GraphError> {
        let mut request_messages = Vec::with_capacity(messages.len() + 1);
        request_messages.push(ChatMessage::system(SUMMARY_PROMPT));
        request_messages.extend(messages.iter().cloned());

        let response = self
            .model
            .complete(ChatRequest {
                messages: request_messages,
                tools: Vec::new(),
                response_format: None,
            })
            .await
            .map_err(|e| {
                graph_flow::GraphError::TaskExecutionFailed(format!(
                    "Summary completion failed: {}",
                    e
                ))
            })?;

        Ok(response.content)
    }
}

#[async_trait]
impl Task for RouterSupervisorTask {
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

        let step = self.decide(&messages).await?;
        tracing::debug!(route = ?step.subagent, "Router decided next step");

        let node = match step.subagent {
            RouteTarget::MusicCatalogSubagent => MUSIC_NODE,
            RouteTarget::InvoiceInformationSubagent => INVOICE_NODE,
            RouteTarget::End => {
                let summary = self.summarize(&messages).await?;
                messages.push(ChatMessage::assistant(&summary));
                save_messages(&context, messages).await;
                return Ok(TaskResult::new(Some(summary), NextAction::End));
            }
        };

        let send = SendTo {
            node,
            input: vec![ChatMessage::user(&step.context)],
        };
        let next = send.dispatch(&context).await;
        Ok(TaskResult::new(None, next))
    }
}

/// Build the router graph
pub fn build_graph(model: Arc<dyn ChatModel>, db: Arc<StoreDb>) -> Arc<Graph> {
    let router = Arc::new(RouterSupervisorTask {
        model: model.clone(),
    });
    let invoice = Arc::new(InvoiceAgentNode::new(model.clone(), db.clone()));
    let music = Arc::new(MusicAgentNode::new(model, db));

    Arc::new(
        GraphBuilder::new("command_send")
            .add_task(router)
            .add_task(invoice)
            .add_task(music)
            .set_start_task(SUPERVISOR_NODE)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::llm::Role;
    use crate::patterns::runner::{run_graph, RunRequest};
    use crate::testutil::{system_prompt, RoutedModel};
    use std::time::Duration;
    use tempfile::tempdir;

    async fn test_db() -> (tempfile::TempDir, Arc<StoreDb>) {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.db");
        let db = Arc::new(StoreDb::new(path.to_str().unwrap()).await.unwrap());
        (dir, db)
    }

    const FOCUSED_TASK: &str = "Find AC/DC albums available in the catalog";

    fn routing_model() -> Arc<RoutedModel> {
        Arc::new(RoutedModel::new(|request| {
            let system = system_prompt(request);
            if system.contains("music catalog specialist") {
                return Ok(ChatMessage::assistant("We have Back in Black by AC/DC."));
            }
            if request.response_format.is_some() {
                // Router: send to the specialist first, then finish
                let specialist_answered = request
                    .messages
                    .iter()
                    .any(|m| m.name.as_deref() == Some(MUSIC_NODE));
                let route = if specialist_answered {
                    serde_json::json!({"subagent": "END", "context": ""})
                } else {
                    serde_json::json!({
                        "subagent": "music_catalog_subagent",
                        "context": FOCUSED_TASK
                    })
                };
                return Ok(ChatMessage::assistant(route.to_string()));
            }
            // Closing summary
            Ok(ChatMessage::assistant(
                "We have Back in Black by AC/DC in the catalog. Enjoy!",
            ))
        }))
    }

    #[tokio::test]
    async fn test_routes_with_focused_context_and_summarizes() {
        let (_dir, db) = test_db().await;
        let model = routing_model();
        let graph = build_graph(model.clone(), db);

        let outcome = run_graph(
            graph,
            SUPERVISOR_NODE,
            RunRequest {
                message: "Do you have anything by AC/DC?".to_string(),
                customer_id: Some(1),
                max_steps: 5,
            },
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome.reply,
            "We have Back in Black by AC/DC in the catalog. Enjoy!"
        );
        assert!(outcome.steps.contains(&MUSIC_NODE.to_string()));

        // The specialist saw only the router's focused context, not the transcript
        let specialist_request = model
            .requests()
            .into_iter()
            .find(|r| system_prompt(r).contains("music catalog specialist"))
            .unwrap();
        let user_messages: Vec<_> = specialist_request
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .collect();
        assert_eq!(user_messages.len(), 1);
        assert_eq!(user_messages[0].content, FOCUSED_TASK);
        assert!(!specialist_request
            .messages
            .iter()
            .any(|m| m.content.contains("Do you have anything by AC/DC?")));
    }

    #[tokio::test]
    async fn test_immediate_end_produces_summary() {
        let (_dir, db) = test_db().await;
        let model = Arc::new(RoutedModel::new(|request| {
            if request.response_format.is_some() {
                return Ok(ChatMessage::assistant(
                    serde_json::json!({"subagent": "END", "context": ""}).to_string(),
                ));
            }
            Ok(ChatMessage::assistant("Happy to help anytime!"))
        }));
        let graph = build_graph(model.clone(), db);

        let outcome = run_graph(
            graph,
            SUPERVISOR_NODE,
            RunRequest {
                message: "Thanks, that's all!".to_string(),
                customer_id: None,
                max_steps: 5,
            },
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(outcome.reply, "Happy to help anytime!");
        // One routing call plus one summary call
        assert_eq!(model.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_route_fails_the_run() {
        let (_dir, db) = test_db().await;
        let model = Arc::new(RoutedModel::new(|_request| {
            Ok(ChatMessage::assistant("not a json route"))
        }));
        let graph = build_graph(model, db);

        let result = run_graph(
            graph,
            SUPERVISOR_NODE,
            RunRequest {
                message: "Do you have anything by AC/DC?".to_string(),
                customer_id: None,
                max_steps: 5,
            },
            Duration::from_secs(5),
        )
        .await;

        match result {
            Err(AppError::TaskExecutionFailed(msg)) => {
                assert!(msg.contains("invalid route"));
            }
            other => panic!("Expected task failure, got: {:?}", other.map(|o| o.reply)),
        }
    }

    #[tokio::test]
    async fn test_route_step_parsing() {
        let step: RouteStep = serde_json::from_str(
            r#"{"subagent": "invoice_information_subagent", "context": "List invoices"}"#,
        )
        .unwrap();
        assert_eq!(step.subagent, RouteTarget::InvoiceInformationSubagent);
        assert_eq!(step.context, "List invoices");

        let done: RouteStep = serde_json::from_str(r#"{"subagent": "END"}"#).unwrap();
        assert_eq!(done.subagent, RouteTarget::End);
        assert!(done.context.is_empty());

        assert!(serde_json::from_str::<RouteStep>(r#"{"subagent": "unknown"}"#).is_err());
    }

    #[tokio::test]
    async fn test_budget_exhaustion() {
        let (_dir, db) = test_db().await;
        let model = routing_model();
        let graph = build_graph(model, db);

        let outcome = run_graph(
            graph,
            SUPERVISOR_NODE,
            RunRequest {
                message: "Do you have anything by AC/DC?".to_string(),
                customer_id: None,
                max_steps: 0,
            },
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(outcome.reply, OUT_OF_STEPS_REPLY);
    }
}
