//! Music catalog subagent
//!
//! Answers questions about artists, albums, and tracks from the store
//! catalog, and can read the customer's saved preferences.

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
pub const MUSIC_NODE: &str = "music_catalog_subagent";

const SYSTEM_PROMPT: &str = "You are a music catalog specialist for a digital music store. \
Help the customer with questions about songs, albums, artists, and recommendations. \
Use your tools to look up real catalog data; only recommend music that exists in the catalog. \
Focus on providing information about songs, albums, artists, and music recommendations \
from our catalog.";

/// Music catalog subagent: a react loop over catalog lookup tools
pub struct MusicCatalogAgent {
    model: Arc<dyn ChatModel>,
    db: Arc<StoreDb>,
}

impl MusicCatalogAgent {
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
        let tools = CatalogTools {
            db: self.db.clone(),
            customer_id,
        };
        run_react(self.model.as_ref(), SYSTEM_PROMPT, conversation, &tools).await
    }
}

struct CatalogTools {
    db: Arc<StoreDb>,
    customer_id: Option<i64>,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Deserialize)]
struct AlbumArgs {
    artist: String,
}

#[async_trait]
impl ToolHandler for CatalogTools {
    fn specs(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec {
                name: "search_tracks".to_string(),
                description: "Search tracks by track name, album title, or artist name"
                    .to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Search term"}
                    },
                    "required": ["query"]
                }),
            },
            ToolSpec {
                name: "get_albums_by_artist".to_string(),
                description: "List all albums by an artist".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "artist": {"type": "string", "description": "Artist name"}
                    },
                    "required": ["artist"]
                }),
            },
            ToolSpec {
                name: "get_customer_preferences".to_string(),
                description: "Read the customer's saved music preferences".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            },
        ]
    }

    async fn call(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<String, AppError> {
        match name {
            "search_tracks" => {
                let args: SearchArgs = serde_json::from_value(arguments.clone()).map_err(|e| {
                    AppError::TaskExecutionFailed(format!(
                        "search_tracks called with invalid arguments: {}",
                        e
                    ))
                })?;
                let hits = self.db.search_tracks(&args.query).await?;
                serde_json::to_string(&hits).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
            }
            "get_albums_by_artist" => {
                let args: AlbumArgs = serde_json::from_value(arguments.clone()).map_err(|e| {
                    AppError::TaskExecutionFailed(format!(
                        "get_albums_by_artist called with invalid arguments: {}",
                        e
                    ))
                })?;
                let albums = self.db.albums_by_artist(&args.artist).await?;
                serde_json::to_string(&albums).map_err(|e| AppError::Internal(anyhow::anyhow!(e)))
            }
            "get_customer_preferences" => {
                let Some(customer_id) = self.customer_id else {
                    return Ok("No customer id is associated with this conversation, so no \
                               saved preferences are available."
                        .to_string());
                };
                match self.db.customer_preferences(customer_id).await? {
                    Some(preferences) => Ok(format!("Saved preferences: {}", preferences)),
                    None => Ok("The customer has no saved music preferences.".to_string()),
                }
            }
            other => Err(AppError::TaskExecutionFailed(format!(
                "Music catalog agent has no tool named '{}'",
                other
            ))),
        }
    }
}

/// Graph node wrapper for the music catalog subagent
pub struct MusicAgentNode {
    agent: MusicCatalogAgent,
}

impl MusicAgentNode {
    pub fn new(model: Arc<dyn ChatModel>, db: Arc<StoreDb>) -> Self {
        Self {
            agent: MusicCatalogAgent::new(model, db),
        }
    }
}

#[async_trait]
impl Task for MusicAgentNode {
    fn id(&self) -> &str {
        MUSIC_NODE
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let slot = input_key(MUSIC_NODE);
        let focused = context
            .get::<Vec<ChatMessage>>(&slot)
            .await
            .filter(|messages| !messages.is_empty());

        let conversation = match focused {
            Some(messages) => {
                context.set(&slot, Vec::<ChatMessage>::new()).await;
                messages
            }
            None => load_messages(&context).await,
        };

        let customer_id = context.get::<i64>(CUSTOMER_ID_KEY).await;

        tracing::debug!(
            node = MUSIC_NODE,
            conversation_len = conversation.len(),
            customer_id = ?customer_id,
            "Running music catalog subagent"
        );

        let answer = self
            .agent
            .respond(conversation, customer_id)
            .await
            .map_err(|e| {
                graph_flow::GraphError::TaskExecutionFailed(format!(
                    "Music catalog subagent failed: {}",
                    e
                ))
            })?;

        let mut transcript = load_messages(&context).await;
        let mut message = ChatMessage::assistant(answer.clone());
        message.name = Some(MUSIC_NODE.to_string());
        crate::llm::append_messages(&mut transcript, vec![message]);
        save_messages(&context, transcript).await;

        Ok(TaskResult::new(
            Some(answer),
            NextAction::GoTo(SUPERVISOR_NODE.to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ToolCall;
    use crate::testutil::ScriptedModel;
    use tempfile::tempdir;

    async fn test_db() -> (tempfile::TempDir, Arc<StoreDb>) {
        let dir = tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.db");
        let db = StoreDb::new(path.to_str().unwrap()).await.unwrap();
        (dir, Arc::new(db))
    }

    #[tokio::test]
    async fn test_music_agent_searches_catalog() {
        let (_dir, db) = test_db().await;
        let model = Arc::new(ScriptedModel::new(vec![
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "search_tracks".to_string(),
                    arguments: serde_json::json!({"query": "Nirvana"}),
                }],
            ),
            ChatMessage::assistant("We have two Nirvana tracks from Nevermind."),
        ]));

        let agent = MusicCatalogAgent::new(model.clone(), db);
        let answer = agent.answer("Got any Nirvana?", None).await.unwrap();

        assert_eq!(answer, "We have two Nirvana tracks from Nevermind.");
        let tool_output = model
            .request(1)
            .messages
            .iter()
            .find(|m| m.role == crate::llm::Role::Tool)
            .unwrap()
            .content
            .clone();
        assert!(tool_output.contains("Smells Like Teen Spirit"));
    }

    #[tokio::test]
    async fn test_catalog_tools_preferences() {
        let (_dir, db) = test_db().await;

        let with_customer = CatalogTools {
            db: db.clone(),
            customer_id: Some(1),
        };
        let output = with_customer
            .call("get_customer_preferences", &serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(output, "Saved preferences: Rock,Jazz");

        let without_customer = CatalogTools {
            db,
            customer_id: None,
        };
        let output = without_customer
            .call("get_customer_preferences", &serde_json::json!({}))
            .await
            .unwrap();
        assert!(output.contains("No customer id"));
    }

    #[tokio::test]
    async fn test_catalog_tools_albums() {
        let (_dir, db) = test_db().await;
        let tools = CatalogTools {
            db,
            customer_id: None,
        };

        let output = tools
            .call("get_albums_by_artist", &serde_json::json!({"artist": "Daft"}))
            .await
            .unwrap();
        assert!(output.contains("Discovery"));

        let err = tools
            .call("get_albums_by_artist", &serde_json::json!({"name": "Daft"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid arguments"));
    }
}
