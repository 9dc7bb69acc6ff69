//! Shared application state
//!
//! Holds the configuration, the store database, the chat model, and one
//! prebuilt graph per orchestration pattern. Everything here is immutable
//! after startup, so handlers share it through a plain `Arc`.

use crate::config::Config;
use crate::llm::ChatModel;
use crate::patterns::{command_send, handoff_tools, subagents_as_tools};
use crate::store::StoreDb;
use graph_flow::Graph;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: Arc<StoreDb>,
    pub subagents_graph: Arc<Graph>,
    pub handoff_graph: Arc<Graph>,
    pub router_graph: Arc<Graph>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<StoreDb>, model: Arc<dyn ChatModel>) -> Self {
        let subagents_graph = subagents_as_tools::build_graph(model.clone(), db.clone());
        let handoff_graph = handoff_tools::build_graph(model.clone(), db.clone());
        let router_graph = command_send::build_graph(model, db.clone());

        Self {
            config,
            db,
            subagents_graph,
            handoff_graph,
            router_graph,
        }
    }
}
