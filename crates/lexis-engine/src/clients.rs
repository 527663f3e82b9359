// crates/lexis-engine/src/clients.rs

use std::collections::HashMap;
use std::sync::Arc;

use lexis_core::ToolClient;

/// Fetch tool name -> transport client.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Arc<dyn ToolClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Into<String>, client: Arc<dyn ToolClient>) {
        self.clients.insert(tool.into(), client);
    }

    /// Builder-style `register`.
    pub fn with(mut self, tool: impl Into<String>, client: Arc<dyn ToolClient>) -> Self {
        self.register(tool, client);
        self
    }

    pub fn get(&self, tool: &str) -> Option<Arc<dyn ToolClient>> {
        self.clients.get(tool).cloned()
    }

    /// Registered tool names, sorted.
    pub fn tools(&self) -> Vec<&str> {
        let mut tools: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        tools.sort();
        tools
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries: Vec<(&str, &str)> = self
            .tools()
            .into_iter()
            .filter_map(|t| self.clients.get(t).map(|c| (t, c.name())))
            .collect();
        f.debug_struct("ClientRegistry").field("clients", &entries).finish()
    }
}
