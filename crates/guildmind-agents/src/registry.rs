use std::collections::HashMap;
use std::sync::Arc;

use guildmind_common::{Error, Result};
use tracing::info;

use crate::providers::ToolDefinition;
use crate::tools::Tool;

/// Immutable-after-startup registry of the tools advertised to the model.
///
/// Built once at process start from the static toolset, then shared by `Arc`
/// with the executor and orchestrator. Registering two tools under the same
/// name is rejected rather than silently shadowing the first.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name();
        if self.tools.contains_key(name) {
            return Err(Error::DuplicateTool(name.to_string()));
        }
        info!("registered tool: {name}");
        self.tools.insert(name.to_string(), tool);
        Ok(())
    }

    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<Self> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    /// Handler lookup by name. Absence is a normal outcome, not an error.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Declarations of every registered tool. Order is unspecified.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TurnContext;
    use crate::tools::ToolOutput;
    use async_trait::async_trait;
    use serde_json::json;

    struct PingTool;

    #[async_trait]
    impl Tool for PingTool {
        fn name(&self) -> &'static str {
            "ping"
        }

        fn description(&self) -> &'static str {
            "Reply with pong"
        }

        fn input_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {}, "required": []})
        }

        async fn execute(
            &self,
            _ctx: &TurnContext,
            _args: serde_json::Value,
        ) -> guildmind_common::Result<ToolOutput> {
            Ok(ToolOutput::text("pong"))
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(PingTool)).unwrap();

        let err = registry.register(Arc::new(PingTool)).unwrap_err();
        assert!(matches!(err, Error::DuplicateTool(name) if name == "ping"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn lookup_miss_is_none() {
        let registry = ToolRegistry::from_tools([Arc::new(PingTool) as Arc<dyn Tool>]).unwrap();
        assert!(registry.get("ping").is_some());
        assert!(registry.get("pong").is_none());
    }

    #[test]
    fn provider_formats_round_trip_every_tool() {
        let registry = ToolRegistry::from_tools([Arc::new(PingTool) as Arc<dyn Tool>]).unwrap();

        for def in registry.definitions() {
            let openai = def.to_openai();
            assert_eq!(openai["function"]["name"], def.name.as_str());
            assert_eq!(openai["function"]["description"], def.description.as_str());
            assert_eq!(openai["function"]["parameters"], def.input_schema);

            let anthropic = def.to_anthropic();
            assert_eq!(anthropic["name"], def.name.as_str());
            assert_eq!(anthropic["description"], def.description.as_str());
            assert_eq!(anthropic["input_schema"], def.input_schema);
        }
    }
}
