//! Case-insensitive name → tool mapping.

use std::collections::HashMap;

use super::{Tool, ToolDescriptor};

/// Maps tool names to their implementations, case-insensitively.
///
/// Stores entries keyed by the lowercased name but retains each tool's
/// original-case name for descriptor listing.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the concrete tool set from §4.3:
    /// ReadFile, ListFiles, SearchText, GitStatus, GitDiff, ApplyPatch, RunCommand.
    pub fn with_default_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(super::ReadFileTool::new()));
        registry.register(Box::new(super::ListFilesTool::new()));
        registry.register(Box::new(super::SearchTextTool::new()));
        registry.register(Box::new(super::GitStatusTool::new()));
        registry.register(Box::new(super::GitDiffTool::new()));
        registry.register(Box::new(super::ApplyPatchTool::new()));
        registry.register(Box::new(super::RunCommandTool::new()));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_lowercase(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(&name.to_lowercase()).map(|t| t.as_ref())
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|t| t.descriptor()).collect()
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
    use crate::tool::{Risk, ToolContext, ToolPolicy};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio_util::sync::CancellationToken;

    struct StubTool;

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            "ReadFile"
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn input_schema(&self) -> Value {
            json!({})
        }
        fn policy(&self) -> ToolPolicy {
            ToolPolicy::read_only()
        }
        async fn execute(
            &self,
            _args: Value,
            _ctx: &ToolContext,
            _cancel: &CancellationToken,
        ) -> Result<crate::message::ToolResult, crate::error::AgentError> {
            Ok(crate::message::ToolResult::success(json!({})))
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut reg = ToolRegistry::new();
        reg.register(Box::new(StubTool));
        assert!(reg.get("readfile").is_some());
        assert!(reg.get("READFILE").is_some());
        assert!(reg.get("ReadFile").is_some());
        assert!(reg.get("unknown").is_none());
    }

    #[test]
    fn descriptors_lists_registered_tools() {
        let mut reg = ToolRegistry::new();
        reg.register(Box::new(StubTool));
        let descs = reg.descriptors();
        assert_eq!(descs.len(), 1);
        assert_eq!(descs[0].name, "ReadFile");
    }

    #[test]
    fn default_tools_registers_the_concrete_set() {
        let reg = ToolRegistry::with_default_tools();
        assert_eq!(reg.len(), 7);
        for name in [
            "ReadFile",
            "ListFiles",
            "SearchText",
            "GitStatus",
            "GitDiff",
            "ApplyPatch",
            "RunCommand",
        ] {
            assert!(reg.get(name).is_some(), "missing {name}");
        }
    }
}
