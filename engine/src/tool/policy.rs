//! Static + argument-inspecting decision of {allowed, requires-approval, denied}.

use serde_json::Value;

use super::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    RequiresApproval,
    Denied,
}

const RUN_COMMAND_DENYLIST: &[&str] = &[
    "rm", "del", "rmdir", "format", "curl", "wget", "ssh", "powershell", "cmd", "bash", "sh",
];

/// Evaluates whether a tool call may proceed without interactive approval.
pub struct PolicyEngine {
    auto_approve: bool,
}

impl PolicyEngine {
    pub fn new(auto_approve: bool) -> Self {
        Self { auto_approve }
    }

    pub fn evaluate(&self, tool: &dyn Tool, args_json: &str) -> PolicyDecision {
        if self.auto_approve {
            return PolicyDecision::Allowed;
        }

        let policy = tool.policy();
        if policy.requires_approval {
            return PolicyDecision::RequiresApproval;
        }

        if tool.name().eq_ignore_ascii_case("RunCommand") {
            let parsed: Result<Value, _> = serde_json::from_str(args_json);
            let exe = match parsed {
                Ok(v) => v
                    .get("exe")
                    .and_then(|e| e.as_str())
                    .map(|s| s.to_lowercase()),
                Err(_) => return PolicyDecision::RequiresApproval,
            };
            if let Some(exe) = exe {
                if RUN_COMMAND_DENYLIST.iter().any(|frag| exe.contains(frag)) {
                    return PolicyDecision::RequiresApproval;
                }
            } else {
                return PolicyDecision::RequiresApproval;
            }
        }

        PolicyDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::run_command::RunCommandTool;
    use crate::tool::read_file::ReadFileTool;

    #[test]
    fn auto_approve_always_allows() {
        let engine = PolicyEngine::new(true);
        let tool = RunCommandTool::new();
        let decision = engine.evaluate(&tool, r#"{"exe":"rm","args":[]}"#);
        assert_eq!(decision, PolicyDecision::Allowed);
    }

    #[test]
    fn run_command_requires_approval_by_static_policy() {
        let engine = PolicyEngine::new(false);
        let tool = RunCommandTool::new();
        let decision = engine.evaluate(&tool, r#"{"exe":"ls","args":[]}"#);
        assert_eq!(decision, PolicyDecision::RequiresApproval);
    }

    #[test]
    fn read_only_tool_is_allowed() {
        let engine = PolicyEngine::new(false);
        let tool = ReadFileTool::new();
        let decision = engine.evaluate(&tool, r#"{"path":"a.txt"}"#);
        assert_eq!(decision, PolicyDecision::Allowed);
    }
}
