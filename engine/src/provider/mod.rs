//! The normalized event stream and its concrete provider adapters.

mod anthropic;
mod openai;

pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::message::Message;
use crate::tool::ToolDescriptor;

/// Closed variant set every provider adapter normalizes its wire protocol into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedEvent {
    TextDelta {
        text: String,
    },
    ToolCallStarted {
        call_id: String,
        tool_name: String,
    },
    ToolCallArgsDelta {
        call_id: String,
        fragment: String,
    },
    ToolCallReady {
        call_id: String,
        tool_name: String,
        args_json: String,
    },
    ResponseCompleted {
        stop_reason: String,
        usage: Option<Usage>,
    },
    Trace {
        kind: String,
        raw: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Request handed to a provider adapter to start a turn.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Stop reasons meaning "the assistant finished its turn with no more work".
pub fn is_terminal_stop_reason(reason: &str) -> bool {
    matches!(reason, "end_turn" | "stop")
}

/// A provider's streaming adapter: produces a finite, not-restartable sequence
/// of normalized events for one turn.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn stream(
        &self,
        request: ModelRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, NormalizedEvent>;
}
