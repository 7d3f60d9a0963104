//! Role-scoped chat agents.
//!
//! A chat turn picks at most one tool by keyword, runs it through the regular
//! services with the caller's [`Scope`], and hands the JSON result to the
//! chat-completion provider as context.

pub mod llm;
pub mod persona;
pub mod tools;

pub use llm::{ChatCompletionProvider, ChatMessage, ChatRole, OpenAiClient, OpenAiConfig};
pub use persona::Persona;
pub use tools::{select_tool, AgentTool, ToolCall, ToolExecutor};

use crate::{auth::AuthUser, config::AppConfig, errors::ServiceError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use utoipa::ToSchema;

pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AgentReply {
    pub reply: String,
    pub persona: Persona,
    pub tool: Option<AgentTool>,
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolInfo {
    pub name: AgentTool,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ToolListing {
    pub persona: Persona,
    pub tools: Vec<ToolInfo>,
}

/// Builds the provider from config; `None` when no API key is set.
pub fn provider_from_config(
    config: &AppConfig,
) -> Result<Option<Arc<dyn ChatCompletionProvider>>, ServiceError> {
    let Some(api_key) = config.openai_api_key() else {
        return Ok(None);
    };
    let client = OpenAiClient::new(OpenAiConfig {
        api_key: api_key.to_string(),
        base_url: config.openai_base_url.clone(),
        model: config.openai_model.clone(),
        temperature: config.openai_temperature,
        timeout: Duration::from_secs(config.openai_timeout_secs),
    })?;
    Ok(Some(Arc::new(client)))
}

#[derive(Clone)]
pub struct AgentService {
    provider: Option<Arc<dyn ChatCompletionProvider>>,
    tools: ToolExecutor,
    history_limit: usize,
}

impl AgentService {
    pub fn new(
        provider: Option<Arc<dyn ChatCompletionProvider>>,
        tools: ToolExecutor,
        history_limit: usize,
    ) -> Self {
        Self {
            provider,
            tools,
            history_limit,
        }
    }

    pub fn list_tools(&self, persona: Persona) -> ToolListing {
        ToolListing {
            persona,
            tools: persona
                .tools()
                .iter()
                .map(|tool| ToolInfo {
                    name: *tool,
                    description: tool.description().to_string(),
                })
                .collect(),
        }
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.user_id, persona = %persona))]
    pub async fn chat(
        &self,
        user: &AuthUser,
        persona: Persona,
        request: ChatRequest,
    ) -> Result<AgentReply, ServiceError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(ServiceError::ValidationError("message must not be empty".into()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ServiceError::ValidationError(format!(
                "message must be at most {} characters",
                MAX_MESSAGE_CHARS
            )));
        }
        let history = self.trim_history(request.history)?;

        let provider = self.provider.as_ref().ok_or_else(|| {
            ServiceError::ServiceUnavailable("agents are not configured".into())
        })?;

        let scope = user.scope()?;
        let call = select_tool(persona, message);
        let data = match call {
            Some(call) => Some(self.tools.execute(scope, call).await?),
            None => None,
        };

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(ChatMessage::system(persona.system_prompt()));
        messages.extend(history);
        if let (Some(call), Some(data)) = (call, data.as_ref()) {
            messages.push(ChatMessage::system(format!(
                "Result of tool `{}` (JSON):\n{}",
                call.tool(),
                data
            )));
        }
        messages.push(ChatMessage::user(message));

        let reply = provider.complete(messages).await?;
        info!(tool = ?call.map(|c| c.tool()), "agent replied");

        Ok(AgentReply {
            reply,
            persona,
            tool: call.map(|c| c.tool()),
            data,
        })
    }

    /// Keeps the most recent turns; only user and assistant turns are accepted.
    fn trim_history(&self, history: Vec<ChatTurn>) -> Result<Vec<ChatMessage>, ServiceError> {
        if let Some(turn) = history
            .iter()
            .find(|t| !matches!(t.role, ChatRole::User | ChatRole::Assistant))
        {
            return Err(ServiceError::ValidationError(format!(
                "history turns must be user or assistant, got {:?}",
                turn.role
            )));
        }
        let skip = history.len().saturating_sub(self.history_limit);
        Ok(history
            .into_iter()
            .skip(skip)
            .map(|t| ChatMessage {
                role: t.role,
                content: t.content,
            })
            .collect())
    }
}
