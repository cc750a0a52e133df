use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use serde_json::Value;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::chat::{
        ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionTool, ChatCompletionTools, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
        FinishReason as OpenAiFinishReason, FunctionCall, FunctionObject,
    },
    Client,
};

use crate::config::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::domains::message::ToolCall;
use crate::error::{ReminderBotError, Result};
use crate::interfaces::providers::{Completion, FinishReason, LlmProvider, PromptEntry};
use crate::providers::retry::RetryPolicy;

/// Chat-completions client for OpenAI-compatible endpoints (DeepSeek by
/// default).
#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    client: Client<OpenAIConfig>,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        // RetryPolicy owns retries; the client's own backoff gives up after
        // the first failure.
        let no_backoff = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            model,
            client: Client::with_config(config).with_backoff(no_backoff),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(
        &self,
        entries: &[PromptEntry],
        tools: &[Value],
    ) -> Result<CreateChatCompletionRequest> {
        let messages = entries
            .iter()
            .map(Self::build_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(messages);

        let tools = Self::convert_tools(tools);
        if !tools.is_empty() {
            builder.tools(tools);
        }

        builder
            .build()
            .map_err(|e| ReminderBotError::Runtime(e.to_string()))
    }

    fn build_message(entry: &PromptEntry) -> Result<ChatCompletionRequestMessage> {
        match entry {
            PromptEntry::System { content } => Self::build_system_message(content),
            PromptEntry::User { content } => Self::build_user_message(content),
            PromptEntry::Assistant {
                content,
                tool_calls,
            } => Self::build_assistant_message(content.as_deref(), tool_calls),
            PromptEntry::Tool {
                content,
                tool_call_id,
            } => Self::build_tool_message(content, tool_call_id),
        }
    }

    fn build_system_message(content: &str) -> Result<ChatCompletionRequestMessage> {
        let message = ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::System(message))
    }

    fn build_user_message(content: &str) -> Result<ChatCompletionRequestMessage> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                content.to_string(),
            ))
            .build()
            .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::User(message))
    }

    fn build_assistant_message(
        content: Option<&str>,
        tool_calls: &[ToolCall],
    ) -> Result<ChatCompletionRequestMessage> {
        let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
        if let Some(content) = content {
            builder.content(content);
        }
        if !tool_calls.is_empty() {
            let calls = tool_calls
                .iter()
                .map(|call| {
                    ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                        id: call.id.clone(),
                        function: FunctionCall {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                })
                .collect::<Vec<_>>();
            builder.tool_calls(calls);
        }
        let message = builder
            .build()
            .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::Assistant(message))
    }

    fn build_tool_message(content: &str, tool_call_id: &str) -> Result<ChatCompletionRequestMessage> {
        let message = ChatCompletionRequestToolMessageArgs::default()
            .content(content)
            .tool_call_id(tool_call_id)
            .build()
            .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
        Ok(ChatCompletionRequestMessage::Tool(message))
    }

    fn convert_tools(tools: &[Value]) -> Vec<ChatCompletionTools> {
        tools
            .iter()
            .filter_map(|tool| {
                let tool_type = tool
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("function");
                if tool_type != "function" {
                    return None;
                }
                let function_obj = tool.get("function").unwrap_or(tool);
                let name = function_obj.get("name")?.as_str()?.to_string();
                let description = function_obj
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string());
                let parameters = function_obj.get("parameters").cloned();
                let function = FunctionObject {
                    name,
                    description,
                    parameters,
                    strict: None,
                };
                Some(ChatCompletionTools::Function(ChatCompletionTool {
                    function,
                }))
            })
            .collect()
    }

    fn extract_completion(response: &CreateChatCompletionResponse) -> Result<Completion> {
        let choice = response
            .choices
            .first()
            .ok_or_else(|| ReminderBotError::Runtime("No choices returned".to_string()))?;
        let message = &choice.message;

        let tool_calls = message
            .tool_calls
            .iter()
            .flatten()
            .filter_map(|call| match call {
                ChatCompletionMessageToolCalls::Function(function_call) => Some(ToolCall {
                    id: function_call.id.clone(),
                    name: function_call.function.name.clone(),
                    arguments: function_call.function.arguments.clone(),
                }),
                ChatCompletionMessageToolCalls::Custom(_) => {
                    tracing::debug!("ignoring custom tool call");
                    None
                }
            })
            .collect();

        Ok(Completion {
            finish_reason: Self::finish_reason(choice.finish_reason.as_ref()),
            content: message.content.clone(),
            tool_calls,
        })
    }

    fn finish_reason(reason: Option<&OpenAiFinishReason>) -> FinishReason {
        match reason {
            Some(OpenAiFinishReason::Stop) => FinishReason::Stop,
            Some(OpenAiFinishReason::Length) => FinishReason::Length,
            Some(OpenAiFinishReason::ToolCalls) => FinishReason::ToolCalls,
            Some(OpenAiFinishReason::ContentFilter) => FinishReason::ContentFilter,
            Some(OpenAiFinishReason::FunctionCall) => FinishReason::FunctionCall,
            None => FinishReason::Other,
        }
    }
}

fn map_openai_error(err: OpenAIError) -> ReminderBotError {
    match err {
        OpenAIError::Reqwest(e) if e.is_timeout() => ReminderBotError::Timeout(e.to_string()),
        OpenAIError::Reqwest(e) if e.is_connect() || e.is_request() || e.is_body() => {
            ReminderBotError::Unavailable(format!("request failed: {e}"))
        }
        OpenAIError::Reqwest(e) => ReminderBotError::Http(format!("request failed: {e}")),
        OpenAIError::ApiError(api_error) if is_transient_api_error(&api_error) => {
            ReminderBotError::Unavailable(api_error.to_string())
        }
        OpenAIError::ApiError(api_error) => ReminderBotError::Http(api_error.to_string()),
        OpenAIError::InvalidArgument(message) => ReminderBotError::Runtime(message),
        other => ReminderBotError::Http(other.to_string()),
    }
}

/// 5xx responses reach us as an `ApiError` with no type, code or param, since
/// their bodies are not parsed. Rate limits and overloads are tagged in the
/// type or code.
fn is_transient_api_error(api_error: &ApiError) -> bool {
    let tags = [api_error.r#type.as_deref(), api_error.code.as_deref()];
    if tags.iter().flatten().any(|tag| *tag == "insufficient_quota") {
        return false;
    }
    if tags.iter().all(Option::is_none) && api_error.param.is_none() {
        return true;
    }
    tags.iter().flatten().any(|tag| {
        let tag = tag.to_ascii_lowercase();
        ["rate_limit", "server_error", "overloaded", "timeout", "unavailable"]
            .iter()
            .any(|pattern| tag.contains(pattern))
    })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, entries: &[PromptEntry], tools: &[Value]) -> Result<Completion> {
        let request = self.build_request(entries, tools)?;
        tracing::debug!(
            model = %self.model,
            entries = entries.len(),
            tools = tools.len(),
            "sending chat completion"
        );

        let client = &self.client;
        let response = self
            .retry
            .run("chat_completion", || {
                let request = request.clone();
                async move {
                    client
                        .chat()
                        .create(request)
                        .await
                        .map_err(map_openai_error)
                }
            })
            .await?;

        let completion = Self::extract_completion(&response)?;
        tracing::debug!(
            finish_reason = ?completion.finish_reason,
            tool_calls = completion.tool_calls.len(),
            "chat completion received"
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api_error(r#type: Option<&str>, code: Option<&str>) -> ApiError {
        ApiError {
            message: "boom".to_string(),
            r#type: r#type.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        }
    }

    #[test]
    fn classifies_api_errors_before_flattening() {
        let server_error = map_openai_error(OpenAIError::ApiError(api_error(None, None)));
        assert!(matches!(server_error, ReminderBotError::Unavailable(_)));

        let rate_limited = map_openai_error(OpenAIError::ApiError(api_error(
            Some("requests"),
            Some("rate_limit_exceeded"),
        )));
        assert!(rate_limited.is_transient());

        let quota = map_openai_error(OpenAIError::ApiError(api_error(
            Some("insufficient_quota"),
            Some("rate_limit_exceeded"),
        )));
        assert!(matches!(quota, ReminderBotError::Http(_)));

        let invalid = map_openai_error(OpenAIError::ApiError(api_error(
            Some("invalid_request_error"),
            None,
        )));
        assert!(!invalid.is_transient());

        let bad_args = map_openai_error(OpenAIError::InvalidArgument("x".to_string()));
        assert!(matches!(bad_args, ReminderBotError::Runtime(_)));
    }

    #[test]
    fn converts_nested_and_flat_tool_specs() {
        let tools = OpenAiProvider::convert_tools(&[
            json!({"type": "function", "function": {"name": "a", "parameters": {}}}),
            json!({"name": "b", "description": "flat"}),
            json!({"type": "custom", "name": "c"}),
            json!({"type": "function", "function": {"description": "nameless"}}),
        ]);
        assert_eq!(tools.len(), 2);
    }

    #[test]
    fn maps_every_entry_variant() {
        let entries = vec![
            PromptEntry::System {
                content: "sys".to_string(),
            },
            PromptEntry::User {
                content: "hi".to_string(),
            },
            PromptEntry::Assistant {
                content: None,
                tool_calls: vec![ToolCall {
                    id: "call_1".to_string(),
                    name: "createReminder".to_string(),
                    arguments: "{}".to_string(),
                }],
            },
            PromptEntry::Tool {
                content: "ok".to_string(),
                tool_call_id: "call_1".to_string(),
            },
        ];
        let provider = OpenAiProvider::new("key".to_string(), None, None);
        assert_eq!(provider.model(), DEFAULT_MODEL);
        let request = provider.build_request(&entries, &[]).unwrap();
        let value = serde_json::to_value(&request).unwrap();
        let messages = value["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(messages[2]["tool_calls"][0]["function"]["name"], "createReminder");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
        assert!(value.get("tools").map_or(true, Value::is_null));
    }
}
