//! Wire types for the vendor chat-completion API.
//!
//! Requests are typed structs serialized once by reqwest; responses
//! ignore unknown fields so vendor additions don't break decoding.

use serde::{Deserialize, Serialize};

use super::DiagnosisError;
use crate::models::SendMessage;

/// Request body for POST `/api/v3/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<SendMessage>,
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Non-streaming request (the only mode this client speaks).
    pub fn new(model: &str, messages: Vec<SendMessage>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            stream: false,
        }
    }
}

/// Response body from the chat-completion endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: AssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub role: Option<String>,
    /// Some vendors send `null` content on refusals.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl ChatCompletionResponse {
    /// Build a single-choice response (mock clients, tests).
    pub fn from_content(content: &str) -> Self {
        Self {
            id: None,
            model: None,
            choices: vec![ChatChoice {
                index: 0,
                message: AssistantMessage {
                    role: Some("assistant".to_string()),
                    content: Some(content.to_string()),
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        }
    }

    /// Text of the first choice. Only the first choice is ever consulted.
    pub fn first_content(&self) -> Result<&str, DiagnosisError> {
        let choice = self.choices.first().ok_or(DiagnosisError::EmptyChoices)?;
        Ok(choice.message.content.as_deref().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_vendor_shape() {
        let request = ChatCompletionRequest::new(
            "deepseek-v3",
            vec![SendMessage::system("prompt"), SendMessage::user("I feel tense")],
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "deepseek-v3",
                "messages": [
                    {"role": "system", "content": "prompt"},
                    {"role": "user", "content": "I feel tense"}
                ],
                "stream": false
            })
        );
    }

    #[test]
    fn response_ignores_unknown_fields() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1741000000,
            "model": "deepseek-v3",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hello", "reasoning_content": "..."},
                "finish_reason": "stop",
                "logprobs": null
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        }"#;
        let response: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.first_content().unwrap(), "hello");
        assert_eq!(response.usage.unwrap().total_tokens, 12);
    }

    #[test]
    fn no_choices_is_an_error() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(response.first_content(), Err(DiagnosisError::EmptyChoices)));
    }

    #[test]
    fn null_content_reads_as_empty() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let response: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.first_content().unwrap(), "");
    }
}
