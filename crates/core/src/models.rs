use providers::ChatMessage;
use serde::{Deserialize, Serialize};

/// Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

impl ChatCompletionResponse {
    pub fn single(request_id: &str, model: &str, created: i64, content: String) -> Self {
        Self {
            id: format!("chatcmpl-{}", request_id),
            object: "chat.completion".to_string(),
            created,
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::assistant(content),
                finish_reason: "stop".to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ignores_extra_fields() {
        let req: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"gpt-3.5-turbo","temperature":0.2,"stream":false,
                "messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        assert_eq!(req.messages.len(), 1);
    }

    #[test]
    fn response_shape() {
        let resp = ChatCompletionResponse::single("abc", "m", 10, "ok".into());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["id"], "chatcmpl-abc");
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["choices"][0]["message"]["role"], "assistant");
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
    }
}
