use serde::Serialize;

/// Body of a non-streaming `/api/chat` reply.
#[derive(Debug, Serialize)]
pub struct MockOllamaResponse {
    pub model: String,
    pub message: MockOllamaMessage,
    pub done: bool,
    pub eval_count: u32,
}

#[derive(Debug, Serialize)]
pub struct MockOllamaMessage {
    pub role: String,
    pub content: String,
}

impl MockOllamaResponse {
    pub fn simple_text(content: &str) -> Self {
        Self {
            model: "llama3.2".to_string(),
            message: MockOllamaMessage {
                role: "assistant".to_string(),
                content: content.to_string(),
            },
            done: true,
            eval_count: content.split_whitespace().count() as u32,
        }
    }

    /// Error body Ollama sends with a non-2xx status.
    pub fn error_json(message: &str) -> serde_json::Value {
        serde_json::json!({ "error": message })
    }
}
