pub mod error;
pub mod gemini;
pub mod json;
pub mod retry;

use crate::domain::chat::ChatRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

/// One role-tagged message sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: ChatRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub turns: Vec<Turn>,
    pub system_instruction: Option<String>,
    /// When set, the model is asked for `application/json` matching this schema.
    pub response_schema: Option<serde_json::Value>,
    pub max_output_tokens: Option<u32>,
}

impl GenerateRequest {
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::user(text)],
            ..Default::default()
        }
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateResponse {
    /// `None` when the model produced no usable text.
    pub text: Option<String>,
    pub finish_reason: Option<String>,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
}
