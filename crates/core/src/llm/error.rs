use crate::llm::Provider;
use std::fmt;

#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    /// One of `auth`, `transport`, `http`, `decode`.
    pub stage: &'static str,
    pub status: Option<u16>,
    pub detail: String,
    pub raw_output: Option<String>,
}

impl LlmDiagnosticsError {
    /// Transport failures, rate limiting and server errors may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self.stage {
            "transport" => true,
            "http" => matches!(self.status, Some(408 | 429 | 500..=599)),
            _ => false,
        }
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={:?}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}
