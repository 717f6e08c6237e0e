use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{GenerateRequest, GenerateResponse, LlmClient, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const JSON_MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiClient {
    /// A missing credential is accepted here; each call then fails at the `auth` stage.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(
            settings.gemini_api_key.clone(),
            base_url,
            model,
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn new(
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!(
            "{}/{API_VERSION}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn diagnostics(
        stage: &'static str,
        status: Option<u16>,
        detail: String,
        raw_output: Option<String>,
    ) -> anyhow::Error {
        LlmDiagnosticsError {
            provider: Provider::Gemini,
            stage,
            status,
            detail,
            raw_output,
        }
        .into()
    }

    async fn generate_content(
        &self,
        body: &GenerateContentRequest,
    ) -> anyhow::Result<GenerateContentResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(Self::diagnostics(
                "auth",
                None,
                "GEMINI_API_KEY is not configured".to_string(),
                None,
            ));
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| Self::diagnostics("auth", None, e.to_string(), None))?,
        );

        let res = self
            .http
            .post(self.url())
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| Self::diagnostics("transport", None, format!("{e:#}"), None))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            Self::diagnostics(
                body_read_stage(status),
                Some(status.as_u16()),
                format!("failed to read Gemini response body: {e:#}"),
                None,
            )
        })?;

        if !status.is_success() {
            return Err(Self::diagnostics(
                "http",
                Some(status.as_u16()),
                format!("status={status}"),
                Some(text),
            ));
        }

        serde_json::from_str::<GenerateContentResponse>(&text).map_err(|e| {
            Self::diagnostics(
                "decode",
                Some(status.as_u16()),
                format!("failed to decode Gemini response: {e}"),
                Some(text),
            )
        })
    }

    fn request_body(req: &GenerateRequest) -> GenerateContentRequest {
        let contents = req
            .turns
            .iter()
            .map(|turn| Content {
                role: Some(turn.role.as_str().to_string()),
                parts: vec![Part {
                    text: Some(turn.text.clone()),
                }],
            })
            .collect();

        let system_instruction = req.system_instruction.as_ref().map(|text| Content {
            role: None,
            parts: vec![Part {
                text: Some(text.clone()),
            }],
        });

        let generation_config = GenerationConfig {
            response_mime_type: req.response_schema.as_ref().map(|_| JSON_MIME_TYPE),
            response_schema: req.response_schema.clone(),
            max_output_tokens: req.max_output_tokens,
        };

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: (!generation_config.is_empty()).then_some(generation_config),
        }
    }

    fn response_text(res: &GenerateContentResponse) -> Option<String> {
        let candidate = res.candidates.first()?;
        let content = candidate.content.as_ref()?;

        let mut out = String::new();
        for part in &content.parts {
            // Non-text parts (function calls, inline data) are ignored.
            if let Some(text) = &part.text {
                out.push_str(text);
            }
        }

        if out.trim().is_empty() {
            None
        } else {
            Some(out)
        }
    }

    fn finish_reason(res: &GenerateContentResponse) -> Option<String> {
        res.candidates
            .first()
            .and_then(|c| c.finish_reason.clone())
            .or_else(|| {
                res.prompt_feedback
                    .as_ref()
                    .and_then(|f| f.block_reason.as_ref())
                    .map(|r| format!("BLOCKED_{r}"))
            })
    }
}

#[async_trait::async_trait]
impl LlmClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let body = Self::request_body(req);
        let t0 = Instant::now();
        let res = self.generate_content(&body).await?;

        let out = GenerateResponse {
            text: Self::response_text(&res),
            finish_reason: Self::finish_reason(&res),
        };

        tracing::debug!(
            model = %self.model,
            turns = req.turns.len(),
            structured = req.response_schema.is_some(),
            finish_reason = out.finish_reason.as_deref().unwrap_or("-"),
            has_text = out.text.is_some(),
            elapsed_ms = t0.elapsed().as_millis(),
            "gemini generateContent"
        );

        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.response_mime_type.is_none()
            && self.response_schema.is_none()
            && self.max_output_tokens.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// A lost body on an error status is still that status's failure, so a 4xx is not retried.
fn body_read_stage(status: reqwest::StatusCode) -> &'static str {
    if status.is_success() {
        "transport"
    } else {
        "http"
    }
}
