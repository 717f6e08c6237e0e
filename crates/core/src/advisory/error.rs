use crate::llm::error::LlmDiagnosticsError;
use serde::Serialize;
use thiserror::Error;

/// Chat fallback when the model answered with no text.
pub const NO_REPLY_FALLBACK: &str =
    "I'm having trouble checking the tackle box right now. Try again?";

/// Chat fallback for every other failure.
pub const CONNECTION_FALLBACK: &str =
    "Sorry, I lost my train of thought. Please check your connection.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvisoryError {
    #[error("model credential is not configured")]
    Unconfigured,

    #[error("model endpoint unreachable: {0}")]
    Transport(String),

    #[error("model endpoint rejected the request (status {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("model returned no text")]
    EmptyResponse,

    #[error("model output did not match the requested shape: {0}")]
    Malformed(String),
}

impl AdvisoryError {
    pub fn from_llm(err: &anyhow::Error) -> Self {
        let Some(diag) = err.downcast_ref::<LlmDiagnosticsError>() else {
            return Self::Transport(format!("{err:#}"));
        };

        match (diag.stage, diag.status) {
            ("auth", _) => Self::Unconfigured,
            ("http", Some(status)) => Self::Rejected {
                status,
                detail: diag.detail.clone(),
            },
            ("decode", _) => Self::Malformed(diag.detail.clone()),
            _ => Self::Transport(diag.detail.clone()),
        }
    }

    /// Stable machine-readable tag.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Transport(_) => "transport",
            Self::Rejected { .. } => "rejected",
            Self::EmptyResponse => "empty_response",
            Self::Malformed(_) => "malformed",
        }
    }

    pub fn chat_fallback(&self) -> &'static str {
        match self {
            Self::EmptyResponse => NO_REPLY_FALLBACK,
            _ => CONNECTION_FALLBACK,
        }
    }
}

/// Outcome envelope handed to UI callers: either data, or the reason the advisor
/// was unavailable together with the value to show instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Advice<T> {
    Ok {
        data: T,
    },
    Unavailable {
        reason: &'static str,
        detail: String,
        fallback: T,
    },
}

impl<T> Advice<T> {
    pub fn from_result(
        res: Result<T, AdvisoryError>,
        fallback: impl FnOnce(&AdvisoryError) -> T,
    ) -> Self {
        match res {
            Ok(data) => Self::Ok { data },
            Err(err) => Self::Unavailable {
                reason: err.reason(),
                detail: err.to_string(),
                fallback: fallback(&err),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Advice<U> {
        match self {
            Self::Ok { data } => Advice::Ok { data: f(data) },
            Self::Unavailable {
                reason,
                detail,
                fallback,
            } => Advice::Unavailable {
                reason,
                detail,
                fallback: f(fallback),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;
    use serde_json::json;

    fn diag(stage: &'static str, status: Option<u16>) -> anyhow::Error {
        LlmDiagnosticsError {
            provider: Provider::Gemini,
            stage,
            status,
            detail: "detail".to_string(),
            raw_output: None,
        }
        .into()
    }

    #[test]
    fn maps_llm_stages_to_reasons() {
        assert_eq!(AdvisoryError::from_llm(&diag("auth", None)), AdvisoryError::Unconfigured);
        assert_eq!(
            AdvisoryError::from_llm(&diag("http", Some(429))).reason(),
            "rejected"
        );
        assert_eq!(
            AdvisoryError::from_llm(&diag("transport", None)).reason(),
            "transport"
        );
        assert_eq!(
            AdvisoryError::from_llm(&diag("decode", Some(200))).reason(),
            "malformed"
        );
        assert_eq!(
            AdvisoryError::from_llm(&anyhow::anyhow!("socket closed")).reason(),
            "transport"
        );
    }

    #[test]
    fn chat_fallbacks_are_never_empty() {
        let all = [
            AdvisoryError::Unconfigured,
            AdvisoryError::Transport("x".to_string()),
            AdvisoryError::Rejected {
                status: 500,
                detail: "x".to_string(),
            },
            AdvisoryError::EmptyResponse,
            AdvisoryError::Malformed("x".to_string()),
        ];
        for err in all {
            let s = err.chat_fallback();
            assert!(s == NO_REPLY_FALLBACK || s == CONNECTION_FALLBACK);
            assert!(!s.is_empty());
        }
        assert_eq!(AdvisoryError::EmptyResponse.chat_fallback(), NO_REPLY_FALLBACK);
    }

    #[test]
    fn advice_serializes_tagged() {
        let ok: Advice<Vec<u32>> = Advice::from_result(Ok(vec![1]), |_| Vec::new());
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"status": "ok", "data": [1]}));

        let down: Advice<Vec<u32>> =
            Advice::from_result(Err(AdvisoryError::Unconfigured), |_| Vec::new());
        assert_eq!(
            serde_json::to_value(&down).unwrap(),
            json!({
                "status": "unavailable",
                "reason": "unconfigured",
                "detail": "model credential is not configured",
                "fallback": []
            })
        );
        assert!(!down.is_ok());
    }
}
