use thiserror::Error;

/// Failures on the generative tips path. Every variant ends in the
/// rule-based fallback; only [`TipsError::ModelNotFound`] earns a retry on
/// the alternate model first.
#[derive(Error, Debug)]
pub enum TipsError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("service returned no text")]
    EmptyResponse,

    #[error("no JSON object in response")]
    NoJson,

    #[error("invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is missing fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

impl TipsError {
    pub fn is_model_not_found(&self) -> bool {
        matches!(self, TipsError::ModelNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tips_error_display() {
        let err = TipsError::ModelNotFound("gemini-1.5-flash".to_string());
        assert_eq!(err.to_string(), "model not found: gemini-1.5-flash");
        assert!(err.is_model_not_found());

        let err = TipsError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "service returned 500: boom");
        assert!(!err.is_model_not_found());

        let err = TipsError::MissingFields(vec!["motivation", "studyInsight"]);
        assert_eq!(err.to_string(), "response is missing fields: motivation, studyInsight");
    }
}
