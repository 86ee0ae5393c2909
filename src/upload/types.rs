use reqwest::Url;
use serde::{Deserialize, Serialize};

/// `status` value the server sends for an accepted upload
pub const STATUS_SUCCESS: &str = "success";

/// JSON body returned by the `/process/` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

impl ProcessResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Result of an accepted upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub message: Option<String>,
    /// `redirect_url` resolved against the server base URL
    pub redirect: Option<Url>,
}

impl UploadOutcome {
    /// Where the caller should go next, if the server asked for a redirect
    pub fn navigation(&self) -> Option<&Url> {
        self.redirect.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_response() {
        let parsed: ProcessResponse = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(parsed.is_success());
        assert_eq!(parsed.message, None);
        assert_eq!(parsed.redirect_url, None);
    }

    #[test]
    fn test_parse_error_response() {
        let parsed: ProcessResponse =
            serde_json::from_str(r#"{"status":"error","message":"bad file"}"#).unwrap();
        assert!(!parsed.is_success());
        assert_eq!(parsed.message.as_deref(), Some("bad file"));
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let parsed: ProcessResponse = serde_json::from_str(
            r#"{"status":"success","redirect_url":"/results/42","id":42}"#,
        )
        .unwrap();
        assert_eq!(parsed.redirect_url.as_deref(), Some("/results/42"));
    }
}
