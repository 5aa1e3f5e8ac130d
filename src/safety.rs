//! External jailbreak-detection gate for retrieved context.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::RagError;

/// Classification outcome from the safety oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    Unsafe,
}

/// Capability: classify text as safe or unsafe.
#[async_trait]
pub trait SafetyClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<SafetyVerdict, RagError>;
}

/// HTTP classifier speaking the detector service's input-safety endpoint.
#[derive(Clone)]
pub struct HttpSafetyClassifier {
    url: String,
    api_key: String,
    client: Client,
}

impl HttpSafetyClassifier {
    pub fn new(url: String, api_key: String) -> Self {
        Self {
            url,
            api_key,
            client: Client::new(),
        }
    }
}

// The service replies with a bare classification string.
fn parse_verdict(payload: &Value) -> SafetyVerdict {
    if payload.as_str() == Some("UNSAFE") {
        SafetyVerdict::Unsafe
    } else {
        SafetyVerdict::Safe
    }
}

#[async_trait]
impl SafetyClassifier for HttpSafetyClassifier {
    async fn classify(&self, text: &str) -> Result<SafetyVerdict, RagError> {
        let body = json!({
            "text": text,
            "text_type": "input",
        });

        let res = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(RagError::provider)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Provider(format!("safety classifier error: {}", text)));
        }

        let payload: Value = res.json().await.map_err(RagError::provider)?;
        Ok(parse_verdict(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_literal_is_the_only_unsafe_verdict() {
        assert_eq!(parse_verdict(&json!("UNSAFE")), SafetyVerdict::Unsafe);
        assert_eq!(parse_verdict(&json!("SAFE")), SafetyVerdict::Safe);
        assert_eq!(parse_verdict(&json!("unsafe")), SafetyVerdict::Safe);
        assert_eq!(parse_verdict(&json!({ "label": "UNSAFE" })), SafetyVerdict::Safe);
    }
}
