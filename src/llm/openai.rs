use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{ChatProvider, EmbeddingProvider};
use super::types::ChatRequest;
use crate::core::errors::RagError;

/// Provider speaking the OpenAI-compatible HTTP API
/// (`/v1/chat/completions` and `/v1/embeddings`, bearer auth).
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    async fn complete(&self, request: ChatRequest, model_id: &str) -> Result<String, RagError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.top_p {
                obj.insert("top_p".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(RagError::provider)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Provider(format!("chat completion error: {}", text)));
        }

        let payload: Value = res.json().await.map_err(RagError::provider)?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RagError::Provider("chat completion response missing content".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiCompatProvider {
    async fn embed(&self, text: &str, model_id: &str) -> Result<Vec<f32>, RagError> {
        let inputs = [text.to_string()];
        let mut embeddings = self.embed_batch(&inputs, model_id).await?;
        if embeddings.is_empty() {
            return Err(RagError::Provider("embedding response was empty".to_string()));
        }
        Ok(embeddings.remove(0))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        model_id: &str,
    ) -> Result<Vec<Vec<f32>>, RagError> {
        let url = format!("{}/v1/embeddings", self.base_url);

        // Newlines are flattened to spaces before embedding.
        let inputs: Vec<String> = texts.iter().map(|text| text.replace('\n', " ")).collect();

        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(RagError::provider)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Provider(format!("embedding error: {}", text)));
        }

        let payload: Value = res.json().await.map_err(RagError::provider)?;

        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    let vec: Vec<f32> = vals
                        .iter()
                        .filter_map(|v| v.as_f64().map(|f| f as f32))
                        .collect();
                    embeddings.push(vec);
                }
            }
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    #[tokio::test]
    #[ignore]
    async fn live_completion_round_trip() {
        let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let provider = OpenAiCompatProvider::new("https://api.openai.com".to_string(), api_key);

        let request = ChatRequest::new(vec![ChatMessage::user("Hello")]);
        let reply = provider.complete(request, "gpt-4o").await.unwrap();
        println!("reply: {}", reply);
    }
}
