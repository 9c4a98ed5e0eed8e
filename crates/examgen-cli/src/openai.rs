//! Blocking client for an OpenAI-compatible chat-completions
//! endpoint, behind the core's `CompletionModel` seam.

use serde_json::{json, Value};

use examgen_core::{CompletionModel, ExamError, ExamResult};

use crate::config::ModelConfig;

pub struct OpenAiModel {
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl OpenAiModel {
    /// Build a client from config. The API key comes from
    /// `OPENAI_API_KEY` only.
    pub fn from_config(config: &ModelConfig) -> ExamResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ExamError::Config("OPENAI_API_KEY is not set".into()))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.name.clone(),
            temperature: config.temperature,
            api_key,
        })
    }
}

impl CompletionModel for OpenAiModel {
    fn complete(&self, prompt: &str) -> ExamResult<String> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = ureq::post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => ExamError::Model(format!(
                    "endpoint returned {code}: {}",
                    resp.into_string().unwrap_or_default()
                )),
                other => ExamError::Model(other.to_string()),
            })?;

        let payload: Value = response
            .into_json()
            .map_err(|e| ExamError::Model(format!("unreadable response body: {e}")))?;

        extract_content(&payload)
    }
}

/// Pull the completion text out of a chat-completions response.
fn extract_content(payload: &Value) -> ExamResult<String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ExamError::Model("response has no choices[0].message.content".into()))
}
