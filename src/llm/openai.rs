//! OpenAI-compatible Chat Completions and Embeddings client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::LlmSettings;

use super::{LlmClient, LlmError, parse_question_list, prompts};

/// Non-streaming client for `/v1/chat/completions` and `/v1/embeddings`.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .finish()
    }
}

impl OpenAiClient {
    /// Create a client with the given settings and per-call timeout.
    pub fn new(settings: LlmSettings, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { http, settings }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }

    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, LlmError> {
        let mut rb = self.http.post(self.url(path)).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.settings.model,
            "temperature": 0.3,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let v = self.post_json("/v1/chat/completions", body).await?;
        v["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate_questions(
        &self,
        concern: &str,
        count: usize,
    ) -> Result<Vec<String>, LlmError> {
        let text = self
            .complete(
                prompts::SYSTEM_COUNSELOR,
                &prompts::question_prompt(concern, count),
            )
            .await?;

        let questions = parse_question_list(&text, count);
        if questions.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(questions)
    }

    async fn counsel(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.complete(system, user).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let body = json!({
            "model": self.settings.embedding_model,
            "input": text,
        });

        let v = self
            .post_json("/v1/embeddings", body)
            .await
            .map_err(|e| match e {
                LlmError::Api { status, message } => {
                    LlmError::Embedding(format!("API error ({status}): {message}"))
                }
                other => other,
            })?;

        v["data"][0]["embedding"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|x| x.as_f64())
                    .map(|x| x as f32)
                    .collect::<Vec<f32>>()
            })
            .filter(|emb| !emb.is_empty())
            .ok_or_else(|| LlmError::Embedding("response carried no embedding".to_string()))
    }
}
