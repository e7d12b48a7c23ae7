use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use super::{ProviderError, ReplyGenerator};
use crate::config::GenerationConfig;
use crate::conversation::{ConversationTurn, PracticeSettings, Speaker};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

/// Reply generation against a chat-completions compatible endpoint.
///
/// Both supported vendors (openai, groq) speak the same wire format; only
/// the base URL differs.
pub struct ChatCompletionsGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    vendor: String,
}

impl ChatCompletionsGenerator {
    pub fn new(cfg: &GenerationConfig) -> Result<Self> {
        let base_url = cfg.base_url.clone().unwrap_or_else(|| {
            match cfg.vendor.as_str() {
                "groq" => "https://api.groq.com/openai/v1",
                _ => "https://api.openai.com/v1",
            }
            .to_string()
        });

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .context("failed to build HTTP client")?,
            base_url,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            vendor: cfg.vendor.clone(),
        })
    }

    fn system_prompt(settings: &PracticeSettings) -> String {
        format!(
            "You are {persona}, a friendly conversation partner helping a student \
             practice spoken {language}. Keep the conversation about {topic}. \
             Reply in {language} with one or two short, natural sentences, and \
             gently rephrase the student's mistakes in your answer.",
            persona = settings.persona,
            language = settings.target_language,
            topic = settings.topic,
        )
    }
}

#[async_trait::async_trait]
impl ReplyGenerator for ChatCompletionsGenerator {
    async fn reply(
        &self,
        history: &[ConversationTurn],
        settings: &PracticeSettings,
    ) -> Result<String, ProviderError> {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: Self::system_prompt(settings),
        }];

        for turn in history {
            messages.push(ChatMessage {
                role: match turn.speaker {
                    Speaker::User => "user",
                    Speaker::Assistant => "assistant",
                },
                content: turn.text.clone(),
            });
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: 200,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let payload: serde_json::Value = response.json().await?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::Response("missing message content".to_string()))?;

        info!(
            "generated reply over {} turns via {}: {} chars",
            history.len(),
            self.vendor,
            content.len()
        );

        Ok(content.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.vendor
    }
}
