//! Summarizer boundary: `summarize(text) -> short text`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GptConfig;
use crate::error::SummarizeError;

/// Prefixes the backend uses for error-shaped answers delivered with 200.
const ERROR_PREFIXES: [&str; 2] = ["Error", "Ошибка"];

#[allow(async_fn_in_trait)]
pub trait Summarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}

/// Reject empty or error-shaped answers; otherwise return the trimmed text.
pub fn accept(raw: &str) -> Result<String, SummarizeError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(SummarizeError::Empty);
    }
    if ERROR_PREFIXES.iter().any(|p| text.starts_with(p)) {
        return Err(SummarizeError::ErrorPayload(text.to_string()));
    }
    Ok(text.to_string())
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ShortenRequest<'a> {
    api_key: &'a str,
    messages: [Message<'a>; 2],
}

#[derive(Deserialize)]
struct ShortenResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Chat-style proxy: POST `{api_key, messages}`, answer in `response`.
pub struct HttpSummarizer {
    client: reqwest::Client,
    api_key: String,
    url: String,
    system_prompt: String,
}

impl HttpSummarizer {
    pub fn from_config(cfg: &GptConfig) -> Result<Self, SummarizeError> {
        if cfg.api_key.trim().is_empty() {
            return Err(SummarizeError::Config("gpt.api_key is empty".into()));
        }
        if cfg.proxy_url.trim().is_empty() {
            return Err(SummarizeError::Config("gpt.proxy_url is empty".into()));
        }
        let client = reqwest::Client::builder().timeout(cfg.timeout()).build()?;
        Ok(Self {
            client,
            api_key: cfg.api_key.clone(),
            url: cfg.proxy_url.clone(),
            system_prompt: system_prompt(cfg.max_chars),
        })
    }

    fn request<'a>(&'a self, text: &'a str) -> ShortenRequest<'a> {
        ShortenRequest {
            api_key: &self.api_key,
            messages: [
                Message {
                    role: "system",
                    content: &self.system_prompt,
                },
                Message {
                    role: "user",
                    content: text,
                },
            ],
        }
    }
}

fn system_prompt(max_chars: usize) -> String {
    format!(
        "Сократи данный текст до максимум {max_chars} символов, сохраняя основной смысл. \
         Отвечай только сокращенным текстом без дополнительных комментариев."
    )
}

impl Summarizer for HttpSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        debug!(url = %self.url, chars = text.chars().count(), "Summarizer request");
        let resp = self
            .client
            .post(&self.url)
            .json(&self.request(text))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SummarizeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // some proxies answer 200 with an HTML error page
        let body = resp.text().await?;
        let parsed: ShortenResponse = serde_json::from_str(&body)
            .map_err(|_| SummarizeError::ErrorPayload(body.chars().take(200).collect()))?;
        parsed.response.ok_or(SummarizeError::Empty)
    }
}
