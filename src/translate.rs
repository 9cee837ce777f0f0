use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target: &str) -> Result<String>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

/// Client for a LibreTranslate-compatible `/translate` endpoint.
pub struct HttpTranslator {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranslator {
    /// `None` when no endpoint is configured.
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        let Some(endpoint) = settings.translate_endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty())
        else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(settings.fetch_timeout())
            .build()
            .context("Failed to create translation client")?;
        Ok(Some(Self { client, endpoint: endpoint.to_string() }))
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        let body = TranslateRequest { q: text, source: "auto", target, format: "text" };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("Translation request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {} from translation endpoint", status);
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .context("Unexpected translation response")?;
        Ok(parsed.translated_text)
    }
}
