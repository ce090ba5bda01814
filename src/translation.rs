// SYNOID Forge Translator
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Prompts may be typed in any language. Before they reach a pipeline they
// are sent through a Google Translate compatible endpoint and come back in
// the target language (English by default).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

#[async_trait]
pub trait Translate: Send + Sync {
    async fn translate(&self, text: &str, dest_lang: &str) -> Result<String>;
}

pub struct Translator {
    client: reqwest::Client,
    endpoint: String,
}

impl Translator {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    fn request_url(&self, text: &str, dest_lang: &str) -> Result<Url> {
        let url = Url::parse_with_params(
            &self.endpoint,
            &[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", dest_lang),
                ("dt", "t"),
                ("q", text),
            ],
        )
        .with_context(|| format!("Invalid translation endpoint: {}", self.endpoint))?;
        Ok(url)
    }
}

#[async_trait]
impl Translate for Translator {
    async fn translate(&self, text: &str, dest_lang: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let url = self.request_url(text, dest_lang)?;
        debug!("[TRANSLATE] GET {}", url);

        let body: Value = self
            .client
            .get(url)
            .send()
            .await
            .context("Translation service unreachable")?
            .error_for_status()
            .context("Translation service returned an error")?
            .json()
            .await
            .context("Translation response was not JSON")?;

        let (translated, source_lang) = parse_translation(&body)?;
        info!(
            "[TRANSLATE] {} -> {}: \"{}\"",
            source_lang.as_deref().unwrap_or("?"),
            dest_lang,
            translated
        );
        Ok(translated)
    }
}

/// Pull the translated text (and detected source language, when present)
/// out of a `translate_a/single` response.
///
/// The payload is positional: `[[[translated, original, ...], ...], null, "src", ...]`.
/// Long inputs are split into several segments which are concatenated.
pub fn parse_translation(body: &Value) -> Result<(String, Option<String>)> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .context("Unexpected translation response shape")?;

    let translated: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();

    let source_lang = body.get(2).and_then(Value::as_str).map(str::to_string);
    Ok((translated, source_lang))
}
