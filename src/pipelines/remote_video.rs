// SYNOID Forge Video Bridge
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// The text-to-video model runs in a separate inference server. This client
// sends the prompt with the sampling settings and gets back PNG frames.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info};

use super::VideoPipeline;
use crate::config::VideoSettings;

#[derive(Debug, Serialize)]
pub struct VideoRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub num_frames: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
}

#[derive(Debug, Deserialize)]
pub struct VideoResponse {
    /// Base64 encoded PNG frames in playback order.
    pub frames: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    model: Option<String>,
}

pub struct RemoteVideoPipeline {
    client: reqwest::Client,
    settings: VideoSettings,
}

impl RemoteVideoPipeline {
    pub fn new(settings: VideoSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.settings.server_url.trim_end_matches('/'), route)
    }

    /// Check that the inference server is up before the first real request.
    pub async fn connect(settings: VideoSettings) -> Result<Self> {
        let pipeline = Self::new(settings);
        let url = pipeline.endpoint("health");
        let health: HealthResponse = pipeline
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Video inference server unreachable at {}", url))?
            .error_for_status()?
            .json()
            .await
            .unwrap_or(HealthResponse { model: None });

        info!(
            "[VIDEO] ✓ Inference server online ({})",
            health.model.as_deref().unwrap_or(&pipeline.settings.model_id)
        );
        Ok(pipeline)
    }
}

#[async_trait]
impl VideoPipeline for RemoteVideoPipeline {
    fn model_id(&self) -> &str {
        &self.settings.model_id
    }

    fn fps(&self) -> u32 {
        self.settings.fps
    }

    async fn generate(&self, prompt: &str, duration_secs: u32) -> Result<Vec<RgbImage>> {
        let started = Instant::now();
        let request = VideoRequest {
            model: &self.settings.model_id,
            prompt,
            num_frames: self.settings.frames_for(duration_secs),
            num_inference_steps: self.settings.steps,
            guidance_scale: self.settings.guidance_scale,
        };
        info!(
            "[VIDEO] Requesting {} frames ({}s) for \"{}\"",
            request.num_frames, duration_secs, prompt
        );

        let resp = self
            .client
            .post(self.endpoint("generate"))
            .json(&request)
            .send()
            .await
            .context("Video inference request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            error!("[VIDEO] Server error {}: {}", status, body);
            bail!("Video inference server returned {}: {}", status, body);
        }

        let payload: VideoResponse = resp
            .json()
            .await
            .context("Malformed video inference response")?;
        let frames = decode_frames(&payload)?;

        info!(
            "[VIDEO] Received {} frames in {:.1}s",
            frames.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(frames)
    }
}

pub fn decode_frames(payload: &VideoResponse) -> Result<Vec<RgbImage>> {
    if payload.frames.is_empty() {
        bail!("Video inference server returned no frames");
    }

    payload
        .frames
        .iter()
        .enumerate()
        .map(|(i, encoded)| {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .with_context(|| format!("Frame {} is not valid base64", i))?;
            let frame = image::load_from_memory(&bytes)
                .with_context(|| format!("Frame {} is not a readable image", i))?;
            Ok(frame.to_rgb8())
        })
        .collect()
}
