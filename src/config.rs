// SYNOID Forge Configuration
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Runtime settings come from the environment (a `.env` file is loaded by
// `main` before this runs). CLI flags override individual fields afterwards.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";
pub const DEFAULT_IMAGE_MODEL: &str = "stabilityai/stable-diffusion-2-1";
pub const DEFAULT_VIDEO_MODEL: &str = "damo-vilab/text-to-video-ms-1.7b";

#[derive(Debug, Clone)]
pub struct ForgeConfig {
    pub port: u16,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub translate_url: String,
    pub target_lang: String,
    pub image: ImageSettings,
    pub video: VideoSettings,
    pub ffmpeg_bin: String,
    pub force_cpu: bool,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub model_id: String,
    pub steps: usize,
    pub guidance_scale: f64,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub server_url: String,
    pub model_id: String,
    pub steps: u32,
    pub guidance_scale: f64,
    /// Playback rate of the exported clip. Each requested second of video
    /// asks the model for this many frames.
    pub fps: u32,
}

impl VideoSettings {
    pub fn frames_for(&self, duration_secs: u32) -> u32 {
        duration_secs * self.fps
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        let base_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synoid");

        Self {
            port: 3000,
            output_dir: base_dir.join("forge_output"),
            cache_dir: base_dir.join("models"),
            translate_url: DEFAULT_TRANSLATE_URL.to_string(),
            target_lang: "en".to_string(),
            image: ImageSettings {
                model_id: DEFAULT_IMAGE_MODEL.to_string(),
                steps: 50,
                guidance_scale: 7.5,
                size: 768,
            },
            video: VideoSettings {
                server_url: "http://localhost:7860".to_string(),
                model_id: DEFAULT_VIDEO_MODEL.to_string(),
                steps: 10,
                guidance_scale: 6.5,
                fps: 5,
            },
            ffmpeg_bin: "ffmpeg".to_string(),
            force_cpu: false,
        }
    }
}

impl ForgeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "FORGE_PORT")? {
            cfg.port = port;
        }
        if let Some(dir) = lookup("FORGE_OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("FORGE_CACHE_DIR") {
            cfg.cache_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("FORGE_TRANSLATE_URL") {
            cfg.translate_url = url;
        }
        if let Some(lang) = lookup("FORGE_TARGET_LANG") {
            cfg.target_lang = lang;
        }

        if let Some(model) = lookup("FORGE_IMAGE_MODEL") {
            cfg.image.model_id = model;
        }
        if let Some(steps) = parse_var(&lookup, "FORGE_IMAGE_STEPS")? {
            cfg.image.steps = steps;
        }
        if let Some(guidance) = parse_var(&lookup, "FORGE_IMAGE_GUIDANCE")? {
            cfg.image.guidance_scale = guidance;
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, "FORGE_IMAGE_SIZE")? {
            if size == 0 || size % 8 != 0 {
                anyhow::bail!("FORGE_IMAGE_SIZE must be a positive multiple of 8, got {}", size);
            }
            cfg.image.size = size;
        }

        if let Some(url) = lookup("FORGE_VIDEO_URL") {
            cfg.video.server_url = url;
        }
        if let Some(model) = lookup("FORGE_VIDEO_MODEL") {
            cfg.video.model_id = model;
        }
        if let Some(steps) = parse_var(&lookup, "FORGE_VIDEO_STEPS")? {
            cfg.video.steps = steps;
        }
        if let Some(guidance) = parse_var(&lookup, "FORGE_VIDEO_GUIDANCE")? {
            cfg.video.guidance_scale = guidance;
        }
        if let Some(fps) = parse_var::<u32, _>(&lookup, "FORGE_VIDEO_FPS")? {
            if fps == 0 {
                anyhow::bail!("FORGE_VIDEO_FPS must be at least 1");
            }
            cfg.video.fps = fps;
        }

        if let Some(bin) = lookup("FORGE_FFMPEG") {
            cfg.ffmpeg_bin = bin;
        }
        cfg.force_cpu = lookup("FORGE_CPU")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(cfg)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}
