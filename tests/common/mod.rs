#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use synoid_forge::config::ForgeConfig;
use synoid_forge::pipelines::{ImagePipeline, ModelRegistry, VideoPipeline};
use synoid_forge::state::ForgeState;
use synoid_forge::translation::Translate;

/// Uppercases instead of calling a service, and remembers what it saw.
#[derive(Default)]
pub struct FakeTranslator {
    pub seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Translate for FakeTranslator {
    async fn translate(&self, text: &str, _dest_lang: &str) -> Result<String> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(text.to_uppercase())
    }
}

pub struct FakeImage {
    pub prompts: Mutex<Vec<String>>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl FakeImage {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail: false,
            delay: None,
        }
    }

    /// Takes `delay` to produce each image.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl ImagePipeline for FakeImage {
    fn model_id(&self) -> &str {
        "fake/image"
    }

    async fn generate(&self, prompt: &str) -> Result<RgbImage> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            anyhow::bail!("out of memory");
        }
        Ok(RgbImage::from_pixel(16, 12, Rgb([10, 200, 30])))
    }
}

pub struct FakeVideo {
    pub calls: AtomicUsize,
    pub fps: u32,
}

impl FakeVideo {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fps: 5,
        }
    }
}

#[async_trait]
impl VideoPipeline for FakeVideo {
    fn model_id(&self) -> &str {
        "fake/video"
    }

    fn fps(&self) -> u32 {
        self.fps
    }

    async fn generate(&self, _prompt: &str, duration_secs: u32) -> Result<Vec<RgbImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = duration_secs * self.fps;
        Ok((0..n)
            .map(|i| RgbImage::from_pixel(64, 48, Rgb([(i * 10) as u8, 0, 0])))
            .collect())
    }
}

pub struct Harness {
    pub state: Arc<ForgeState>,
    pub translator: Arc<FakeTranslator>,
    pub image: Arc<FakeImage>,
    pub video: Arc<FakeVideo>,
}

pub fn harness(output_dir: &Path, image: FakeImage) -> Harness {
    let mut config = ForgeConfig::default();
    config.output_dir = output_dir.to_path_buf();
    let config = Arc::new(config);

    let translator = Arc::new(FakeTranslator::default());
    let image = Arc::new(image);
    let video = Arc::new(FakeVideo::new());
    let registry = Arc::new(ModelRegistry::with_pipelines(
        config.clone(),
        image.clone(),
        video.clone(),
    ));

    Harness {
        state: Arc::new(ForgeState::with_parts(config, translator.clone(), registry)),
        translator,
        image,
        video,
    }
}

/// FFmpeg with libx264 compiled in.
pub fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .map(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).contains("libx264"))
        .unwrap_or(false)
}
