// SYNOID Forge Model Registry
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Each pipeline is built at most once per process. The first caller pays
// the load; concurrent first callers wait on the same initialisation.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

use super::device::compute_device;
use super::diffusion::StableDiffusionPipeline;
use super::remote_video::RemoteVideoPipeline;
use super::{ImagePipeline, VideoPipeline};
use crate::config::ForgeConfig;

pub struct ModelRegistry {
    config: Arc<ForgeConfig>,
    image: OnceCell<Arc<dyn ImagePipeline>>,
    video: OnceCell<Arc<dyn VideoPipeline>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub image_loaded: bool,
    pub video_loaded: bool,
    pub image_model: String,
    pub video_model: String,
}

impl ModelRegistry {
    pub fn new(config: Arc<ForgeConfig>) -> Self {
        Self {
            config,
            image: OnceCell::new(),
            video: OnceCell::new(),
        }
    }

    /// A registry whose pipelines are already in place.
    pub fn with_pipelines(
        config: Arc<ForgeConfig>,
        image: Arc<dyn ImagePipeline>,
        video: Arc<dyn VideoPipeline>,
    ) -> Self {
        Self {
            config,
            image: OnceCell::from(image),
            video: OnceCell::from(video),
        }
    }

    pub async fn image(&self) -> Result<Arc<dyn ImagePipeline>> {
        let pipeline = self
            .image
            .get_or_try_init(|| async {
                let settings = self.config.image.clone();
                let cache_dir = self.config.cache_dir.clone();
                let force_cpu = self.config.force_cpu;
                let loaded = tokio::task::spawn_blocking(move || {
                    StableDiffusionPipeline::load(&settings, &cache_dir, compute_device(force_cpu))
                })
                .await??;
                Ok::<Arc<dyn ImagePipeline>, anyhow::Error>(Arc::new(loaded))
            })
            .await?;
        Ok(pipeline.clone())
    }

    pub async fn video(&self) -> Result<Arc<dyn VideoPipeline>> {
        let pipeline = self
            .video
            .get_or_try_init(|| async {
                let loaded = RemoteVideoPipeline::connect(self.config.video.clone()).await?;
                Ok::<Arc<dyn VideoPipeline>, anyhow::Error>(Arc::new(loaded))
            })
            .await?;
        Ok(pipeline.clone())
    }

    /// Load both pipelines up front so the first click doesn't pay for it.
    pub async fn preload(&self) -> Result<()> {
        info!("[FORGE] Preloading pipelines...");
        self.image().await?;
        self.video().await?;
        Ok(())
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            image_loaded: self.image.initialized(),
            video_loaded: self.video.initialized(),
            image_model: self
                .image
                .get()
                .map(|p| p.model_id().to_string())
                .unwrap_or_else(|| self.config.image.model_id.clone()),
            video_model: self
                .video
                .get()
                .map(|p| p.model_id().to_string())
                .unwrap_or_else(|| self.config.video.model_id.clone()),
        }
    }
}
