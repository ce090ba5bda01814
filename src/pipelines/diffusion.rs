// SYNOID Forge Diffusion Engine
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Native Stable Diffusion (1.5 / 2.x) on Candle. Weights and the CLIP
// tokenizer are pulled from the HuggingFace hub into the model cache on
// first load.

use anyhow::{Context, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Module, Tensor};
use candle_transformers::models::stable_diffusion::{
    self, clip::ClipTextTransformer, unet_2d::UNet2DConditionModel, vae::AutoEncoderKL,
    StableDiffusionConfig,
};
use hf_hub::api::sync::ApiBuilder;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::device::{describe, preferred_dtype};
use super::ImagePipeline;
use crate::config::ImageSettings;

const TOKENIZER_REPO: &str = "openai/clip-vit-base-patch32";
const VAE_SCALE: f64 = 0.18215;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdVersion {
    V1_5,
    V2_1,
}

impl SdVersion {
    /// Infer the architecture from a hub repo id.
    pub fn from_model_id(model_id: &str) -> Self {
        let id = model_id.to_lowercase();
        if id.contains("v1-5") || id.contains("1-5") || id.contains("v1.5") {
            SdVersion::V1_5
        } else {
            SdVersion::V2_1
        }
    }

    fn config(&self, size: usize) -> StableDiffusionConfig {
        match self {
            SdVersion::V1_5 => StableDiffusionConfig::v1_5(None, Some(size), Some(size)),
            SdVersion::V2_1 => StableDiffusionConfig::v2_1(None, Some(size), Some(size)),
        }
    }
}

/// Which safetensors file to pull for a component.
pub fn weights_file(component: &str, half: bool) -> String {
    let stem = match component {
        "text_encoder" => "model",
        _ => "diffusion_pytorch_model",
    };
    if half {
        format!("{}/{}.fp16.safetensors", component, stem)
    } else {
        format!("{}/{}.safetensors", component, stem)
    }
}

struct DiffusionModel {
    config: StableDiffusionConfig,
    tokenizer: Tokenizer,
    pad_id: u32,
    text_model: ClipTextTransformer,
    unet: UNet2DConditionModel,
    vae: AutoEncoderKL,
    device: Device,
    dtype: DType,
    steps: usize,
    guidance_scale: f64,
}

pub struct StableDiffusionPipeline {
    model_id: String,
    inner: Arc<DiffusionModel>,
}

impl StableDiffusionPipeline {
    /// Download (if needed) and build every component. Blocking; call from
    /// `spawn_blocking`.
    pub fn load(settings: &ImageSettings, cache_dir: &Path, device: &Device) -> Result<Self> {
        let started = Instant::now();
        let version = SdVersion::from_model_id(&settings.model_id);
        let config = version.config(settings.size);
        let dtype = preferred_dtype(device);
        let half = dtype == DType::F16;

        info!(
            "[DIFFUSION] Loading {} ({:?}, {}, {:?})",
            settings.model_id,
            version,
            describe(device),
            dtype
        );

        std::fs::create_dir_all(cache_dir)?;
        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir.to_path_buf())
            .build()
            .context("Failed to initialise HuggingFace hub client")?;
        let repo = api.model(settings.model_id.clone());
        let fetch = |file: String| -> Result<PathBuf> {
            debug!("[DIFFUSION] Fetching {}", file);
            repo.get(&file)
                .with_context(|| format!("Failed to fetch {} from {}", file, settings.model_id))
        };

        let clip_weights = fetch(weights_file("text_encoder", half))?;
        let unet_weights = fetch(weights_file("unet", half))?;
        let vae_weights = fetch(weights_file("vae", half))?;
        let tokenizer_path = api
            .model(TOKENIZER_REPO.to_string())
            .get("tokenizer.json")
            .context("Failed to fetch CLIP tokenizer")?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(anyhow::Error::msg)?;
        let pad_token = config.clip.pad_with.as_deref().unwrap_or("<|endoftext|>");
        let pad_id = *tokenizer
            .get_vocab(true)
            .get(pad_token)
            .with_context(|| format!("Pad token {:?} missing from tokenizer", pad_token))?;

        let text_model =
            stable_diffusion::build_clip_transformer(&config.clip, clip_weights, device, dtype)?;
        let vae = config.build_vae(vae_weights, device, dtype)?;
        let unet = config.build_unet(unet_weights, device, 4, false, dtype)?;

        info!(
            "[DIFFUSION] ✓ {} ready in {:.1}s",
            settings.model_id,
            started.elapsed().as_secs_f64()
        );

        Ok(Self {
            model_id: settings.model_id.clone(),
            inner: Arc::new(DiffusionModel {
                config,
                tokenizer,
                pad_id,
                text_model,
                unet,
                vae,
                device: device.clone(),
                dtype,
                steps: settings.steps,
                guidance_scale: settings.guidance_scale,
            }),
        })
    }
}

impl DiffusionModel {
    fn embed(&self, text: &str) -> Result<Tensor> {
        let max_len = self.config.clip.max_position_embeddings;
        let mut tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(anyhow::Error::msg)?
            .get_ids()
            .to_vec();
        tokens.truncate(max_len);
        tokens.resize(max_len, self.pad_id);

        let tokens = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
        Ok(self.text_model.forward(&tokens)?)
    }

    fn run(&self, prompt: &str) -> Result<RgbImage> {
        let started = Instant::now();

        // Classifier-free guidance: batch the unconditional and prompt embeddings.
        let cond = self.embed(prompt)?;
        let uncond = self.embed("")?;
        let text_embeddings = Tensor::cat(&[uncond, cond], 0)?.to_dtype(self.dtype)?;

        let mut scheduler = self.config.build_scheduler(self.steps)?;
        let timesteps = scheduler.timesteps().to_vec();

        let (height, width) = (self.config.height, self.config.width);
        let latents = Tensor::randn(0f32, 1f32, (1, 4, height / 8, width / 8), &self.device)?
            .to_dtype(self.dtype)?;
        let mut latents = (latents * scheduler.init_noise_sigma())?;

        for (step, &timestep) in timesteps.iter().enumerate() {
            let input = Tensor::cat(&[&latents, &latents], 0)?;
            let input = scheduler.scale_model_input(input, timestep)?;
            let noise_pred = self.unet.forward(&input, timestep as f64, &text_embeddings)?;

            let chunks = noise_pred.chunk(2, 0)?;
            let (uncond_pred, text_pred) = (&chunks[0], &chunks[1]);
            let guided = (uncond_pred + ((text_pred - uncond_pred)? * self.guidance_scale)?)?;

            latents = scheduler.step(&guided, timestep, &latents)?;
            debug!("[DIFFUSION] step {}/{}", step + 1, timesteps.len());
        }

        let decoded = self.vae.decode(&(&latents / VAE_SCALE)?)?;
        let decoded = ((decoded / 2.)? + 0.5)?
            .to_device(&Device::Cpu)?
            .to_dtype(DType::F32)?;
        let pixels = (decoded.clamp(0f32, 1f32)? * 255.)?
            .to_dtype(DType::U8)?
            .squeeze(0)?
            .permute((1, 2, 0))?
            .flatten_all()?
            .to_vec1::<u8>()?;

        let image = RgbImage::from_raw(width as u32, height as u32, pixels)
            .context("Decoded image has unexpected dimensions")?;

        info!(
            "[DIFFUSION] Generated {}x{} in {:.1}s",
            width,
            height,
            started.elapsed().as_secs_f64()
        );
        Ok(image)
    }
}

#[async_trait]
impl ImagePipeline for StableDiffusionPipeline {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: &str) -> Result<RgbImage> {
        info!("[DIFFUSION] Prompt: \"{}\"", prompt);
        let model = self.inner.clone();
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || model.run(&prompt)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_from_model_id() {
        assert_eq!(
            SdVersion::from_model_id("stabilityai/stable-diffusion-2-1"),
            SdVersion::V2_1
        );
        assert_eq!(
            SdVersion::from_model_id("stabilityai/stable-diffusion-2"),
            SdVersion::V2_1
        );
        assert_eq!(
            SdVersion::from_model_id("runwayml/stable-diffusion-v1-5"),
            SdVersion::V1_5
        );
    }

    #[test]
    fn test_weights_file_names() {
        assert_eq!(weights_file("text_encoder", false), "text_encoder/model.safetensors");
        assert_eq!(
            weights_file("unet", true),
            "unet/diffusion_pytorch_model.fp16.safetensors"
        );
        assert_eq!(
            weights_file("vae", false),
            "vae/diffusion_pytorch_model.safetensors"
        );
    }

    #[test]
    fn test_config_respects_size() {
        let cfg = SdVersion::V2_1.config(512);
        assert_eq!((cfg.height, cfg.width), (512, 512));
    }
}
