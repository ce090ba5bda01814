// SYNOID Forge Pipelines
// Copyright (c) 2026 Xing_The_Creator | SYNOID

pub mod device;
pub mod diffusion;
pub mod registry;
pub mod remote_video;

use anyhow::Result;
use async_trait::async_trait;
use image::{ImageOutputFormat, RgbImage};
use std::io::Cursor;

pub use registry::ModelRegistry;

/// Text-to-image model.
#[async_trait]
pub trait ImagePipeline: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<RgbImage>;
}

/// Text-to-video model. Returns the raw frame sequence; muxing happens in
/// `transcode`.
#[async_trait]
pub trait VideoPipeline: Send + Sync {
    fn model_id(&self) -> &str;
    /// Playback rate the frames are meant for.
    fn fps(&self) -> u32;
    async fn generate(&self, prompt: &str, duration_secs: u32) -> Result<Vec<RgbImage>>;
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageOutputFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_png_signature() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
        let png = encode_png(&img).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(2, 2), &image::Rgb([200, 10, 10]));
    }
}
