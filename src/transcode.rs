// SYNOID Forge Transcoder - FFmpeg wrappers
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Two jobs: mux raw frames from the video pipeline into an MP4, and
// re-encode that MP4 to browser-playable H.264.

use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info};

/// Fixed encoder settings for the playable copy.
pub const H264_ARGS: &[&str] = &["-c:v", "libx264", "-crf", "23", "-preset", "medium"];

#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg: String,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Transcoder {
    pub fn new(ffmpeg_bin: &str) -> Self {
        Self {
            ffmpeg: ffmpeg_bin.to_string(),
        }
    }

    /// True if the configured binary runs.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Write `frames` into `work_dir` and mux them into `work_dir/raw.mp4`.
    pub async fn export_frames(&self, frames: &[RgbImage], fps: u32, work_dir: &Path) -> Result<PathBuf> {
        if frames.is_empty() {
            bail!("No frames to export");
        }

        let frames_dir = work_dir.join("frames");
        if frames_dir.exists() {
            tokio::fs::remove_dir_all(&frames_dir).await?;
        }
        tokio::fs::create_dir_all(&frames_dir).await?;

        let owned: Vec<RgbImage> = frames.to_vec();
        let dir = frames_dir.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            for (i, frame) in owned.iter().enumerate() {
                let path = dir.join(format!("frame_{:05}.png", i));
                frame
                    .save(&path)
                    .with_context(|| format!("Failed to write frame {:?}", path))?;
            }
            Ok(())
        })
        .await??;

        let output = work_dir.join("raw.mp4");
        info!("[FFMPEG] Muxing {} frames @ {} fps -> {:?}", frames.len(), fps, output);

        let pattern = frames_dir.join("frame_%05d.png");
        let status = Command::new(&self.ffmpeg)
            .args(["-y", "-nostdin", "-framerate", &fps.to_string(), "-i"])
            .arg(&pattern)
            // libx264 needs even dimensions and a planar pixel format
            .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2", "-pix_fmt", "yuv420p"])
            .arg(&output)
            .status()
            .await
            .with_context(|| format!("Failed to launch {}", self.ffmpeg))?;

        let _ = tokio::fs::remove_dir_all(&frames_dir).await;

        if !status.success() {
            error!("[FFMPEG] Frame export failed ({})", status);
            bail!("FFmpeg frame export failed");
        }
        Ok(output)
    }

    /// Re-encode `input` to H.264 at `output`, replacing any previous file.
    pub async fn convert_to_h264(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        if output.exists() {
            tokio::fs::remove_file(output)
                .await
                .with_context(|| format!("Failed to remove stale output {:?}", output))?;
        }

        info!("[FFMPEG] Converting {:?} -> {:?} (H.264)", input, output);

        let status = Command::new(&self.ffmpeg)
            .args(conversion_args(input, output))
            .status()
            .await
            .with_context(|| format!("Failed to launch {}", self.ffmpeg))?;

        if !status.success() {
            error!("[FFMPEG] Conversion failed ({})", status);
            bail!("FFmpeg H.264 conversion failed for {:?}", input);
        }
        Ok(output.to_path_buf())
    }
}

pub fn conversion_args(input: &Path, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-nostdin".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
    ];
    args.extend(H264_ARGS.iter().map(|s| s.to_string()));
    args.push(output.to_string_lossy().into_owned());
    args
}
