// SYNOID Forge Dependency Check
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Reports which external collaborators are reachable before serving.

use std::time::Duration;
use tracing::info;

use crate::config::ForgeConfig;
use crate::pipelines::device::{compute_device, describe};
use crate::transcode::Transcoder;

#[derive(Debug, Clone, PartialEq)]
pub enum DependencyStatus {
    Ready,
    Missing(String),
}

impl DependencyStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, DependencyStatus::Ready)
    }
}

#[derive(Debug)]
pub struct DependencyReport {
    pub ffmpeg: DependencyStatus,
    pub video_server: DependencyStatus,
}

impl DependencyReport {
    /// Names of everything that is not ready.
    pub fn missing(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let DependencyStatus::Missing(why) = &self.ffmpeg {
            out.push(format!("ffmpeg ({})", why));
        }
        if let DependencyStatus::Missing(why) = &self.video_server {
            out.push(format!("video server ({})", why));
        }
        out
    }
}

pub async fn check_dependencies(config: &ForgeConfig) -> DependencyReport {
    let ffmpeg = if Transcoder::new(&config.ffmpeg_bin).is_available().await {
        DependencyStatus::Ready
    } else {
        DependencyStatus::Missing(format!("`{}` not found on PATH", config.ffmpeg_bin))
    };

    let video_server = probe_video_server(&config.video.server_url).await;

    DependencyReport {
        ffmpeg,
        video_server,
    }
}

async fn probe_video_server(base_url: &str) -> DependencyStatus {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => return DependencyStatus::Missing(e.to_string()),
    };
    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => DependencyStatus::Ready,
        Ok(resp) => DependencyStatus::Missing(format!("{} returned {}", url, resp.status())),
        Err(_) => DependencyStatus::Missing(format!("{} unreachable", url)),
    }
}

/// Print the report (for CLI `check` command)
pub async fn print_status(config: &ForgeConfig) {
    let report = check_dependencies(config).await;
    let device = compute_device(config.force_cpu);

    let mark = |s: &DependencyStatus| match s {
        DependencyStatus::Ready => "✓ READY".to_string(),
        DependencyStatus::Missing(why) => format!("✗ {}", why),
    };

    println!("=== SYNOID Forge Status ===");
    println!("FFmpeg: {}", mark(&report.ffmpeg));
    println!("Video server: {}", mark(&report.video_server));
    println!("Image model: {} on {}", config.image.model_id, describe(device));
    println!("Video model: {}", config.video.model_id);
    println!("Translation: {} -> {}", config.translate_url, config.target_lang);
    println!("Output dir: {:?}", config.output_dir);
    info!("[HEALTH] {} missing dependencies", report.missing().len());
}
