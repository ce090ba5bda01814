// SYNOID Forge Generator
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Glue between a Generate click and the pipelines: translate the prompt,
// clear the previous result, run the selected model, convert video for
// playback and store the artifact in the session.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::ForgeConfig;
use crate::pipelines::{encode_png, ModelRegistry};
use crate::session::{Artifact, MediaKind, SessionSnapshot, SessionStore};
use crate::transcode::Transcoder;
use crate::translation::Translate;

pub const PLAYABLE_FILE: &str = "output.mp4";

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub media_type: MediaKind,
    #[serde(default)]
    pub video_length: Option<u32>,
    #[serde(default = "default_translate")]
    pub translate: bool,
}

fn default_translate() -> bool {
    true
}

impl GenerateRequest {
    pub fn image(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            media_type: MediaKind::Image,
            video_length: None,
            translate: true,
        }
    }

    pub fn video(prompt: &str, length: u32) -> Self {
        Self {
            prompt: prompt.to_string(),
            media_type: MediaKind::Video,
            video_length: Some(length),
            translate: true,
        }
    }

    /// The effective video length. The duration field starts at 1 and
    /// steps by whole seconds, whichever media type is selected.
    pub fn validated_length(&self) -> Result<u32> {
        match self.video_length {
            Some(0) => {
                Err(InvalidRequest("Video length must be at least 1 second".to_string()).into())
            }
            Some(len) => Ok(len),
            None => Ok(1),
        }
    }
}

/// Rejected before any model or tool was touched.
#[derive(Debug)]
pub struct InvalidRequest(pub String);

impl fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for InvalidRequest {}

pub struct MediaGenerator {
    config: Arc<ForgeConfig>,
    translator: Arc<dyn Translate>,
    registry: Arc<ModelRegistry>,
    transcoder: Transcoder,
    sessions: Arc<SessionStore>,
    /// One model run at a time.
    busy: Mutex<()>,
}

impl MediaGenerator {
    pub fn new(
        config: Arc<ForgeConfig>,
        translator: Arc<dyn Translate>,
        registry: Arc<ModelRegistry>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        let transcoder = Transcoder::new(&config.ffmpeg_bin);
        Self {
            config,
            translator,
            registry,
            transcoder,
            sessions,
            busy: Mutex::new(()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    pub async fn translate_prompt(&self, text: &str) -> Result<String> {
        self.translator
            .translate(text, &self.config.target_lang)
            .await
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.config.output_dir.join(session_id)
    }

    /// Remove per-session output directories left by an earlier run.
    /// Only directories named like a session id are touched.
    pub async fn purge_outputs(&self) -> Result<usize> {
        let root = &self.config.output_dir;
        if !root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(root)
            .await
            .with_context(|| format!("Failed to read {:?}", root))?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let is_session = name.to_str().map(SessionStore::is_valid_id).unwrap_or(false);
            if is_session && entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(entry.path())
                    .await
                    .with_context(|| format!("Failed to remove {:?}", entry.path()))?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!("[FORGE] Removed {} stale session output(s) from {:?}", removed, root);
        }
        Ok(removed)
    }

    async fn remove_session_files(&self, session_id: &str) {
        let dir = self.session_dir(session_id);
        if dir.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                warn!("[FORGE] Could not remove {:?}: {}", dir, e);
            }
        }
    }

    /// Handle a Generate click for `session_id`.
    pub async fn generate(&self, session_id: &str, req: GenerateRequest) -> Result<SessionSnapshot> {
        let video_length = req.validated_length()?;
        let prompt = if req.translate {
            self.translate_prompt(&req.prompt).await?
        } else {
            req.prompt.clone()
        };

        let _busy = self.busy.lock().await;

        self.sessions.with(session_id, |s| {
            s.media_kind = req.media_type;
            s.video_length = video_length;
            s.begin(&prompt);
        });
        // The previous result is gone from the session, so are its files.
        self.remove_session_files(session_id).await;

        info!(
            "[FORGE] Session {}: generating {} for \"{}\"",
            short_id(session_id),
            req.media_type,
            prompt
        );
        let started = Instant::now();

        let result = match req.media_type {
            MediaKind::Image => self.render_image(&prompt).await,
            MediaKind::Video => {
                self.render_video(&prompt, video_length, &self.session_dir(session_id))
                    .await
            }
        };

        let artifact = match result {
            Ok(a) => a,
            Err(e) => {
                error!("[FORGE] Generation failed: {:#}", e);
                return Err(e);
            }
        };

        info!(
            "[FORGE] ✅ {} ready in {:.1}s",
            req.media_type,
            started.elapsed().as_secs_f64()
        );
        self.sessions.with(session_id, |s| s.complete(artifact));
        Ok(self.sessions.snapshot(session_id))
    }

    pub async fn render_image(&self, prompt: &str) -> Result<Artifact> {
        let pipeline = self.registry.image().await?;
        let image = pipeline.generate(prompt).await?;
        let (width, height) = image.dimensions();
        let png = tokio::task::spawn_blocking(move || encode_png(&image)).await??;
        Ok(Artifact::Image {
            png: Arc::new(png),
            width,
            height,
        })
    }

    /// Generate frames, mux them, and convert the clip to H.264 inside `work_dir`.
    pub async fn render_video(&self, prompt: &str, length: u32, work_dir: &Path) -> Result<Artifact> {
        let pipeline = self.registry.video().await?;
        let frames = pipeline.generate(prompt, length).await?;

        tokio::fs::create_dir_all(work_dir)
            .await
            .with_context(|| format!("Failed to create {:?}", work_dir))?;

        let raw_path = self
            .transcoder
            .export_frames(&frames, pipeline.fps(), work_dir)
            .await?;
        let playable_path = self
            .transcoder
            .convert_to_h264(&raw_path, &work_dir.join(PLAYABLE_FILE))
            .await?;

        let size_bytes = tokio::fs::metadata(&playable_path)
            .await
            .with_context(|| format!("Converted video missing at {:?}", playable_path))?
            .len();

        Ok(Artifact::Video {
            raw_path,
            playable_path,
            size_bytes,
        })
    }

    /// Drop the session's result and any files written for it. Waits for
    /// an in-flight generation so its output is not deleted mid-write.
    pub async fn clear(&self, session_id: &str) -> SessionSnapshot {
        let _busy = self.busy.lock().await;
        self.sessions.clear(session_id);
        self.remove_session_files(session_id).await;
        self.sessions.snapshot(session_id)
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
