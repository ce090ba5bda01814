// SYNOID Forge Session State
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Per-browser transient state. Nothing here outlives the process.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "Image"),
            MediaKind::Video => write!(f, "Video"),
        }
    }
}

/// A finished generation.
#[derive(Debug, Clone)]
pub enum Artifact {
    Image {
        png: Arc<Vec<u8>>,
        width: u32,
        height: u32,
    },
    Video {
        /// What the pipeline export produced.
        raw_path: PathBuf,
        /// H.264 conversion of `raw_path`, the file that gets served.
        playable_path: PathBuf,
        /// Size of `playable_path`, read once when the conversion finished.
        size_bytes: u64,
    },
}

impl Artifact {
    pub fn kind(&self) -> MediaKind {
        match self {
            Artifact::Image { .. } => MediaKind::Image,
            Artifact::Video { .. } => MediaKind::Video,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub current_prompt: Option<String>,
    pub last_prompt: Option<String>,
    pub media_kind: MediaKind,
    pub video_length: u32,
    artifact: Option<Artifact>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            current_prompt: None,
            last_prompt: None,
            media_kind: MediaKind::Image,
            video_length: 1,
            artifact: None,
        }
    }
}

impl SessionState {
    /// A generate click: record the prompt and drop whatever was shown before.
    pub fn begin(&mut self, prompt: &str) {
        self.current_prompt = Some(prompt.to_string());
        self.artifact = None;
    }

    pub fn complete(&mut self, artifact: Artifact) {
        self.media_kind = artifact.kind();
        self.artifact = Some(artifact);
        self.last_prompt = self.current_prompt.clone();
    }

    pub fn clear(&mut self) {
        self.current_prompt = None;
        self.last_prompt = None;
        self.artifact = None;
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let output = self.artifact.as_ref().map(|a| match a {
            Artifact::Image { png, width, height } => OutputInfo {
                media_type: MediaKind::Image,
                url: "/api/output/image".to_string(),
                download_url: "/api/output/image?download=true".to_string(),
                width: Some(*width),
                height: Some(*height),
                size_bytes: png.len() as u64,
            },
            Artifact::Video { size_bytes, .. } => OutputInfo {
                media_type: MediaKind::Video,
                url: "/api/output/video".to_string(),
                download_url: "/api/output/video?download=true".to_string(),
                width: None,
                height: None,
                size_bytes: *size_bytes,
            },
        });

        SessionSnapshot {
            current_prompt: self.current_prompt.clone(),
            last_prompt: self.last_prompt.clone(),
            media_type: self.media_kind,
            video_length: self.video_length,
            output,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub current_prompt: Option<String>,
    pub last_prompt: Option<String>,
    pub media_type: MediaKind,
    pub video_length: u32,
    pub output: Option<OutputInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputInfo {
    pub media_type: MediaKind,
    pub url: String,
    pub download_url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: u64,
}

/// All live sessions, keyed by the id stored in the browser cookie.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_session_id() -> String {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Session ids end up in filesystem paths, so only accept our own format.
    pub fn is_valid_id(id: &str) -> bool {
        id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Run `f` against the session, creating it on first touch.
    pub fn with<R>(&self, id: &str, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        let state = sessions.entry(id.to_string()).or_default();
        f(state)
    }

    /// Snapshot of the session, or of a blank one if `id` was never used.
    /// Reading never creates an entry.
    pub fn snapshot(&self, id: &str) -> SessionSnapshot {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(id) {
            Some(state) => state.snapshot(),
            None => SessionState::default().snapshot(),
        }
    }

    /// Clear an existing session. Unknown ids are left alone.
    pub fn clear(&self, id: &str) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = sessions.get_mut(id) {
            state.clear();
        }
    }

    pub fn artifact(&self, id: &str) -> Option<Artifact> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.get(id).and_then(|s| s.artifact().cloned())
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
