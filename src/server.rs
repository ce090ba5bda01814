use anyhow::Result;
use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt; // For oneshot
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::generator::{GenerateRequest, InvalidRequest};
use crate::pipelines::registry::ModelStatus;
use crate::session::{Artifact, SessionStore};
use crate::state::ForgeState;

pub type AppState = Arc<ForgeState>;

pub const SESSION_COOKIE: &str = "forge_session";
pub const IMAGE_FILENAME: &str = "generated_image.png";
pub const VIDEO_FILENAME: &str = "generated_video.mp4";

const INDEX_HTML: &str = include_str!("../dashboard/index.html");

#[derive(Deserialize, Serialize)]
pub struct TranslateBody {
    pub text: String,
}

#[derive(Deserialize, Default)]
pub struct OutputParams {
    #[serde(default)]
    pub download: bool,
}

#[derive(Serialize)]
pub struct HealthReport {
    pub ffmpeg: bool,
    pub models: ModelStatus,
    pub sessions: usize,
    pub uptime_secs: u64,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/session", get(get_session).delete(clear_session))
        .route("/api/translate", post(translate))
        .route("/api/generate", post(generate))
        .route("/api/output/image", get(output_image))
        .route("/api/output/video", get(output_video))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

pub async fn start_server(port: u16, state: AppState) -> Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let display_addr = if addr.ip().is_unspecified() {
        format!("127.0.0.1:{}", port)
    } else {
        addr.to_string()
    };
    info!("🚀 SYNOID Forge running on http://{}", display_addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Session id from the cookie header, or a fresh one when it is missing or
/// not in our format. The flag is true for fresh ids.
pub fn resolve_session(headers: &HeaderMap) -> (String, bool) {
    let existing = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE).then(|| value.to_string())
        })
        .find(|id| SessionStore::is_valid_id(id));

    match existing {
        Some(id) => (id, false),
        None => (SessionStore::new_session_id(), true),
    }
}

fn with_cookie(mut res: Response, id: &str, fresh: bool) -> Response {
    if fresh {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    res
}

fn error_response(err: anyhow::Error) -> Response {
    if let Some(invalid) = err.downcast_ref::<InvalidRequest>() {
        warn!("[SERVER] Rejected request: {}", invalid);
        return (StatusCode::BAD_REQUEST, invalid.to_string()).into_response();
    }
    error!("[SERVER] {:#}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {:#}", err)).into_response()
}

fn attachment(res: &mut Response, filename: &str) {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        res.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        ffmpeg: state.generator.transcoder().is_available().await,
        models: state.generator.registry().status(),
        sessions: state.sessions().len(),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}

async fn get_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, fresh) = resolve_session(&headers);
    let snapshot = state.sessions().snapshot(&id);
    with_cookie(Json(snapshot).into_response(), &id, fresh)
}

async fn clear_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, fresh) = resolve_session(&headers);
    let snapshot = state.generator.clear(&id).await;
    with_cookie(Json(snapshot).into_response(), &id, fresh)
}

async fn translate(
    State(state): State<AppState>,
    Json(body): Json<TranslateBody>,
) -> Response {
    match state.generator.translate_prompt(&body.text).await {
        Ok(text) => Json(TranslateBody { text }).into_response(),
        Err(e) => error_response(e),
    }
}

async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Response {
    let (id, fresh) = resolve_session(&headers);
    let res = match state.generator.generate(&id, req).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    };
    with_cookie(res, &id, fresh)
}

async fn output_image(
    State(state): State<AppState>,
    Query(params): Query<OutputParams>,
    headers: HeaderMap,
) -> Response {
    let (id, _) = resolve_session(&headers);
    let Some(Artifact::Image { png, .. }) = state.sessions().artifact(&id) else {
        return (StatusCode::NOT_FOUND, "No generated image").into_response();
    };

    let mut res = (
        [(header::CONTENT_TYPE, "image/png")],
        png.to_vec(),
    )
        .into_response();
    if params.download {
        attachment(&mut res, IMAGE_FILENAME);
    }
    res
}

async fn output_video(
    State(state): State<AppState>,
    Query(params): Query<OutputParams>,
    req: Request,
) -> Response {
    let (id, _) = resolve_session(req.headers());
    let Some(Artifact::Video { playable_path, .. }) = state.sessions().artifact(&id) else {
        return (StatusCode::NOT_FOUND, "No generated video").into_response();
    };

    if !playable_path.exists() {
        warn!("[SERVER] Converted video vanished: {:?}", playable_path);
        return StatusCode::NOT_FOUND.into_response();
    }

    // ServeFile handles Range requests, which <video> seeking relies on.
    let service = tower_http::services::ServeFile::new(playable_path);
    match service.oneshot(req).await {
        Ok(res) => {
            let mut res = res.into_response();
            if params.download {
                attachment(&mut res, VIDEO_FILENAME);
            }
            res
        }
        Err(err) => {
            error!("ServeFile error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
