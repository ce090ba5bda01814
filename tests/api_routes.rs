mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{harness, FakeImage};
use synoid_forge::server::{self, SESSION_COOKIE};
use synoid_forge::session::{Artifact, SessionSnapshot, SessionStore};
use tower::ServiceExt;

async fn body_bytes(res: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

fn session_cookie(res: &axum::response::Response) -> String {
    let raw = res
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie")
        .to_str()
        .unwrap();
    raw.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_index_serves_page() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::create_router(harness(dir.path(), FakeImage::new()).state);

    let res = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(res).await).unwrap();
    assert!(html.contains("Media Generator"));
}

#[tokio::test]
async fn test_new_visitor_gets_session_cookie() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::create_router(harness(dir.path(), FakeImage::new()).state);

    let res = app
        .oneshot(Request::builder().uri("/api/session").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = session_cookie(&res);
    assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));

    let snapshot: SessionSnapshot = serde_json::from_slice(&body_bytes(res).await).unwrap();
    assert!(snapshot.output.is_none());
}

#[tokio::test]
async fn test_output_is_404_before_generation() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::create_router(harness(dir.path(), FakeImage::new()).state);

    for uri in ["/api/output/image", "/api/output/video"] {
        let res = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_generate_then_download_image() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::create_router(harness(dir.path(), FakeImage::new()).state);

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt":"un zorro","media_type":"Image"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = session_cookie(&res);
    let snapshot: SessionSnapshot = serde_json::from_slice(&body_bytes(res).await).unwrap();
    assert_eq!(snapshot.last_prompt.as_deref(), Some("UN ZORRO"));

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/output/image?download=true")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        res.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"generated_image.png\""
    );
    let png = body_bytes(res).await;
    assert_eq!(&png[..4], b"\x89PNG");

    // Another browser does not see it.
    let res = app
        .clone()
        .oneshot(Request::builder().uri("/api/output/image").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Clearing drops it for the owner too.
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/session")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/output/image")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_rejects_zero_length_video() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::create_router(harness(dir.path(), FakeImage::new()).state);

    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"prompt":"waves","media_type":"Video","video_length":0}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_rejects_zero_length_for_image_too() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), FakeImage::new());
    let app = server::create_router(h.state.clone());

    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"prompt":"a fox","media_type":"Image","video_length":0}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(h.image.prompts.lock().unwrap().is_empty());
    assert!(h.state.sessions().is_empty());
}

#[tokio::test]
async fn test_cookieless_reads_do_not_create_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), FakeImage::new());
    let app = server::create_router(h.state.clone());

    for _ in 0..20 {
        let res = app
            .clone()
            .oneshot(Request::builder().uri("/api/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(h.state.sessions().len(), 0);
}

#[tokio::test]
async fn test_download_existing_video() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), FakeImage::new());
    let app = server::create_router(h.state.clone());

    let id = SessionStore::new_session_id();
    let playable_path = dir.path().join("clip.mp4");
    std::fs::write(&playable_path, b"not really h264").unwrap();
    h.state.sessions().with(&id, |s| {
        s.begin("waves");
        s.complete(Artifact::Video {
            raw_path: dir.path().join("raw.mp4"),
            playable_path: playable_path.clone(),
            size_bytes: 15,
        });
    });
    let cookie = format!("{}={}", SESSION_COOKIE, id);

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/output/video?download=true")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        res.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"generated_video.mp4\""
    );
    assert!(res.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_bytes(res).await, b"not really h264");

    // Inline playback has no attachment header.
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/output/video")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get(header::CONTENT_DISPOSITION).is_none());
}

#[tokio::test]
async fn test_pipeline_failure_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::create_router(harness(dir.path(), FakeImage::failing()).state);

    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"prompt":"anything"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let text = String::from_utf8(body_bytes(res).await).unwrap();
    assert!(text.contains("out of memory"));
}

#[tokio::test]
async fn test_translate_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::create_router(harness(dir.path(), FakeImage::new()).state);

    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/translate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"text":"hola"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
    assert_eq!(body["text"], "HOLA");
}

#[tokio::test]
async fn test_health_reports_loaded_models() {
    let dir = tempfile::tempdir().unwrap();
    let app = server::create_router(harness(dir.path(), FakeImage::new()).state);

    let res = app
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(res).await).unwrap();
    assert_eq!(body["models"]["image_loaded"], true);
    assert_eq!(body["models"]["video_model"], "fake/video");
}
