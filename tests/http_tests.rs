// Integration tests for the HTTP surface (stable contract).

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use echoscript::models::ModelContext;
use echoscript::pipeline::{PipelineOptions, TranscriptionPipeline};
use echoscript::{create_router, AppState, Config};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn loading_state() -> AppState {
    AppState::new(Arc::new(Config::default()))
}

async fn ready_state() -> Result<AppState> {
    let cfg = Arc::new(Config::default());
    let state = AppState::new(Arc::clone(&cfg));

    let ctx = ModelContext::from_config(&cfg.models).await?;
    let pipeline = TranscriptionPipeline::new(Arc::new(ctx), PipelineOptions::from_config(&cfg))?;
    state.set_ready(Arc::new(pipeline)).await;

    Ok(state)
}

fn multipart_request(fields: &[(&str, &str)]) -> Request<Body> {
    let boundary = "test-boundary";
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{boundary}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/asr/transcribe")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_reports_loading_before_models_are_up() -> Result<()> {
    let router = create_router(loading_state());

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await?;
    assert_eq!(json["status"], "loading");
    assert_eq!(json["device"], "cpu");
    Ok(())
}

#[tokio::test]
async fn health_reports_ready_after_models_load() -> Result<()> {
    let router = create_router(ready_state().await?);

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;

    let json = body_json(response).await?;
    assert_eq!(json["status"], "ready");
    Ok(())
}

#[tokio::test]
async fn models_snapshot_mirrors_configuration() -> Result<()> {
    let router = create_router(loading_state());

    let response = router
        .oneshot(Request::builder().uri("/models").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await?;
    assert_eq!(json["asr_model"], "paraformer-zh");
    assert_eq!(json["vad_model"], "energy-vad");
    assert_eq!(json["enable_spk"], true);
    assert_eq!(json["spk_model"], "cam++");
    Ok(())
}

#[tokio::test]
async fn transcribe_before_ready_is_rejected_with_503() -> Result<()> {
    let router = create_router(loading_state());

    let response = router
        .oneshot(multipart_request(&[("language", "auto")]))
        .await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await?;
    assert_eq!(json["detail"], "Model is not ready");
    Ok(())
}

#[tokio::test]
async fn transcribe_without_a_source_is_a_400() -> Result<()> {
    let router = create_router(ready_state().await?);

    let response = router
        .oneshot(multipart_request(&[("language", "auto")]))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await?;
    assert!(json["detail"].as_str().unwrap().contains("audio_url"));
    Ok(())
}

#[tokio::test]
async fn unknown_form_fields_are_ignored_not_rejected() -> Result<()> {
    let router = create_router(ready_state().await?);

    // Still a 400 (no source), but the unknown field itself must not be the
    // reason for rejection.
    let response = router
        .oneshot(multipart_request(&[("future_field", "whatever")]))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await?;
    assert!(json["detail"].as_str().unwrap().contains("'file' or 'audio_url'"));
    Ok(())
}
