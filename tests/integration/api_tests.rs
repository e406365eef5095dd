//! API integration tests for the generation endpoints.
//!
//! Tests verify:
//! - Health and capability documents
//! - txt2img, img2img and upscale through the full router
//! - Defaults layering and sample persistence
//! - HTTP status codes and error bodies

use axum::http::StatusCode;
use image::GenericImageView;
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;

use sd_bridge::error::EngineError;
use sd_bridge::scripts::ScriptKind;
use sd_bridge::{PersistedConfig, RouterConfig};

use super::test_utils::{
    body_json, build_router, build_router_with, decode_output, get, mask_base64, png_base64,
    post_json, txt2img_body, MockEngine,
};

// =============================================================================
// Health and Config
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let router = build_router(MockEngine::new());

    let response = router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_config_document() {
    let engine = MockEngine::new()
        .with_script(ScriptKind::Txt2Img, "Loopback", &[("loops", json!(4))])
        .with_script(ScriptKind::Img2Img, "SD upscale", &[("overlap", json!(64))]);
    let defaults: PersistedConfig = serde_json::from_value(json!({
        "plugin": {"sample_path": "/srv/samples", "show_previews": true}
    }))
    .unwrap();
    let router = build_router_with(engine, defaults, RouterConfig::new());

    let response = router.oneshot(get("/config")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["show_previews"], true);
    assert_eq!(json["sample_path"], "/srv/samples");
    assert_eq!(json["samplers"][2], "DDIM");
    assert_eq!(json["samplers_img2img"].as_array().unwrap().len(), 2);
    assert_eq!(json["upscalers"][0], "None");
    assert_eq!(json["face_restorers"][0], "CodeFormer");
    assert_eq!(json["sd_models"].as_array().unwrap().len(), 1);
    assert_eq!(json["scripts_txt2img"][0]["name"], "Loopback");
    assert_eq!(json["scripts_txt2img"][0]["args"][0]["default"], 4);
    assert_eq!(json["scripts_img2img"][0]["name"], "SD upscale");
}

// =============================================================================
// txt2img
// =============================================================================

#[tokio::test]
async fn test_txt2img_success() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let body = txt2img_body(json!({"orig_width": 640, "orig_height": 480, "sampler_name": "DDIM"}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let outputs = json["outputs"].as_array().unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(decode_output(&outputs[0]).dimensions(), (640, 480));
    assert!(json["info"].as_str().unwrap().contains("seed"));

    let calls = engine.txt2img_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].sampling.prompt, "a watercolor fox");
    assert_eq!(calls[0].sampling.sampler_index, 2);
    // 640x480 at base 512, max 768: short side 512, long side round(512 * 4/3)
    assert_eq!((calls[0].sampling.width, calls[0].sampling.height), (683, 512));
}

#[tokio::test]
async fn test_txt2img_long_side_clamped() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let body = txt2img_body(json!({"orig_width": 2000, "orig_height": 1000}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = engine.txt2img_calls().await;
    assert_eq!((calls[0].sampling.width, calls[0].sampling.height), (768, 384));
}

#[tokio::test]
async fn test_txt2img_grid_stripped_from_batch() {
    let router = build_router(MockEngine::new().with_images(3));

    let body = txt2img_body(json!({"batch_size": 2}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();

    let json = body_json(response).await;
    assert_eq!(json["outputs"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_txt2img_grid_kept_when_requested() {
    let router = build_router(MockEngine::new().with_images(3));

    let body = txt2img_body(json!({"batch_size": 2, "include_grid": true}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();

    let json = body_json(response).await;
    assert_eq!(json["outputs"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_txt2img_empty_body_uses_defaults() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/txt2img")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = engine.txt2img_calls().await;
    assert_eq!(calls[0].sampling.steps, 20);
    assert_eq!((calls[0].sampling.width, calls[0].sampling.height), (512, 512));
}

#[tokio::test]
async fn test_persisted_defaults_under_request_fields() {
    let engine = MockEngine::new();
    let defaults: PersistedConfig = serde_json::from_value(json!({
        "txt2img": {"steps": 42, "cfg_scale": 9.5, "negative_prompt": "blurry"}
    }))
    .unwrap();
    let router = build_router_with(engine.clone(), defaults, RouterConfig::new());

    let body = txt2img_body(json!({"cfg_scale": 5.0, "negative_prompt": null}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = engine.txt2img_calls().await;
    assert_eq!(calls[0].sampling.steps, 42);
    assert_eq!(calls[0].sampling.cfg_scale, 5.0);
    assert_eq!(calls[0].sampling.negative_prompt, "blurry");
}

#[tokio::test]
async fn test_txt2img_saves_samples() {
    let tmp = tempfile::tempdir().unwrap();
    let sample_dir = tmp.path().join("krita");
    let defaults: PersistedConfig = serde_json::from_value(json!({
        "txt2img": {"sample_path": sample_dir.to_str().unwrap()}
    }))
    .unwrap();
    let router = build_router_with(MockEngine::new().with_images(3), defaults, RouterConfig::new());

    let body = txt2img_body(json!({"save_samples": true}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Samples are written in the background
    let mut saved = 0;
    for _ in 0..100 {
        saved = std::fs::read_dir(&sample_dir).map(|d| d.count()).unwrap_or(0);
        if saved == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(saved, 2);
}

// =============================================================================
// img2img
// =============================================================================

#[tokio::test]
async fn test_img2img_returns_source_size() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let body = json!({"src_img": png_base64(300, 900), "prompt": "oil painting"});
    let response = router.oneshot(post_json("/img2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(decode_output(&json["outputs"][0]).dimensions(), (300, 900));

    let calls = engine.img2img_calls().await;
    assert_eq!((calls[0].sampling.width, calls[0].sampling.height), (256, 768));
    assert_eq!(calls[0].init_image.dimensions(), (300, 900));
}

#[tokio::test]
async fn test_img2img_inpaint_recomposes_mask() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let body = json!({
        "src_img": png_base64(64, 64),
        "mask_img": mask_base64(64, 64, 180),
        "mode": 1,
    });
    let response = router.oneshot(post_json("/img2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let output = decode_output(&json["outputs"][0]);
    assert_eq!(output.dimensions(), (64, 64));
    let rgba = output.to_rgba8();
    assert_eq!(rgba.get_pixel(10, 10)[3], 180);

    let calls = engine.img2img_calls().await;
    assert_eq!(calls[0].mode, 1);
    assert_eq!(calls[0].mask_mode, 1);
    assert!(calls[0].mask.is_some());
}

#[tokio::test]
async fn test_img2img_inpaint_inverted_mask() {
    let router = build_router(MockEngine::new());

    let body = json!({
        "src_img": png_base64(16, 16),
        "mask_img": mask_base64(16, 16, 180),
        "mode": 1,
        "invert_mask": true,
    });
    let response = router.oneshot(post_json("/img2img", &body)).await.unwrap();

    let json = body_json(response).await;
    let rgba = decode_output(&json["outputs"][0]).to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0)[3], 75);
}

#[tokio::test]
async fn test_img2img_mask_ignored_outside_inpaint() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let body = json!({"src_img": png_base64(16, 16), "mask_img": mask_base64(16, 16, 0)});
    let response = router.oneshot(post_json("/img2img", &body)).await.unwrap();

    let json = body_json(response).await;
    assert!(!decode_output(&json["outputs"][0]).color().has_alpha());
    assert!(engine.img2img_calls().await[0].mask.is_none());
}

#[tokio::test]
async fn test_img2img_missing_source() {
    let router = build_router(MockEngine::new());

    let response = router
        .oneshot(post_json("/img2img", &json!({"prompt": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_img2img_undecodable_source() {
    let router = build_router(MockEngine::new());

    let response = router
        .oneshot(post_json("/img2img", &json!({"src_img": "bm90IGFuIGltYWdl"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_image");
}

// =============================================================================
// upscale
// =============================================================================

#[tokio::test]
async fn test_upscale_resizes_to_original() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let body = json!({"src_img": png_base64(50, 40), "upscaler_name": "ESRGAN_4x", "downscale_first": true});
    let response = router.oneshot(post_json("/upscale", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(decode_output(&json["output"]).dimensions(), (50, 40));
    assert_eq!(engine.upscale_count(), 1);
}

#[tokio::test]
async fn test_upscale_none_skips_engine() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let body = json!({"src_img": png_base64(50, 40), "upscaler_name": "None"});
    let response = router.oneshot(post_json("/upscale", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(decode_output(&json["output"]).dimensions(), (50, 40));
    assert_eq!(engine.upscale_count(), 0);
}

#[tokio::test]
async fn test_upscale_saves_single_sample() {
    let tmp = tempfile::tempdir().unwrap();
    let defaults: PersistedConfig = serde_json::from_value(json!({
        "upscale": {"sample_path": tmp.path().to_str().unwrap(), "upscaler_name": "Lanczos"}
    }))
    .unwrap();
    let engine = MockEngine::new();
    let router = build_router_with(engine.clone(), defaults, RouterConfig::new());

    let body = json!({"src_img": png_base64(8, 8), "save_samples": true});
    let response = router.oneshot(post_json("/upscale", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(engine.upscale_count(), 1);

    let mut names = Vec::new();
    for _ in 0..100 {
        names = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        if !names.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".png"));
    assert!(!names[0].contains('_'));
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_malformed_json() {
    let router = build_router(MockEngine::new());

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/txt2img")
        .body(axum::body::Body::from("{\"prompt\": "))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert!(json["message"].as_str().unwrap().contains("JSON"));
}

#[tokio::test]
async fn test_wrong_field_type() {
    let router = build_router(MockEngine::new());

    let response = router
        .oneshot(post_json("/txt2img", &json!({"steps": "many"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_engine_failure_is_server_error() {
    let engine = MockEngine::new().failing(EngineError::Status {
        status: 503,
        message: "CUDA out of memory".to_string(),
    });
    let router = build_router(engine);

    let response = router
        .oneshot(post_json("/txt2img", &txt2img_body(json!({}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let json = body_json(response).await;
    assert_eq!(json["error"], "engine_error");
    assert!(json["message"].as_str().unwrap().contains("CUDA out of memory"));
}

#[tokio::test]
async fn test_engine_empty_result_is_server_error() {
    let router = build_router(MockEngine::new().with_images(0));

    let response = router
        .oneshot(post_json("/txt2img", &txt2img_body(json!({}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "engine_error");
}

#[tokio::test]
async fn test_unknown_route() {
    let router = build_router(MockEngine::new());
    let response = router.oneshot(get("/extras")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_txt2img_zero_target_size() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let body = txt2img_body(json!({"orig_width": 0, "orig_height": 512}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_request");
    assert!(engine.txt2img_calls().await.is_empty());
}

#[tokio::test]
async fn test_txt2img_oversized_target_size() {
    let engine = MockEngine::new();
    let router = build_router(engine.clone());

    let body = txt2img_body(json!({"orig_width": u32::MAX, "orig_height": u32::MAX}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_request");
    assert!(json["message"].as_str().unwrap().contains("exceeds"));
    assert!(engine.txt2img_calls().await.is_empty());
}
