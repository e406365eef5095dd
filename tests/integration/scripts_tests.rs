//! Script selection and argument frame tests through the full router.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

use sd_bridge::scripts::ScriptKind;

use super::test_utils::{body_json, build_router, png_base64, post_json, txt2img_body, MockEngine};

/// Two txt2img scripts: frame is [selector, loops, denoise, x_type, x_values, grid].
fn engine_with_scripts() -> MockEngine {
    MockEngine::new()
        .with_images(3)
        .with_script(
            ScriptKind::Txt2Img,
            "Loopback",
            &[("loops", json!(4)), ("denoising_strength_change_factor", json!(1.0))],
        )
        .with_script(
            ScriptKind::Txt2Img,
            "X/Y plot",
            &[
                ("x_type", json!("Seed")),
                ("x_values", json!("")),
                ("draw_legend", json!(true)),
            ],
        )
        .with_script(
            ScriptKind::Img2Img,
            "SD upscale",
            &[("overlap", json!(64)), ("upscaler_index", json!(0))],
        )
}

#[tokio::test]
async fn test_no_script_frame_holds_defaults() {
    let engine = engine_with_scripts();
    let router = build_router(engine.clone());

    let response = router
        .oneshot(post_json("/txt2img", &txt2img_body(json!({}))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = engine.txt2img_calls().await;
    assert_eq!(
        calls[0].args.as_slice(),
        &[json!(0), json!(4), json!(1.0), json!("Seed"), json!(""), json!(true)]
    );
}

#[tokio::test]
async fn test_positional_args_fill_selected_slots() {
    let engine = engine_with_scripts();
    let router = build_router(engine.clone());

    let body = txt2img_body(json!({
        "script": "X/Y plot",
        "script_args": ["Steps", "10,20,30", false],
    }));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = engine.txt2img_calls().await;
    let frame = &calls[0].args;
    assert_eq!(frame.selected_index(), 2);
    assert_eq!(
        frame.as_slice(),
        &[json!(2), json!(4), json!(1.0), json!("Steps"), json!("10,20,30"), json!(false)]
    );
}

#[tokio::test]
async fn test_named_args_follow_declared_order() {
    let engine = engine_with_scripts();
    let router = build_router(engine.clone());

    let body = txt2img_body(json!({
        "script": "Loopback",
        "script_args": {"denoising_strength_change_factor": 0.9, "loops": 2},
    }));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = engine.txt2img_calls().await;
    assert_eq!(calls[0].args.get(0), Some(&json!(1)));
    assert_eq!(calls[0].args.get(1), Some(&json!(2)));
    assert_eq!(calls[0].args.get(2), Some(&json!(0.9)));
    assert_eq!(calls[0].args.get(3), Some(&json!("Seed")));
}

#[tokio::test]
async fn test_script_keeps_first_image() {
    let router = build_router(engine_with_scripts());

    let body = txt2img_body(json!({"script": "Loopback", "script_args": [3, 1.0]}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();

    let json = body_json(response).await;
    assert_eq!(json["outputs"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_script_not_found() {
    let engine = engine_with_scripts();
    let router = build_router(engine.clone());

    let body = txt2img_body(json!({"script": "Prompt matrix"}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "script_not_found");
    assert_eq!(json["status"], 404);
    assert!(engine.txt2img_calls().await.is_empty());
}

#[tokio::test]
async fn test_wrong_arity_rejected() {
    let engine = engine_with_scripts();
    let router = build_router(engine.clone());

    let body = txt2img_body(json!({"script": "Loopback", "script_args": [3]}));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "argument_arity_mismatch");
    assert!(engine.txt2img_calls().await.is_empty());
}

#[tokio::test]
async fn test_unknown_named_arg_rejected() {
    let router = build_router(engine_with_scripts());

    let body = txt2img_body(json!({
        "script": "Loopback",
        "script_args": {"loops": 2, "strength": 0.5},
    }));
    let response = router.oneshot(post_json("/txt2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "argument_arity_mismatch");
}

#[tokio::test]
async fn test_registries_are_independent() {
    let engine = engine_with_scripts();
    let router = build_router(engine.clone());

    // A txt2img script name is unknown to img2img
    let body = json!({"src_img": png_base64(32, 32), "script": "Loopback"});
    let response = router
        .clone()
        .oneshot(post_json("/img2img", &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = json!({"src_img": png_base64(32, 32)});
    let response = router.oneshot(post_json("/img2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = engine.img2img_calls().await;
    assert_eq!(calls[0].args.as_slice(), &[json!(0), json!(64), json!(0)]);
}

#[tokio::test]
async fn test_sd_upscale_uses_square_tile() {
    let engine = engine_with_scripts();
    let router = build_router(engine.clone());

    let body = json!({
        "src_img": png_base64(300, 100),
        "script": "SD upscale",
        "script_args": [32, 1],
        "base_size": 384,
    });
    let response = router.oneshot(post_json("/img2img", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["outputs"].as_array().unwrap().len(), 3);

    let calls = engine.img2img_calls().await;
    assert_eq!((calls[0].sampling.width, calls[0].sampling.height), (384, 384));
    assert_eq!(calls[0].args.as_slice(), &[json!(1), json!(32), json!(1)]);
}
