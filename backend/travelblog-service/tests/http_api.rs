//! HTTP surface: routing, auth guard, multipart compose, error rendering.

mod common;

use actix_web::{http::StatusCode, test, web, App};
use common::test_config;
use serde_json::{json, Value};
use std::sync::Arc;
use travelblog_service::storage::MemoryObjectStorage;
use travelblog_service::store::MemoryDocumentStore;
use travelblog_service::{configure, AppState};

const BOUNDARY: &str = "travelblog-test-boundary";

fn state() -> web::Data<AppState> {
    let config = test_config();
    let store = Arc::new(MemoryDocumentStore::new());
    let storage = Arc::new(MemoryObjectStorage::new(
        config.storage.public_base_url.clone(),
    ));
    web::Data::new(AppState::new(store, storage, &config))
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(App::new().configure(configure($state.clone()))).await
    };
}

/// Register an account and return its bearer token.
macro_rules! sign_up {
    ($app:expr, $email:expr, $name:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/v1/auth/sign-up")
            .set_json(json!({
                "email": $email,
                "password": "island-hopper",
                "confirmPassword": "island-hopper",
                "displayName": $name,
                "photoUrl": "https://img.example/me.png",
            }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        body["token"].as_str().expect("token in sign-up response").to_string()
    }};
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// Multipart body with text fields plus an optional file part.
fn compose_body(text: &str, region: &str, image: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in [("text", text), ("region", region)] {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn compose_request(token: &str, body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/api/v1/posts")
        .insert_header(bearer(token))
        .insert_header((
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        ))
        .set_payload(body)
}

#[actix_web::test]
async fn health_and_liveness_are_public() {
    let state = state();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/health/live").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn api_requires_a_bearer_token() {
    let state = state();
    let app = app!(state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/v1/feed").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/v1/feed")
        .insert_header(bearer("garbage"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 401);
}

#[actix_web::test]
async fn sign_up_validation_errors_render_as_bad_request() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/sign-up")
        .set_json(json!({
            "email": "ana@travelblog.dev",
            "password": "island-hopper",
            "confirmPassword": "something-else",
            "displayName": "Ana",
            "photoUrl": "https://img.example/ana.png",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation error: Passwords do not match.");
    assert_eq!(body["status"], 400);
}

#[actix_web::test]
async fn sign_in_me_and_sign_out() {
    let state = state();
    let app = app!(state);
    sign_up!(app, "ana@travelblog.dev", "Ana");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/sign-in")
        .set_json(json!({ "email": "ana@travelblog.dev", "password": "wrong-one" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/sign-in")
        .set_json(json!({ "email": "ana@travelblog.dev", "password": "island-hopper" }))
        .to_request();
    let session: Value = test::call_and_read_body_json(&app, req).await;
    let token = session["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["displayName"], "Ana");
    assert_eq!(me["email"], "ana@travelblog.dev");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/sign-out")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn duplicate_sign_up_is_a_conflict() {
    let state = state();
    let app = app!(state);
    sign_up!(app, "ana@travelblog.dev", "Ana");

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/sign-up")
        .set_json(json!({
            "email": "Ana@TravelBlog.dev",
            "password": "island-hopper",
            "confirmPassword": "island-hopper",
            "displayName": "Ana Again",
            "photoUrl": "https://img.example/ana.png",
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn compose_like_comment_and_read_back() {
    let state = state();
    let app = app!(state);
    let ana = sign_up!(app, "ana@travelblog.dev", "Ana");
    let ben = sign_up!(app, "ben@travelblog.dev", "Ben");

    let body = compose_body(
        "Beach day!",
        "Visayas",
        Some(("beach.png", "image/png", &b"\x89PNG\r\n\x1a\n"[..])),
    );
    let resp = test::call_service(&app, compose_request(&ana, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let post: Value = test::read_body_json(resp).await;
    let post_id = post["id"].as_str().unwrap().to_string();
    assert_eq!(post["region"], "Visayas");
    assert_eq!(post["authorName"], "Ana");
    assert_eq!(post["likedByViewer"], false);

    // The image is served back from the media route.
    let image_url = post["imageUrl"].as_str().unwrap();
    let path = image_url.trim_start_matches("http://localhost:8080");
    let resp = test::call_service(&app, test::TestRequest::get().uri(path).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "image/png");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/like", post_id))
        .insert_header(bearer(&ben))
        .to_request();
    let liked: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(liked["upvoteCount"], 1);
    assert_eq!(liked["likedByViewer"], true);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/posts/{}/comments", post_id))
        .insert_header(bearer(&ben))
        .set_json(json!({ "text": "  Jealous!  " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let comment: Value = test::read_body_json(resp).await;
    assert_eq!(comment["text"], "Jealous!");
    assert_eq!(comment["authorName"], "Ben");

    let req = test::TestRequest::get()
        .uri("/api/v1/feed")
        .insert_header(bearer(&ana))
        .to_request();
    let feed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(feed["stale"], false);
    let first = &feed["posts"][0];
    assert_eq!(first["id"], post_id.as_str());
    assert_eq!(first["likedByViewer"], false);
    assert_eq!(first["comments"][0]["text"], "Jealous!");

    let req = test::TestRequest::get()
        .uri("/api/v1/tags/visayas")
        .insert_header(bearer(&ana))
        .to_request();
    let tag: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(tag["region"], "Visayas");
    assert_eq!(tag["postIds"], json!([post_id]));
}

#[actix_web::test]
async fn compose_without_image_is_rejected() {
    let state = state();
    let app = app!(state);
    let ana = sign_up!(app, "ana@travelblog.dev", "Ana");

    let body = compose_body("Beach day!", "Visayas", None);
    let resp = test::call_service(&app, compose_request(&ana, body).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation error: Please select an image");

    assert!(state.feed.cached_feed().await.is_empty());
}

#[actix_web::test]
async fn only_the_author_can_delete_and_my_posts_counts_likes() {
    let state = state();
    let app = app!(state);
    let ana = sign_up!(app, "ana@travelblog.dev", "Ana");
    let ben = sign_up!(app, "ben@travelblog.dev", "Ben");

    let mut ids = Vec::new();
    for text in ["Intramuros", "Banaue"] {
        let body = compose_body(text, "Luzon", Some(("p.jpg", "image/jpeg", &b"jpeg"[..])));
        let post: Value =
            test::call_and_read_body_json(&app, compose_request(&ana, body).to_request()).await;
        ids.push(post["id"].as_str().unwrap().to_string());
    }
    for token in [&ana, &ben] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/posts/{}/like", ids[0]))
            .insert_header(bearer(token))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri("/api/v1/my-posts")
        .insert_header(bearer(&ana))
        .to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine["stats"], json!({ "totalPosts": 2, "totalLikes": 2 }));

    let req = test::TestRequest::get()
        .uri("/api/v1/my-posts")
        .insert_header(bearer(&ben))
        .to_request();
    let theirs: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(theirs["posts"], json!([]));

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/posts/{}", ids[1]))
        .insert_header(bearer(&ben))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/posts/{}", ids[1]))
        .insert_header(bearer(&ana))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/posts/{}", ids[1]))
        .insert_header(bearer(&ana))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_region_is_a_validation_error() {
    let state = state();
    let app = app!(state);
    let ana = sign_up!(app, "ana@travelblog.dev", "Ana");

    let req = test::TestRequest::get()
        .uri("/api/v1/tags/cebu")
        .insert_header(bearer(&ana))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn metrics_expose_feed_counters() {
    let state = state();
    let app = app!(state);
    let ana = sign_up!(app, "ana@travelblog.dev", "Ana");

    let req = test::TestRequest::get()
        .uri("/api/v1/feed")
        .insert_header(bearer(&ana))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let body = test::call_and_read_body(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("feed_operations_total"));
    assert!(text.contains("feed_fetch_duration_seconds"));
}

#[actix_web::test]
async fn inline_photo_sign_up_yields_a_header_sized_token() {
    let state = state();
    let app = app!(state);
    let photo = format!("data:image/jpeg;base64,{}", "A".repeat(100_000));

    let req = test::TestRequest::post()
        .uri("/api/v1/auth/sign-up")
        .set_json(json!({
            "email": "ana@travelblog.dev",
            "password": "island-hopper",
            "confirmPassword": "island-hopper",
            "displayName": "Ana",
            "photoUrl": photo,
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert!(token.len() < 1024, "token is {} bytes", token.len());

    let req = test::TestRequest::get()
        .uri("/api/v1/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let me: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(me["photoUrl"], photo.as_str());
}
