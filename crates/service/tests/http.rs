//! Handler-level tests: each handler is invoked directly with a real
//! in-memory state, the way the router would call it.

use std::io::Cursor;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use service::http::api::v0::{asset, link, profile};
use service::http::{gw, health};
use service::{Config, ServiceState};

/// Two tiers, two owners: "basic" ({200}, no capabilities) holds "alice",
/// "premium" ({200, 400}, both capabilities) holds "bob".
async fn setup() -> ServiceState {
    let config = Config {
        data_dir: None,
        ..Config::default()
    };
    let state = ServiceState::from_config(&config).await.unwrap();

    let db = state.store().database();
    db.upsert_tier("basic", &[200], false, false).await.unwrap();
    db.upsert_tier("premium", &[200, 400], true, true)
        .await
        .unwrap();
    db.upsert_profile("alice", "basic").await.unwrap();
    db.upsert_profile("bob", "premium").await.unwrap();

    state
}

fn owner_headers(owner: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-owner", HeaderValue::from_str(owner).unwrap());
    headers
}

fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 160, 90, 255]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// Create an asset and reconcile it, as the upload handler does.
async fn seed_asset(state: &ServiceState, owner: &str, name: &str) {
    let bytes = png_fixture(400, 800);
    let asset = state
        .store()
        .create_asset(owner, name, &format!("{}.png", name), bytes)
        .await
        .unwrap();
    let tier = state.reconciler().tier_for_owner(owner).await.unwrap();
    state.reconciler().reconcile(&asset, &tier).await.unwrap();
}

#[tokio::test]
async fn test_original_download_gated_on_tier() {
    let state = setup().await;
    seed_asset(&state, "alice", "photo").await;
    seed_asset(&state, "bob", "photo").await;

    let response = asset::get::handler(
        State(state.clone()),
        owner_headers("alice"),
        Path("photo".to_string()),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = asset::get::handler(
        State(state.clone()),
        owner_headers("bob"),
        Path("photo".to_string()),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/png"
    );
}

#[tokio::test]
async fn test_thumbnail_serves_jpeg_only_for_tier_heights() {
    let state = setup().await;
    seed_asset(&state, "alice", "photo").await;

    let response = asset::thumbnail::handler(
        State(state.clone()),
        owner_headers("alice"),
        Path(("photo".to_string(), 200)),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );

    // 400 is premium-only; alice has no derived file there
    let response = asset::thumbnail::handler(
        State(state.clone()),
        owner_headers("alice"),
        Path(("photo".to_string(), 400)),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_reports_derived_heights() {
    let state = setup().await;
    seed_asset(&state, "bob", "photo").await;

    let response = asset::list::handler(State(state.clone()), owner_headers("bob"))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: asset::list::ListResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.assets.len(), 1);
    assert_eq!(parsed.assets[0].heights, vec![200, 400]);
}

#[tokio::test]
async fn test_delete_removes_asset() {
    let state = setup().await;
    seed_asset(&state, "bob", "photo").await;

    let response = asset::delete_asset::handler(
        State(state.clone()),
        owner_headers("bob"),
        Path("photo".to_string()),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let response = asset::get::handler(
        State(state.clone()),
        owner_headers("bob"),
        Path("photo".to_string()),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_owner_header_is_rejected() {
    let state = setup().await;

    let response = asset::list::handler(State(state.clone()), HeaderMap::new())
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_owner_header_with_separator_is_rejected() {
    let state = setup().await;

    // Owner ids become storage path segments; a separator could reach
    // into another owner's prefix.
    for bad in ["a/b", "a\\b", ".", ".."] {
        let response = asset::list::handler(State(state.clone()), owner_headers(bad))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_link_creation_checks_capability_and_duration() {
    let state = setup().await;
    seed_asset(&state, "alice", "photo").await;
    seed_asset(&state, "bob", "photo").await;

    let response = link::create::handler(
        State(state.clone()),
        owner_headers("alice"),
        axum::Json(link::create::CreateRequest {
            asset: "photo".to_string(),
            duration_secs: 600,
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = link::create::handler(
        State(state.clone()),
        owner_headers("bob"),
        axum::Json(link::create::CreateRequest {
            asset: "photo".to_string(),
            duration_secs: 299,
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = link::create::handler(
        State(state.clone()),
        owner_headers("bob"),
        axum::Json(link::create::CreateRequest {
            asset: "photo".to_string(),
            duration_secs: 600,
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_link_revoke_is_owner_scoped() {
    let state = setup().await;
    seed_asset(&state, "bob", "photo").await;

    let asset = state
        .store()
        .database()
        .get_asset("bob", "photo")
        .await
        .unwrap()
        .unwrap();
    let issued = state.links().issue(&asset, 600).await.unwrap();

    // alice cannot revoke bob's slug
    let response = link::revoke::handler(
        State(state.clone()),
        owner_headers("alice"),
        Path(issued.slug.clone()),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = link::revoke::handler(
        State(state.clone()),
        owner_headers("bob"),
        Path(issued.slug.clone()),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_gw_serves_original_without_owner_header() {
    let state = setup().await;
    seed_asset(&state, "bob", "photo").await;

    let asset = state
        .store()
        .database()
        .get_asset("bob", "photo")
        .await
        .unwrap()
        .unwrap();
    let issued = state.links().issue(&asset, 600).await.unwrap();

    let response = gw::handler(State(state.clone()), Path(issued.slug))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/png"
    );
}

#[tokio::test]
async fn test_gw_expired_slug_is_gone() {
    let state = setup().await;
    seed_asset(&state, "bob", "photo").await;

    let asset = state
        .store()
        .database()
        .get_asset("bob", "photo")
        .await
        .unwrap()
        .unwrap();
    // Issued far enough in the past that its lifetime has elapsed
    let past = chrono::Utc::now().timestamp() - 1000;
    let issued = state.links().issue_at(&asset, 600, past).await.unwrap();

    let response = gw::handler(State(state.clone()), Path(issued.slug.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::GONE);

    // Resolution deleted the row; a second read is a plain miss
    let response = gw::handler(State(state.clone()), Path(issued.slug))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tier_reassignment_fans_out() {
    let state = setup().await;
    seed_asset(&state, "alice", "photo").await;

    let response = profile::tier::handler(
        State(state.clone()),
        owner_headers("alice"),
        axum::Json(profile::tier::SetTierRequest {
            tier: "premium".to_string(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: profile::tier::SetTierResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.outcomes.len(), 1);
    assert_eq!(parsed.outcomes[0].added, vec![400]);

    // reassignment to an unknown tier is rejected
    let response = profile::tier::handler(
        State(state.clone()),
        owner_headers("alice"),
        axum::Json(profile::tier::SetTierRequest {
            tier: "platinum".to_string(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_readiness_reports_ok() {
    let state = setup().await;

    let response = health::readiness::handler(State(state.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
}
