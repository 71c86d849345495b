//! Shared test utilities for reconciler and link integration tests
#![allow(dead_code)]

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use ::common::prelude::*;

/// Set up an ephemeral store with two tiers and two owners:
/// - "basic" requires {200} and grants no capabilities ("alice")
/// - "premium" requires {200, 400} and grants original access and
///   temporary links ("bob")
pub async fn setup_test_env() -> (Reconciler, LinkManager, AssetStore) {
    let store = AssetStore::new_ephemeral().await.unwrap();
    let db = store.database();

    db.upsert_tier("basic", &[200], false, false).await.unwrap();
    db.upsert_tier("premium", &[200, 400], true, true)
        .await
        .unwrap();
    db.upsert_profile("alice", "basic").await.unwrap();
    db.upsert_profile("bob", "premium").await.unwrap();

    (
        Reconciler::new(store.clone()),
        LinkManager::new(store.clone()),
        store,
    )
}

/// A real encoded PNG at the given dimensions.
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 160, 90, 255]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// Bytes that sniff as PNG (the store accepts them) but fail to decode
/// (the transform rejects them).
pub fn corrupt_png_fixture() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(b"garbage after the signature");
    bytes
}

/// Create an asset and reconcile it against the owner's current tier,
/// the way asset creation does in the service layer.
pub async fn create_reconciled(
    reconciler: &Reconciler,
    owner: &str,
    name: &str,
    bytes: Vec<u8>,
) -> (AssetRow, ReconcileOutcome) {
    let asset = reconciler
        .store()
        .create_asset(owner, name, &format!("{}.png", name), bytes)
        .await
        .unwrap();
    let tier = reconciler.tier_for_owner(owner).await.unwrap();
    let outcome = reconciler.reconcile(&asset, &tier).await.unwrap();
    (asset, outcome)
}
