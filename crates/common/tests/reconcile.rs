//! Integration tests for the derived-asset reconciler

mod common;

use std::collections::BTreeSet;

use ::common::prelude::*;

#[tokio::test]
async fn test_reconcile_matches_tier_heights() {
    let (reconciler, _, store) = common::setup_test_env().await;

    let (asset, outcome) =
        common::create_reconciled(&reconciler, "alice", "photo", common::png_fixture(500, 1000))
            .await;

    assert_eq!(outcome.added.iter().copied().collect::<Vec<_>>(), vec![200]);
    assert!(outcome.removed.is_empty());
    assert!(outcome.failed.is_empty());

    let heights = store.derived_heights(asset.id).await.unwrap();
    assert_eq!(heights.into_iter().collect::<Vec<_>>(), vec![200]);

    // The derived bytes are real JPEG at the target height
    let thumb = store.get_derived(&asset, 200).await.unwrap().unwrap();
    let decoded = image::load_from_memory(&thumb).unwrap();
    assert_eq!(decoded.height(), 200);
    assert_eq!(decoded.width(), 100);
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let (reconciler, _, _) = common::setup_test_env().await;

    let (asset, _) =
        common::create_reconciled(&reconciler, "alice", "photo", common::png_fixture(400, 800))
            .await;

    let tier = reconciler.tier_for_owner("alice").await.unwrap();
    let second = reconciler.reconcile(&asset, &tier).await.unwrap();
    assert!(second.is_noop());
}

#[tokio::test]
async fn test_tier_reassignment_adds_and_removes() {
    let (reconciler, _, store) = common::setup_test_env().await;

    let (asset, _) =
        common::create_reconciled(&reconciler, "alice", "photo", common::png_fixture(400, 800))
            .await;

    // Commit the tier change first, then fan out
    store
        .database()
        .set_profile_tier("alice", "premium")
        .await
        .unwrap();
    let entries = reconciler.reconcile_owner("alice").await.unwrap();
    assert_eq!(entries.len(), 1);
    let outcome = entries[0].result.as_ref().unwrap();
    assert_eq!(outcome.added.iter().copied().collect::<Vec<_>>(), vec![400]);
    assert!(outcome.removed.is_empty());

    let heights = store.derived_heights(asset.id).await.unwrap();
    assert_eq!(heights.into_iter().collect::<Vec<_>>(), vec![200, 400]);

    // And back down: 400 is removed, record and file both
    store
        .database()
        .set_profile_tier("alice", "basic")
        .await
        .unwrap();
    let entries = reconciler.reconcile_owner("alice").await.unwrap();
    let outcome = entries[0].result.as_ref().unwrap();
    assert_eq!(outcome.removed.iter().copied().collect::<Vec<_>>(), vec![400]);

    assert!(store.get_derived(&asset, 400).await.unwrap().is_none());
    let files = store.list_asset_files(&asset).await.unwrap();
    assert!(!files.iter().any(|p| p.contains("/400/")));
}

#[tokio::test]
async fn test_fanout_failures_are_independent() {
    let (reconciler, _, store) = common::setup_test_env().await;

    common::create_reconciled(&reconciler, "alice", "good", common::png_fixture(300, 600)).await;
    // Sniffs as PNG, fails to decode during transform
    store
        .create_asset("alice", "bad", "bad.png", common::corrupt_png_fixture())
        .await
        .unwrap();

    store
        .database()
        .set_profile_tier("alice", "premium")
        .await
        .unwrap();
    let entries = reconciler.reconcile_owner("alice").await.unwrap();
    assert_eq!(entries.len(), 2);

    for entry in &entries {
        let outcome = entry.result.as_ref().unwrap();
        match entry.asset.as_str() {
            "good" => {
                assert!(outcome.failed.is_empty());
            }
            "bad" => {
                // Every required height failed; none aborted the pass
                assert!(outcome.added.is_empty());
                assert_eq!(outcome.failed.len(), 2);
            }
            other => panic!("unexpected asset {}", other),
        }
    }

    // The sibling asset still reached the full premium set
    let good = store.database().get_asset("alice", "good").await.unwrap().unwrap();
    let heights = store.derived_heights(good.id).await.unwrap();
    assert_eq!(heights.into_iter().collect::<Vec<_>>(), vec![200, 400]);
}

#[tokio::test]
async fn test_short_source_still_satisfies_tier() {
    let (reconciler, _, store) = common::setup_test_env().await;

    // Source height 150 is below both premium targets; pass-through policy
    // must still produce a derived record per required height
    let (asset, outcome) =
        common::create_reconciled(&reconciler, "bob", "small", common::png_fixture(100, 150))
            .await;
    assert!(outcome.failed.is_empty());

    let heights = store.derived_heights(asset.id).await.unwrap();
    assert_eq!(heights.into_iter().collect::<Vec<_>>(), vec![200, 400]);

    let thumb = store.get_derived(&asset, 400).await.unwrap().unwrap();
    let decoded = image::load_from_memory(&thumb).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (100, 150));
}

#[tokio::test]
async fn test_delete_asset_leaves_no_files() {
    let (reconciler, _, store) = common::setup_test_env().await;

    let (asset, _) =
        common::create_reconciled(&reconciler, "bob", "photo", common::png_fixture(400, 800))
            .await;
    assert!(!store.list_asset_files(&asset).await.unwrap().is_empty());

    assert!(store.delete_asset(&asset).await.unwrap());

    assert!(store.list_asset_files(&asset).await.unwrap().is_empty());
    assert!(store.derived_heights(asset.id).await.unwrap().is_empty());
    assert!(store
        .database()
        .get_asset("bob", "photo")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_concurrent_reconciles_serialize_per_asset() {
    let (reconciler, _, store) = common::setup_test_env().await;

    let (asset, _) =
        common::create_reconciled(&reconciler, "alice", "photo", common::png_fixture(400, 800))
            .await;

    let basic = Tier::new("basic", [200], false, false).unwrap();
    let premium = Tier::new("premium", [200, 400], true, true).unwrap();

    // Race two reconciliations against different tiers, e.g. a tier change
    // racing a re-upload. The final derived set must equal one tier's
    // required set, never a blend of both.
    let (a, b) = tokio::join!(
        reconciler.reconcile(&asset, &basic),
        reconciler.reconcile(&asset, &premium),
    );
    a.unwrap();
    b.unwrap();

    let heights = store.derived_heights(asset.id).await.unwrap();
    let basic_set: BTreeSet<u32> = basic.required_heights.clone();
    let premium_set: BTreeSet<u32> = premium.required_heights.clone();
    assert!(
        heights == basic_set || heights == premium_set,
        "derived set {:?} matches neither tier",
        heights
    );
}

#[tokio::test]
async fn test_reconcile_repairs_record_drift() {
    let (reconciler, _, store) = common::setup_test_env().await;

    let (asset, _) =
        common::create_reconciled(&reconciler, "alice", "photo", common::png_fixture(400, 800))
            .await;

    // Simulate drift: the derived record vanishes while the file stays
    store.database().delete_derived(asset.id, 200).await.unwrap();

    let tier = reconciler.tier_for_owner("alice").await.unwrap();
    let outcome = reconciler.reconcile(&asset, &tier).await.unwrap();
    assert_eq!(outcome.added.iter().copied().collect::<Vec<_>>(), vec![200]);

    let heights = store.derived_heights(asset.id).await.unwrap();
    assert_eq!(heights.into_iter().collect::<Vec<_>>(), vec![200]);
}
