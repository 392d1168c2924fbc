mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{retriever, shop_embedder, shop_tables, FakeCatalog};
use tablefinder::refresher::Refresher;
use tablefinder::retriever::RetrieverSettings;
use tablefinder_core::snapshot::SnapshotKind;

#[tokio::test]
async fn test_scheduled_refreshes_are_stats_only() {
    let embedder = Arc::new(shop_embedder());
    let r = retriever(
        FakeCatalog::new(shop_tables()),
        embedder.clone(),
        RetrieverSettings {
            sample_rows: 0,
            ..RetrieverSettings::default()
        },
    );
    r.refresh(true).await.unwrap();
    let calls = embedder.calls();

    let refresher = Refresher::spawn(
        Arc::clone(&r),
        Duration::from_millis(30),
        Duration::from_secs(1),
    );
    tokio::time::sleep(Duration::from_millis(150)).await;

    let snapshot = r.snapshot().unwrap();
    assert!(snapshot.version() > 1);
    assert_eq!(snapshot.kind(), SnapshotKind::StatsOnly);
    assert_eq!(embedder.calls(), calls);
    assert!(r.snapshot_info().unwrap().next_refresh_at.is_some());

    refresher.shutdown().await;
    assert!(r.snapshot_info().unwrap().next_refresh_at.is_none());

    let version = r.snapshot().unwrap().version();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(r.snapshot().unwrap().version(), version);
}

#[tokio::test]
async fn test_failed_scheduled_refresh_keeps_serving() {
    let catalog = FakeCatalog::new(shop_tables());
    let r = retriever(
        catalog.clone(),
        Arc::new(shop_embedder()),
        RetrieverSettings {
            sample_rows: 0,
            ..RetrieverSettings::default()
        },
    );
    r.refresh(true).await.unwrap();
    catalog.set_unavailable(true);

    let refresher = Refresher::spawn(
        Arc::clone(&r),
        Duration::from_millis(20),
        Duration::from_secs(1),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    refresher.shutdown().await;

    assert_eq!(r.snapshot().unwrap().version(), 1);
    assert!(!r
        .find_relevant("customer purchase history", 3, true)
        .await
        .unwrap()
        .is_empty());
}
