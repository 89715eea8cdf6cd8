#![allow(dead_code)]

use std::sync::Arc;

use banner_store::prelude::*;

pub fn banner(tag_ids: Vec<TagId>, feature_id: FeatureId, title: &str, is_active: bool) -> NewBanner {
    NewBanner {
        tag_ids,
        feature_id,
        content: Content::new(title, format!("{title} text"), format!("https://example.com/{title}")),
        is_active,
    }
}

#[cfg(feature = "sqlite")]
pub async fn sqlite_store(dir: &tempfile::TempDir) -> DbStore {
    sqlite_store_with_timeout(dir, std::time::Duration::from_secs(5)).await
}

/// Opens (or reopens) the store in `dir`. Every call makes a separate connection pool, like another process would.
#[cfg(feature = "sqlite")]
pub async fn sqlite_store_with_timeout(dir: &tempfile::TempDir, timeout: std::time::Duration) -> DbStore {
    use banner_store::db::driver::sqlite::Sqlite;
    use banner_store::db::driver::DatabaseDriver;

    let driver = Sqlite::connect(&dir.path().join("banners.db"))
        .await
        .expect("sqlite database opens");
    driver.prepare().await.expect("migrations apply");
    DbStore::new(driver.connection(), timeout)
}

pub async fn check_create_and_read<S: BannerStore>(store: &S) {
    let id = store.create(banner(vec![1, 2], 10, "hello", true)).await.unwrap();
    assert!(id > 0);

    for tag_id in [1, 2] {
        let content = store.get_for_user(tag_id, 10).await.unwrap();
        assert_eq!(content.title, "hello");
        assert_eq!(content.url, "https://example.com/hello");
    }

    let err = store.get_for_user(3, 10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = store.get_for_user(1, 11).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let inactive = store.create(banner(vec![5], 10, "hidden", false)).await.unwrap();
    assert_ne!(inactive, id);
    assert_eq!(store.get_for_user(5, 10).await.unwrap_err().kind(), ErrorKind::NotFound);

    let active = store.banner_active_versions().await.unwrap();
    assert_eq!(active.get(&id), Some(&FIRST_VERSION));
    assert_eq!(active.get(&inactive), None);
}

pub async fn check_update_and_rollback<S: BannerStore>(store: &S) {
    let id = store.create(banner(vec![1], 1, "first", true)).await.unwrap();

    let version = store
        .update(BannerUpdate {
            id,
            content: Content::new("second", "second text", "https://example.com/second"),
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(version, 2);
    assert_eq!(store.get_for_user(1, 1).await.unwrap().title, "second");

    store.set_version_active(id, 1).await.unwrap();
    assert_eq!(store.get_for_user(1, 1).await.unwrap().title, "first");

    // The listing shows the latest version, which is no longer the active one.
    let listed = store.get_for_admin(AdminQuery::new()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].version, 2);
    assert_eq!(listed[0].content.title, "second");
    assert!(!listed[0].is_active);

    store.set_version_active(id, 2).await.unwrap();
    let listed = store.get_for_admin(AdminQuery::new()).await.unwrap();
    assert!(listed[0].is_active);

    let err = store.set_version_active(id, 3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = store.set_version_active(id + 100, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let history = store.version_history(id).await.unwrap();
    assert_eq!(history.iter().map(|v| v.version).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(history[0].content.title, "first");
}

pub async fn check_partial_update<S: BannerStore>(store: &S) {
    let id = store.create(banner(vec![1, 2], 3, "keep me", true)).await.unwrap();

    store
        .update(BannerUpdate {
            id,
            tag_ids: vec![4],
            feature_id: 0,
            content: Content::new("", "fresh text", "https://fresh"),
            is_active: true,
        })
        .await
        .unwrap();

    let content = store.get_for_user(4, 3).await.unwrap();
    assert_eq!(content, Content::new("keep me", "fresh text", "https://fresh"));

    // Tags of the old version no longer lead to the banner.
    assert_eq!(store.get_for_user(1, 3).await.unwrap_err().kind(), ErrorKind::NotFound);

    let listed = store.get_for_admin(AdminQuery::new()).await.unwrap();
    assert_eq!(listed[0].tag_ids, vec![4]);
    assert_eq!(listed[0].feature_id, 3);
}

pub async fn check_inactive_update_deactivates<S: BannerStore>(store: &S) {
    let id = store.create(banner(vec![1], 1, "live", true)).await.unwrap();

    let version = store
        .update(BannerUpdate {
            id,
            content: Content::new("draft", "", ""),
            is_active: false,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(version, 2);

    // Neither the draft nor the version it replaced is shown.
    assert_eq!(store.get_for_user(1, 1).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.banner_active_versions().await.unwrap().get(&id), None);

    let listed = store.get_for_admin(AdminQuery::new()).await.unwrap();
    assert_eq!(listed[0].version, 2);
    assert!(!listed[0].is_active);

    // The tags are free for another banner now.
    let other = store.create(banner(vec![1], 1, "other", true)).await.unwrap();
    assert_eq!(store.get_for_user(1, 1).await.unwrap().title, "other");
    store.delete(other).await.unwrap();

    store.set_version_active(id, 2).await.unwrap();
    assert_eq!(store.get_for_user(1, 1).await.unwrap().title, "draft");
}

pub async fn check_collisions<S: BannerStore>(store: &S) {
    let first = store.create(banner(vec![1, 2], 1, "first", true)).await.unwrap();

    let err = store.create(banner(vec![2, 3], 1, "second", true)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.status_code(), 400);

    // Nothing was written by the failed attempt.
    assert_eq!(store.get_for_admin(AdminQuery::new()).await.unwrap().len(), 1);
    assert_eq!(store.get_for_user(3, 1).await.unwrap_err().kind(), ErrorKind::NotFound);

    // Inactive banners don't claim anything.
    let second = store.create(banner(vec![2, 3], 1, "second", false)).await.unwrap();
    let err = store.set_version_active(second, 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Same tags for another feature are fine.
    store.create(banner(vec![1, 2], 2, "other feature", true)).await.unwrap();

    // A banner doesn't collide with itself.
    store
        .update(BannerUpdate {
            id: first,
            content: Content::new("first again", "", ""),
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let err = store
        .update(BannerUpdate {
            id: second,
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.version_history(second).await.unwrap().len(), 1);

    // Once the first banner is out of the way the second one may take its place.
    store.delete(first).await.unwrap();
    store.set_version_active(second, 1).await.unwrap();
    assert_eq!(store.get_for_user(2, 1).await.unwrap().title, "second");
}

pub async fn check_delete<S: BannerStore>(store: &S) {
    let id = store.create(banner(vec![1], 1, "doomed", true)).await.unwrap();
    store
        .update(BannerUpdate {
            id,
            content: Content::new("still doomed", "", ""),
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap();

    store.delete(id).await.unwrap();

    assert_eq!(store.get_for_user(1, 1).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.delete(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(store.version_history(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert!(store.get_for_admin(AdminQuery::new()).await.unwrap().is_empty());
    assert!(!store.banner_active_versions().await.unwrap().contains_key(&id));

    let err = store
        .update(BannerUpdate {
            id,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

pub async fn check_admin_listing<S: BannerStore>(store: &S) {
    let a = store.create(banner(vec![3, 1, 2], 1, "a", true)).await.unwrap();
    let b = store.create(banner(vec![1], 2, "b", false)).await.unwrap();
    let c = store.create(banner(vec![4], 1, "c", true)).await.unwrap();

    let all = store.get_for_admin(AdminQuery::new()).await.unwrap();
    assert_eq!(all.iter().map(|b| b.id).collect::<Vec<_>>(), vec![a, b, c]);
    assert_eq!(all[0].tag_ids, vec![3, 1, 2]);
    assert!(all[0].is_active);
    assert!(!all[1].is_active);

    let by_tag = store.get_for_admin(AdminQuery::new().tag(1)).await.unwrap();
    assert_eq!(by_tag.iter().map(|b| b.id).collect::<Vec<_>>(), vec![a, b]);
    // The filter selects banners, their tag lists stay complete.
    assert_eq!(by_tag[0].tag_ids, vec![3, 1, 2]);

    let by_feature = store.get_for_admin(AdminQuery::new().feature(1)).await.unwrap();
    assert_eq!(by_feature.iter().map(|b| b.id).collect::<Vec<_>>(), vec![a, c]);

    let both = store.get_for_admin(AdminQuery::new().tag(1).feature(2)).await.unwrap();
    assert_eq!(both.iter().map(|b| b.id).collect::<Vec<_>>(), vec![b]);

    let page = store.get_for_admin(AdminQuery::new().limit(1).offset(1)).await.unwrap();
    assert_eq!(page.iter().map(|b| b.id).collect::<Vec<_>>(), vec![b]);

    assert!(store
        .get_for_admin(AdminQuery::new().tag(42))
        .await
        .unwrap()
        .is_empty());
    assert!(store
        .get_for_admin(AdminQuery::new().offset(10))
        .await
        .unwrap()
        .is_empty());

    // Filters apply to the latest version only.
    store
        .update(BannerUpdate {
            id: c,
            tag_ids: vec![5],
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(store
        .get_for_admin(AdminQuery::new().tag(4))
        .await
        .unwrap()
        .is_empty());
}

pub async fn check_concurrent_updates<S: BannerStore>(store: Arc<S>) {
    let id = store.create(banner(vec![1], 1, "v1", true)).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..8 {
        let store = store.clone();
        tasks.spawn(async move {
            store
                .update(BannerUpdate {
                    id,
                    content: Content::new(format!("writer {n}"), "", ""),
                    is_active: true,
                    ..Default::default()
                })
                .await
        });
    }

    let mut versions = vec![];
    while let Some(outcome) = tasks.join_next().await {
        match outcome.expect("task completes") {
            Ok(version) => versions.push(version),
            Err(err) => assert_eq!(err.kind(), ErrorKind::Conflict, "unexpected error: {err}"),
        }
    }
    versions.sort();

    let history = store.version_history(id).await.unwrap();
    let mut recorded = history.iter().map(|v| v.version).collect::<Vec<_>>();
    recorded.dedup();
    assert_eq!(recorded.len(), history.len(), "no version number is used twice");
    assert_eq!(recorded, (1..=(versions.len() as i32 + 1)).collect::<Vec<_>>());

    let listed = store.get_for_admin(AdminQuery::new()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].version, *recorded.last().unwrap());
    assert!(listed[0].is_active);
}
