mod common;

use std::sync::Arc;

use banner_store::prelude::*;

#[tokio::test]
async fn create_and_read() {
    common::check_create_and_read(&MemoryStore::new()).await;
}

#[tokio::test]
async fn update_and_rollback() {
    common::check_update_and_rollback(&MemoryStore::new()).await;
}

#[tokio::test]
async fn partial_update() {
    common::check_partial_update(&MemoryStore::new()).await;
}

#[tokio::test]
async fn inactive_update_deactivates() {
    common::check_inactive_update_deactivates(&MemoryStore::new()).await;
}

#[tokio::test]
async fn collisions() {
    common::check_collisions(&MemoryStore::new()).await;
}

#[tokio::test]
async fn delete() {
    common::check_delete(&MemoryStore::new()).await;
}

#[tokio::test]
async fn admin_listing() {
    common::check_admin_listing(&MemoryStore::new()).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates() {
    common::check_concurrent_updates(Arc::new(MemoryStore::new())).await;
}
