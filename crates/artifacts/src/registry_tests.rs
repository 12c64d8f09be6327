// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::store::fake::FakeArtifactStore;

#[tokio::test]
async fn discovers_models_with_a_config_object() {
    let store = FakeArtifactStore::new();
    store.seed("rbaioutliers/latest/traffic.config", b"".to_vec());
    store.seed("rbaioutliers/latest/traffic.weights", b"".to_vec());
    store.seed("rbaioutliers/latest/alpha.config", b"".to_vec());

    let models = discover(&store, "rbaioutliers/latest/").await.unwrap();
    assert_eq!(models, vec![ModelName::new("alpha"), ModelName::new("traffic")]);
}

#[tokio::test]
async fn weights_without_config_are_not_discovered() {
    let store = FakeArtifactStore::new();
    store.seed("rbaioutliers/latest/orphan.weights", b"".to_vec());

    let models = discover(&store, "rbaioutliers/latest/").await.unwrap();
    assert!(models.is_empty());
}

#[tokio::test]
async fn empty_prefix_yields_empty_pool() {
    let store = FakeArtifactStore::new();
    let models = discover(&store, "rbaioutliers/latest/").await.unwrap();
    assert!(models.is_empty());
}
