// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derives the set of known models from the artifact store: a model is
//! "known" iff its config object is present under the configured prefix
//! (I4 — discovery is config-gated, never weights-gated, so a model
//! missing only its weights is still discoverable and will fall back to
//! the default weights on next training).

use crate::error::StoreError;
use crate::store::ArtifactStore;
use rbc_core::ModelName;

const CONFIG_EXTENSION: &str = "config";

/// Lists `prefix` and returns the names of every model whose config
/// object is present, derived by stripping the `.config` suffix from the
/// object key's filename.
pub async fn discover(store: &dyn ArtifactStore, prefix: &str) -> Result<Vec<ModelName>, StoreError> {
    let keys = store.list(prefix).await?;
    let suffix = format!(".{CONFIG_EXTENSION}");
    let mut names: Vec<ModelName> = keys
        .iter()
        .filter_map(|key| {
            let file_name = key.rsplit('/').next().unwrap_or(key.as_str());
            file_name.strip_suffix(&suffix).map(ModelName::new)
        })
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
