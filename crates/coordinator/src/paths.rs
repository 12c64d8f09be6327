// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five coordination-service paths the coordinator binds under its
//! configured root: `leader`, `election`, `models/queue`, `models/taken`,
//! `models/train`.

/// Coordination-service paths bound under a configured root.
#[derive(Debug, Clone)]
pub struct CoordinatorPaths {
    /// The root itself. Watched for child-set changes (the `leader` key
    /// appearing or disappearing) since a leaf ephemeral key's own
    /// "children" are not a meaningful set to watch.
    pub root: String,
    pub leader: String,
    pub election: String,
    pub queue: String,
    pub taken: String,
    pub train: String,
}

impl CoordinatorPaths {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        let root = root.trim_end_matches('/').to_string();
        Self {
            leader: format!("{root}/leader"),
            election: format!("{root}/election"),
            queue: format!("{root}/models/queue"),
            taken: format!("{root}/models/taken"),
            train: format!("{root}/models/train"),
            root,
        }
    }

    /// Every persistent intermediate path that must exist before the
    /// role loop starts.
    pub fn all(&self) -> [&str; 5] {
        [&self.root, &self.election, &self.queue, &self.taken, &self.train]
    }

    pub fn taken_marker(&self, model: &str) -> String {
        format!("{}/{}", self.taken, model)
    }

    pub fn train_marker(&self, model: &str) -> String {
        format!("{}/{}", self.train, model)
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
