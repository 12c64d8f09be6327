// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Fatal startup failures: a role loop that has already started never
/// returns one of these, since every tick catches and logs its own
/// failures instead of propagating them.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to prepare coordination paths: {0}")]
    Coordination(#[from] rbc_coordination::CoordinationError),
}
