// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rbc-training: the Training Job, and the `Trainer`/`QueryEngine` ports
//! it is built against.

pub mod druid;
pub mod error;
pub mod job;
pub mod ports;
pub mod process;

pub use druid::DruidQueryClient;
pub use error::{QueryError, TrainerError, TrainingError};
pub use job::{TrainingConfig, TrainingJob};
pub use ports::{QueryEngine, QueryRequest, QueryResponse, Trainer};
pub use process::ProcessTrainer;

#[cfg(any(test, feature = "test-support"))]
pub use ports::fake::{FakeQueryEngine, FakeTrainer};
