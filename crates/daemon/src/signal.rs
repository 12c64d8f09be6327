// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Termination-signal handling: SIGINT and SIGTERM both trigger the same
//! graceful-shutdown path, matching the "installs termination-signal
//! handlers that invoke cleanup once and exit" contract.

use tokio::signal::unix::{signal, SignalKind};

/// Resolves the first time SIGINT or SIGTERM is received. Installing the
/// handlers can fail only on a platform without the underlying syscalls;
/// that failure is propagated rather than unwrapped so the supervisor can
/// fold it into its own fatal-startup-error path.
pub async fn wait_for_termination() -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigint.recv() => tracing::info!("received SIGINT"),
    }
    Ok(())
}
