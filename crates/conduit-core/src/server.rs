// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP server hosting the callback router.

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Serve `app` on `listener` until `shutdown_rx` turns true or its sender is dropped.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Callback server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    info!(addr = %addr, "Callback server stopped");
    Ok(())
}
