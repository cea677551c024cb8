//! Process shutdown signals.

use std::future::Future;

use tracing::{error, info};

/// Resolves on ctrl-c, or on SIGTERM on unix.
///
/// Handlers are installed when this is called, not when the future is first
/// polled, so a signal delivered in between is not lost.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    Ok(async move {
        #[cfg(unix)]
        tokio::select! {
            _ = ctrl_c() => {}
            _ = terminate.recv() => info!("received SIGTERM"),
        }

        #[cfg(not(unix))]
        ctrl_c().await;
    })
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c"),
        Err(e) => {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}
