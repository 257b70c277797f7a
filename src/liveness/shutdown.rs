use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

/// Cancels `token` once the process receives an interrupt or termination
/// signal. Intended to be spawned once per process by the embedding binary
/// and handed the same token the monitors were built with, so every in-flight
/// watch gets a chance to revoke its lease before exit.
pub async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                token.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
            _ = terminate.recv() => info!("termination signal received, shutting down"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received, shutting down");
    }
    token.cancel();
}
