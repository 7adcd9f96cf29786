use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels `cancellation` when the process receives an interrupt, so the tracking loop can close
/// the activity log instead of dying mid-write. Returns once `cancellation` is cancelled, whoever
/// did it.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!("Received interrupt");
                cancellation.cancel();
            }
            Err(e) => {
                warn!("Failed to listen for interrupts {e:?}");
                cancellation.cancelled().await;
            }
        },
        _ = cancellation.cancelled() => (),
    };
}
