use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancellation` on Ctrl-C. Returns early when something else cancelled it first, so it
/// can be joined with the session loop.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, finishing the session");
            cancellation.cancel();
        },
        _ = cancellation.cancelled() => (),
    };
}
