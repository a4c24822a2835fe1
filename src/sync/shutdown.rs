use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Cancels `cancelation` on Ctrl-C. Running uploads finish, the remaining worklogs are left for
/// the next run.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(_) => {
                    warn!("Interrupted, stopping after the current worklog");
                    cancelation.cancel();
                }
                Err(e) => error!("Can't listen for Ctrl-C {e:?}"),
            }
        },
        _ = cancelation.cancelled() => (),
    };
}
