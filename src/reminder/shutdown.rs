use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancellation` once the process is asked to stop, either with Ctrl-C or, on Unix, with
/// the SIGTERM sent by `remind stop`. Returns early if the token is cancelled elsewhere.
///
/// Detached processes on Windows don't receive console signals, there `remind stop` falls back to
/// killing the process.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C");
            cancellation.cancel();
        },
        _ = terminate() => {
            info!("Received termination request");
            cancellation.cancel();
        },
        _ = cancellation.cancelled() => (),
    };
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::warn;

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!("Can't listen for SIGTERM {e:?}");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
