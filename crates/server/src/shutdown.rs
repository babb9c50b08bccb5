//! OS signal handling.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancel `cancel` on SIGINT or SIGTERM (Ctrl+C off Unix).
///
/// The listener exits quietly if `cancel` is triggered some other way.
pub fn spawn_signal_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            received = os_signal() => match received {
                Ok(name) => {
                    info!(signal = name, "shutdown signal received");
                    cancel.cancel();
                }
                Err(e) => error!(error = %e, "failed to install signal handlers"),
            },
            _ = cancel.cancelled() => {}
        }
    })
}

async fn os_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => Ok("SIGINT"),
            _ = sigterm.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("ctrl_c")
    }
}
