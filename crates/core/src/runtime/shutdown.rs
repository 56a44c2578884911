use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Cancels a shared token when the process is asked to stop.
#[derive(Debug, Default)]
pub struct ShutdownGuard {
    token: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token watched by the worker and the front-end loops.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel on SIGINT or SIGTERM (Ctrl+C only off unix).
    pub fn spawn_signal_listener(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to register SIGTERM handler");
                            return;
                        }
                    };
                tokio::select! {
                    _ = signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                    _ = token.cancelled() => return,
                }
            }
            #[cfg(not(unix))]
            {
                tokio::select! {
                    _ = signal::ctrl_c() => tracing::info!("received Ctrl+C, shutting down"),
                    _ = token.cancelled() => return,
                }
            }
            token.cancel();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_share_cancellation() {
        let guard = ShutdownGuard::new();
        let a = guard.token();
        let b = guard.token();
        a.cancel();
        assert!(b.is_cancelled());
    }
}
