//! Graceful shutdown

/// Resolves once the process is asked to stop
///
/// If the signal handler cannot be installed this never resolves, and the
/// server runs until it is killed.
pub async fn signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        {
            let error: &dyn std::error::Error = &err;
            tracing::error!(error, "unable to listen for shutdown signal");
        }
        std::future::pending::<()>().await;
    }

    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn signal_can_drive_graceful_shutdown() {
        let signal = super::signal();
        assert_send(&signal);
    }
}
