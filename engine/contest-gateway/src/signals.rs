//! Signal handling for graceful shutdown

use anyhow::Result;
use tokio::sync::oneshot;
use tracing::{error, info};

/// Resolve the returned receiver on Ctrl+C or SIGTERM, whichever comes first
pub fn setup_signal_handlers() -> Result<oneshot::Receiver<()>> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (signal_tx, mut signal_rx) = tokio::sync::mpsc::channel::<&'static str>(2);

    // Ctrl+C (SIGINT)
    {
        let signal_tx = signal_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C signal: {}", e);
                return;
            }
            let _ = signal_tx.send("SIGINT").await;
        });
    }

    // SIGTERM (Unix only)
    #[cfg(unix)]
    {
        use signal_hook::consts::SIGTERM;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let terminated = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGTERM, terminated.clone())?;

        let signal_tx = signal_tx.clone();
        tokio::spawn(async move {
            while !terminated.load(Ordering::Relaxed) {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
            let _ = signal_tx.send("SIGTERM").await;
        });
    }

    tokio::spawn(async move {
        if let Some(signal) = signal_rx.recv().await {
            info!("{} received", signal);
            let _ = shutdown_tx.send(());
        }
    });

    Ok(shutdown_rx)
}
