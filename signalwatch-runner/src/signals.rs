//! Ctrl-C and SIGTERM mapped onto the monitor's shutdown flag.
//!
//! A current-thread tokio runtime waits for the signal on its own thread.
//! The first signal requests a graceful stop; a second one exits at once.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Exit status after a second interrupt (128 + SIGINT).
const FORCED_EXIT: i32 = 130;

/// Spawn the signal thread. Returns once it is running.
pub fn stop_on_signal(shutdown: Arc<AtomicBool>) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("signalwatch-signals".into())
        .spawn(move || {
            runtime.block_on(async {
                request_stop_after(interrupted(), &shutdown).await;
                interrupted().await;
                tracing::warn!("second interrupt, exiting without final snapshot");
                std::process::exit(FORCED_EXIT);
            })
        })?;
    Ok(())
}

/// Set `shutdown` once `signal` resolves.
async fn request_stop_after(signal: impl Future<Output = ()>, shutdown: &AtomicBool) {
    signal.await;
    tracing::info!("shutdown requested, finishing current cycle");
    shutdown.store(true, Ordering::SeqCst);
}

async fn interrupted() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
