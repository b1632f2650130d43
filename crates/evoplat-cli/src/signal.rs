use std::thread;

use anyhow::Context;
use evoplat_training::evaluation::CancellationToken;

/// Cancels `cancel` when the process receives Ctrl-C.
///
/// The listener runs on its own thread with a single-threaded runtime, so the
/// training loop itself stays synchronous.
pub fn cancel_on_interrupt(cancel: CancellationToken) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build the signal runtime")?;
    thread::Builder::new()
        .name("interrupt".to_owned())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::warn!("interrupted, stopping after the current step");
                        cancel.cancel();
                    }
                    Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl-C"),
                }
            });
        })
        .context("Failed to spawn the signal listener")?;
    Ok(())
}
