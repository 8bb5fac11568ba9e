use anyhow::{Context, Result};
use fleetstats_core::domain::CancellationFlag;
use std::thread;
use tracing::{debug, warn};

/// Exit status used when a second Ctrl-C forces the process down
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Raise `cancel` on the first Ctrl-C and exit on the second one.
///
/// Signals are awaited on a dedicated thread running a current-thread tokio
/// runtime; the processing threads only ever poll the flag.
pub fn install_interrupt_handler(cancel: CancellationFlag) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    thread::Builder::new()
        .name("fleetstats-signals".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("Cannot listen for Ctrl-C: {}", e);
                        return;
                    }
                    if cancel.is_cancelled() {
                        warn!("Second Ctrl-C received; exiting");
                        std::process::exit(INTERRUPTED_EXIT_CODE);
                    }
                    warn!("Ctrl-C received; finishing running repositories, press Ctrl-C again to abort");
                    cancel.cancel();
                }
            })
        })
        .context("Failed to spawn signal thread")?;

    debug!("Interrupt handler installed");
    Ok(())
}
