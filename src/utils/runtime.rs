use std::{future::Future, time::Duration};

use anyhow::Result;
use tokio::runtime::Runtime;

/// How long blocking tasks get to finish once the main future is done. Reads from stdin run on
/// a blocking thread that can't be interrupted, they are abandoned after this.
const BLOCKING_RELEASE_TIMEOUT: Duration = Duration::from_millis(100);

/// The host handles one event at a time, so a single thread is all it needs.
pub fn single_thread_runtime() -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Drives `future` to completion and shuts `runtime` down without waiting on blocking tasks
/// that are still stuck.
pub fn run_to_completion<F: Future>(runtime: Runtime, future: F) -> F::Output {
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(BLOCKING_RELEASE_TIMEOUT);
    output
}
