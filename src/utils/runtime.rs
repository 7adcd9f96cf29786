use anyhow::Result;

/// The tracker is a single cooperative loop, so it never needs more than one worker thread.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
