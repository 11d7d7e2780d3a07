use anyhow::Result;

/// Every command runs on a single logical thread of control, so the runtime never needs workers.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
