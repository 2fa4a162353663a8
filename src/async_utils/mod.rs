//! Asynchronous utilities for use with Tokio.

pub mod io;

/// Wrapper around [`tokio::task::spawn_blocking`] that propagates panics from
/// the background task.
///
/// Use this for CPU-bound work like decoding and drawing images, so we don't
/// block the executor while the AWS SDK has requests in flight.
pub async fn spawn_blocking_propagating_panics<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => value,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => panic!("blocking task did not complete: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_closure_result() {
        assert_eq!(spawn_blocking_propagating_panics(|| 2 + 2).await, 4);
    }

    #[tokio::test]
    #[should_panic(expected = "boom")]
    async fn propagates_panics() {
        spawn_blocking_propagating_panics(|| panic!("boom")).await
    }
}
