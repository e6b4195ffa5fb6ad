//! Run-wide cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Shared stop signal for a run.
///
/// Raising it never interrupts a request already in flight; pipelines check
/// it before scheduling the next page or batch. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    cancelled: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            log::warn!("Run cancelled, no further pages or batches will be scheduled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel automatically once `timeout` has elapsed.
    ///
    /// Must be called from within a tokio runtime. The returned handle can be
    /// aborted when the run finishes first.
    pub fn cancel_after(&self, timeout: Duration) -> tokio::task::JoinHandle<()> {
        let control = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            log::warn!("Run timeout of {:?} reached", timeout);
            control.cancel();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let control = RunControl::new();
        let other = control.clone();
        assert!(!other.is_cancelled());
        control.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_timeout() {
        let control = RunControl::new();
        let handle = control.cancel_after(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!control.is_cancelled());

        handle.await.unwrap();
        assert!(control.is_cancelled());
    }
}
