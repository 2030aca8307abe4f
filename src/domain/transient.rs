use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A short-lived "this row just changed" flag.
///
/// Marking an id replaces the previous one and restarts the clear timer. The
/// timer is aborted on [`TransientMarker::cancel`] and on drop, so nothing is
/// written after the owning synchronizer is gone.
pub struct TransientMarker {
    ttl: Duration,
    current: Arc<watch::Sender<Option<String>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl TransientMarker {
    pub fn new(ttl: Duration) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            ttl,
            current: Arc::new(current),
            timer: Mutex::new(None),
        }
    }

    /// Must be called from within a Tokio runtime.
    pub fn mark(&self, id: &str) {
        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }

        self.current.send_replace(Some(id.to_string()));

        let current = self.current.clone();
        let ttl = self.ttl;
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            current.send_replace(None);
        }));
    }

    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }

    pub fn cancel(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        self.current.send_replace(None);
    }
}

impl Drop for TransientMarker {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_mark_clears_after_ttl() {
        let marker = TransientMarker::new(Duration::from_millis(1_500));
        marker.mark("a");
        assert_eq!(marker.current().as_deref(), Some("a"));

        tokio::time::sleep(Duration::from_millis(1_400)).await;
        assert_eq!(marker.current().as_deref(), Some("a"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(marker.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remark_restarts_timer() {
        let marker = TransientMarker::new(Duration::from_millis(1_000));
        marker.mark("a");
        tokio::time::sleep(Duration::from_millis(800)).await;
        marker.mark("b");
        tokio::time::sleep(Duration::from_millis(800)).await;

        assert_eq!(marker.current().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_clears_immediately() {
        let marker = TransientMarker::new(Duration::from_millis(1_000));
        marker.mark("a");
        marker.cancel();
        assert_eq!(marker.current(), None);
    }
}
