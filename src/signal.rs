use std::sync::Arc;

use tokio::sync::watch;

/// Cooperative stop request shared between the monitor and the signal listener
#[derive(Clone, Debug)]
pub struct StopToken {
    tx: Arc<watch::Sender<bool>>,
}

impl StopToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once stop has been requested
    pub async fn requested(&self) {
        let mut rx = self.tx.subscribe();
        // Sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Exit status when a repeated signal forces the process down (128 + SIGINT)
pub const FORCED_EXIT_CODE: i32 = 130;

/// Spawns a task that requests stop on Ctrl-C or SIGTERM. A second signal
/// exits immediately, for when shutdown is stuck on a hung sample.
pub fn spawn_interrupt_listener(stop: StopToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut signals = OsSignals::new();
        if escalate(&stop, &mut signals).await {
            log::warn!("second shutdown signal, exiting without cleanup");
            std::process::exit(FORCED_EXIT_CODE);
        }
    })
}

trait SignalSource {
    /// Waits for the next signal. `false` once no more can arrive.
    async fn next_signal(&mut self) -> bool;
}

/// Requests stop on the first signal. Returns `true` if another one follows.
async fn escalate<S: SignalSource>(stop: &StopToken, signals: &mut S) -> bool {
    if !signals.next_signal().await {
        return false;
    }
    log::info!("received shutdown signal");
    stop.request();
    signals.next_signal().await
}

struct OsSignals {
    #[cfg(unix)]
    sigterm: Option<tokio::signal::unix::Signal>,
}

impl OsSignals {
    fn new() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let sigterm = signal(SignalKind::terminate())
                .inspect_err(|e| log::warn!("SIGTERM handler unavailable: {}", e))
                .ok();
            Self { sigterm }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }
}

impl SignalSource for OsSignals {
    async fn next_signal(&mut self) -> bool {
        #[cfg(unix)]
        if let Some(sigterm) = self.sigterm.as_mut() {
            tokio::select! {
                res = tokio::signal::ctrl_c() => return ctrl_c_received(res),
                got = sigterm.recv() => return got.is_some(),
            }
        }
        ctrl_c_received(tokio::signal::ctrl_c().await)
    }
}

fn ctrl_c_received(res: std::io::Result<()>) -> bool {
    res.inspect_err(|e| log::error!("failed to listen for Ctrl-C: {}", e))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    impl SignalSource for mpsc::UnboundedReceiver<()> {
        async fn next_signal(&mut self) -> bool {
            self.recv().await.is_some()
        }
    }

    #[tokio::test]
    async fn test_first_signal_requests_stop() {
        let stop = StopToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(()).unwrap();
        drop(tx);

        assert!(!escalate(&stop, &mut rx).await);
        assert!(stop.is_requested());
    }

    #[tokio::test]
    async fn test_second_signal_escalates() {
        let stop = StopToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let waiter = stop.clone();
        let handle = tokio::spawn(async move { escalate(&waiter, &mut rx).await });

        tx.send(()).unwrap();
        stop.requested().await;
        assert!(!handle.is_finished());

        tx.send(()).unwrap();
        let forced = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(forced);
    }

    #[tokio::test]
    async fn test_no_signal_leaves_stop_unset() {
        let stop = StopToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        drop(tx);

        assert!(!escalate(&stop, &mut rx).await);
        assert!(!stop.is_requested());
    }

    #[tokio::test]
    async fn test_request_is_visible_to_clones() {
        let stop = StopToken::new();
        let clone = stop.clone();
        assert!(!clone.is_requested());
        stop.request();
        stop.request();
        assert!(clone.is_requested());
    }

    #[tokio::test]
    async fn test_requested_wakes_waiter() {
        let stop = StopToken::new();
        let waiter = stop.clone();
        let handle = tokio::spawn(async move { waiter.requested().await });
        tokio::task::yield_now().await;
        stop.request();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_requested_returns_immediately_when_already_set() {
        let stop = StopToken::new();
        stop.request();
        tokio::time::timeout(Duration::from_millis(100), stop.requested())
            .await
            .unwrap();
    }
}
