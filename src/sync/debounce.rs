//! Debounce gate coalescing rapid edits into one settled value.
//!
//! Each watched group keeps an explicit `(last_raw, pending timer, settled)`
//! triple. A raw change aborts the pending timer and schedules a new one; the
//! timer only reports back its group and sequence number, and the owner asks
//! the gate whether that expiry is still current. A timer that raced its own
//! cancellation therefore never produces a notification.

use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Default quiet period before a watched value counts as settled.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(700);

/// The independently watched field groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchGroup {
    Title,
    Details,
}

/// Sent by a timer task when its quiet period elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceExpired {
    pub group: WatchGroup,
    pub seq: u64,
}

struct PendingTimer {
    seq: u64,
    handle: JoinHandle<()>,
}

pub struct DebounceGate<T> {
    group: WatchGroup,
    quiet: Duration,
    expired_tx: mpsc::UnboundedSender<DebounceExpired>,
    last_raw: Option<T>,
    pending: Option<PendingTimer>,
    settled: T,
    next_seq: u64,
}

impl<T: Clone + PartialEq + Debug> DebounceGate<T> {
    pub fn new(
        group: WatchGroup,
        quiet: Duration,
        initial: T,
        expired_tx: mpsc::UnboundedSender<DebounceExpired>,
    ) -> Self {
        Self {
            group,
            quiet,
            expired_tx,
            last_raw: None,
            pending: None,
            settled: initial,
            next_seq: 0,
        }
    }

    /// Most recent value seen by the gate, settled or not.
    pub fn latest(&self) -> &T {
        self.last_raw.as_ref().unwrap_or(&self.settled)
    }

    pub fn settled(&self) -> &T {
        &self.settled
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a raw change and restart the quiet-period timer.
    pub fn observe(&mut self, value: T) {
        self.cancel_pending();
        self.last_raw = Some(value);
        self.next_seq += 1;

        let seq = self.next_seq;
        let group = self.group;
        let quiet = self.quiet;
        let tx = self.expired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let _ = tx.send(DebounceExpired { group, seq });
        });
        self.pending = Some(PendingTimer { seq, handle });
    }

    /// Absorb a write the controller made itself.
    ///
    /// Without a pending edit the value becomes the settled snapshot and
    /// nothing fires. A pending edit keeps its timer and settles to the
    /// combined value.
    pub fn rebase(&mut self, value: T) {
        if self.pending.is_some() {
            self.last_raw = Some(value);
        } else {
            self.last_raw = None;
            self.settled = value;
        }
    }

    /// Drop any pending edit and settle on `value` without notifying.
    pub fn reset(&mut self, value: T) {
        self.cancel_pending();
        self.last_raw = None;
        self.settled = value;
    }

    /// Handle a timer expiry. Returns the newly settled value when the expiry
    /// is current and the value differs from the previous snapshot.
    pub fn on_expired(&mut self, seq: u64) -> Option<T> {
        match &self.pending {
            Some(pending) if pending.seq == seq => {}
            _ => {
                debug!(group = ?self.group, seq, "Ignoring stale debounce timer");
                return None;
            }
        }
        self.pending = None;

        let value = self.last_raw.take()?;
        if value == self.settled {
            return None;
        }
        self.settled = value.clone();
        Some(value)
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
    }
}

impl<T> Drop for DebounceGate<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(
        initial: &str,
    ) -> (
        DebounceGate<String>,
        mpsc::UnboundedReceiver<DebounceExpired>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = DebounceGate::new(
            WatchGroup::Title,
            DEFAULT_QUIET_PERIOD,
            initial.to_string(),
            tx,
        );
        (gate, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_edits_collapse_to_final_value() {
        let (mut gate, mut rx) = gate("");

        gate.observe("C".to_string());
        tokio::time::sleep(Duration::from_millis(200)).await;
        gate.observe("Co".to_string());
        tokio::time::sleep(Duration::from_millis(200)).await;
        gate.observe("Cool".to_string());

        let expired = rx.recv().await.unwrap();
        assert_eq!(gate.on_expired(expired.seq), Some("Cool".to_string()));
        assert_eq!(gate.settled(), "Cool");
        assert!(!gate.is_pending());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_waits_for_quiet_period() {
        let (mut gate, mut rx) = gate("");
        gate.observe("Title".to_string());

        tokio::time::sleep(Duration::from_millis(699)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let expired = rx.try_recv().unwrap();
        assert_eq!(expired.group, WatchGroup::Title);
        assert_eq!(gate.on_expired(expired.seq), Some("Title".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_value_does_not_fire() {
        let (mut gate, mut rx) = gate("Same");
        gate.observe("Different".to_string());
        gate.observe("Same".to_string());

        let expired = rx.recv().await.unwrap();
        assert_eq!(gate.on_expired(expired.seq), None);
        assert_eq!(gate.settled(), "Same");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_sequence_is_ignored() {
        let (mut gate, _rx) = gate("");
        gate.observe("first".to_string());
        gate.observe("second".to_string());

        assert_eq!(gate.on_expired(1), None);
        assert!(gate.is_pending());
        assert_eq!(gate.on_expired(2), Some("second".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebase_settles_silently() {
        let (mut gate, mut rx) = gate("");
        gate.rebase("written".to_string());

        assert_eq!(gate.settled(), "written");
        assert!(!gate.is_pending());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebase_keeps_pending_edit() {
        let (mut gate, mut rx) = gate("");
        gate.observe("typed".to_string());
        gate.rebase("typed+written".to_string());

        assert_eq!(gate.latest(), "typed+written");
        assert!(gate.is_pending());

        let expired = rx.recv().await.unwrap();
        assert_eq!(
            gate.on_expired(expired.seq),
            Some("typed+written".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending() {
        let (mut gate, mut rx) = gate("");
        gate.observe("typed".to_string());
        gate.reset("ingested".to_string());

        assert_eq!(gate.latest(), "ingested");
        assert!(!gate.is_pending());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(gate.on_expired(1), None);
    }
}
