//! Cross-screen trigger bus.
//!
//! A single-slot mailbox: a producer screen leaves one pending context and
//! every subscriber is notified; the consumer takes it exactly once. The bus
//! is owned by the pipeline and shared by reference, never a global.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::WeekKey;

/// Buffered notifications per subscriber before older ones are skipped.
const NOTIFY_CAPACITY: usize = 16;

/// Ask the deal planning view to open on an account and week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealPlanTrigger {
    pub account_id: String,
    pub week_key: WeekKey,
    /// Signals to highlight once the plan is shown.
    #[serde(default)]
    pub focus_signal_ids: Vec<String>,
}

/// Notification that a trigger was set. Carries a sequence number only;
/// the context itself must be taken with `consume_trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerNotice {
    pub seq: u64,
}

pub struct TriggerBus<T> {
    slot: Mutex<Slot<T>>,
    notify: broadcast::Sender<TriggerNotice>,
}

struct Slot<T> {
    pending: Option<T>,
    seq: u64,
}

impl<T: Clone> TriggerBus<T> {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            slot: Mutex::new(Slot {
                pending: None,
                seq: 0,
            }),
            notify,
        }
    }

    /// Store a pending context, replacing any unconsumed one, and notify.
    pub fn set_trigger(&self, ctx: T) {
        let seq = {
            let mut slot = self.slot.lock();
            let replaced = slot.pending.replace(ctx).is_some();
            slot.seq += 1;
            if replaced {
                log::debug!("TriggerBus: replaced unconsumed trigger (seq {})", slot.seq);
            }
            slot.seq
        };
        // No subscribers is fine; the context waits in the slot.
        let _ = self.notify.send(TriggerNotice { seq });
        log::info!("TriggerBus: trigger set (seq {})", seq);
    }

    /// Take and clear the pending context. `None` if nothing is pending.
    pub fn consume_trigger(&self) -> Option<T> {
        let taken = self.slot.lock().pending.take();
        if taken.is_some() {
            log::info!("TriggerBus: trigger consumed");
        }
        taken
    }

    /// Whether a context is waiting, without consuming it.
    pub fn has_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TriggerNotice> {
        self.notify.subscribe()
    }
}

impl<T: Clone> Default for TriggerBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(account: &str) -> DealPlanTrigger {
        DealPlanTrigger {
            account_id: account.to_string(),
            week_key: WeekKey::parse("2026-W07").unwrap(),
            focus_signal_ids: vec!["s1".to_string()],
        }
    }

    #[test]
    fn test_consume_once() {
        let bus = TriggerBus::new();
        bus.set_trigger(ctx("acme"));
        assert!(bus.has_pending());
        assert_eq!(bus.consume_trigger(), Some(ctx("acme")));
        assert_eq!(bus.consume_trigger(), None);
        assert!(!bus.has_pending());
    }

    #[test]
    fn test_nothing_pending_is_none() {
        let bus: TriggerBus<DealPlanTrigger> = TriggerBus::new();
        assert_eq!(bus.consume_trigger(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let bus = TriggerBus::new();
        bus.set_trigger(ctx("acme"));
        bus.set_trigger(ctx("globex"));
        assert_eq!(bus.consume_trigger().unwrap().account_id, "globex");
        assert_eq!(bus.consume_trigger(), None);
    }

    #[tokio::test]
    async fn test_subscriber_notified_then_consumes() {
        let bus = TriggerBus::new();
        let mut rx = bus.subscribe();

        bus.set_trigger(ctx("acme"));
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.seq, 1);
        assert_eq!(bus.consume_trigger().unwrap().account_id, "acme");

        bus.set_trigger(ctx("initech"));
        assert_eq!(rx.recv().await.unwrap().seq, 2);
    }

    #[test]
    fn test_set_without_subscribers_keeps_context() {
        let bus = TriggerBus::new();
        bus.set_trigger(ctx("acme"));
        let mut late = bus.subscribe();
        assert!(late.try_recv().is_err());
        assert_eq!(bus.consume_trigger().unwrap().account_id, "acme");
    }
}
