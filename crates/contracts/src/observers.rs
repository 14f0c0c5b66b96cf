//! Per-instance observer list
//!
//! Every emitter (axis, sequencer) owns its own `Observers`. Handlers are
//! isolated from each other: a handler that returns an error or panics is
//! logged and the remaining handlers still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::error;

use crate::ContractError;

/// Event handler.
///
/// Uses `Arc` so the same handler can be checked for duplicate registration
/// and shared across emitters.
pub type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Opaque subscription token returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription<E: ?Sized> {
    id: SubscriptionId,
    event: &'static str,
    handler: Handler<E>,
}

pub struct Observers<E: ?Sized> {
    supported: &'static [&'static str],
    subs: Vec<Subscription<E>>,
    next_id: u64,
}

impl<E: ?Sized> Observers<E> {
    pub fn new(supported: &'static [&'static str]) -> Self {
        Self {
            supported,
            subs: Vec::new(),
            next_id: 0,
        }
    }

    /// Register `handler` for `event`.
    ///
    /// Fails for unknown event names and for a handler already registered
    /// to the same event.
    pub fn subscribe(
        &mut self,
        event: &str,
        handler: Handler<E>,
    ) -> Result<SubscriptionId, ContractError> {
        let event = self.resolve(event)?;
        if self
            .subs
            .iter()
            .any(|s| s.event == event && Arc::ptr_eq(&s.handler, &handler))
        {
            return Err(ContractError::DuplicateSubscription {
                event: event.to_string(),
            });
        }
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subs.push(Subscription { id, event, handler });
        Ok(id)
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subs.len();
        self.subs.retain(|s| s.id != id);
        self.subs.len() != before
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    pub fn clear(&mut self) {
        self.subs.clear();
    }

    /// Deliver `payload` to every handler of `event`. Returns the number of
    /// handlers that failed.
    pub fn emit(&self, event: &str, payload: &E) -> usize {
        self.subs
            .iter()
            .filter(|s| s.event == event)
            .filter(|s| !Self::deliver(s, payload))
            .count()
    }

    /// Deliver `payload` to a single subscription only.
    pub fn emit_to(&self, id: SubscriptionId, payload: &E) -> bool {
        self.subs
            .iter()
            .find(|s| s.id == id)
            .map(|s| Self::deliver(s, payload))
            .unwrap_or(false)
    }

    fn deliver(sub: &Subscription<E>, payload: &E) -> bool {
        match catch_unwind(AssertUnwindSafe(|| (sub.handler)(payload))) {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(event = sub.event, subscription = sub.id.0, error = %e, "Observer failed");
                false
            }
            Err(_) => {
                error!(event = sub.event, subscription = sub.id.0, "Observer panicked");
                false
            }
        }
    }

    fn resolve(&self, event: &str) -> Result<&'static str, ContractError> {
        self.supported
            .iter()
            .copied()
            .find(|s| *s == event)
            .ok_or_else(|| ContractError::UnsupportedEvent {
                event: event.to_string(),
                supported: self.supported.to_vec(),
            })
    }
}

impl<E: ?Sized> std::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("supported", &self.supported)
            .field("subscriptions", &self.subs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const EVENTS: &[&str] = &["change"];

    #[test]
    fn test_duplicate_and_unknown_rejected() {
        let mut obs: Observers<u32> = Observers::new(EVENTS);
        let h: Handler<u32> = Arc::new(|_| Ok(()));
        obs.subscribe("change", h.clone()).unwrap();
        assert!(matches!(
            obs.subscribe("change", h.clone()),
            Err(ContractError::DuplicateSubscription { .. })
        ));
        assert!(matches!(
            obs.subscribe("remove", Arc::new(|_| Ok(()))),
            Err(ContractError::UnsupportedEvent { .. })
        ));
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let mut obs: Observers<u32> = Observers::new(EVENTS);
        let hits = Arc::new(AtomicUsize::new(0));

        obs.subscribe(
            "change",
            Arc::new(|_: &u32| -> anyhow::Result<()> { anyhow::bail!("boom") }),
        )
        .unwrap();
        obs.subscribe("change", Arc::new(|_| panic!("listener bug")))
            .unwrap();
        let counter = hits.clone();
        obs.subscribe(
            "change",
            Arc::new(move |v| {
                counter.fetch_add(*v as usize, Ordering::SeqCst);
                Ok(())
            }),
        )
        .unwrap();

        assert_eq!(obs.emit("change", &3), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe() {
        let mut obs: Observers<u32> = Observers::new(EVENTS);
        let id = obs.subscribe("change", Arc::new(|_| Ok(()))).unwrap();
        assert!(obs.unsubscribe(id));
        assert!(!obs.unsubscribe(id));
        assert!(obs.is_empty());
    }
}
