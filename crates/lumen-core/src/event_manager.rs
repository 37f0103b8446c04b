//! Event pub/sub dispatcher.

use crate::event::{Event, EventKind};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Receiver of dispatched events. Called synchronously on the firing thread.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> EventListener for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// Registry of listeners keyed by event kind.
///
/// Listeners are called in registration order. The registry lock is released
/// before listeners run, so a listener may fire further events.
#[derive(Default)]
pub struct EventManager {
    listeners: RwLock<HashMap<EventKind, Vec<Arc<dyn EventListener>>>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: EventKind, listener: Arc<dyn EventListener>) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.entry(kind).or_default().push(listener);
        debug!(%kind, "Listener registered");
    }

    pub fn register_all(&self, listener: Arc<dyn EventListener>) {
        for kind in EventKind::ALL {
            self.register(kind, listener.clone());
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Dispatch to every listener of the event's kind. Events with no
    /// listeners are dropped with a warning.
    pub fn fire(&self, event: Event) {
        let kind = event.kind();
        let listeners = {
            let guard = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            match guard.get(&kind) {
                Some(list) if !list.is_empty() => list.clone(),
                _ => {
                    warn!(%event, "No listeners registered, dropping event");
                    return;
                }
            }
        };

        debug!(%event, listeners = listeners.len(), "Dispatching event");
        for listener in listeners {
            listener.on_event(&event);
        }
    }

    /// Drop every listener. Called on project unload; breaks the reference
    /// cycle between the registry and the engines registered in it.
    pub fn clear(&self) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_dispatch_in_registration_order() {
        let manager = EventManager::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let log = log.clone();
            manager.register(
                EventKind::Selection,
                Arc::new(move |_: &Event| log.lock().unwrap().push(id)),
            );
        }

        manager.fire(Event::selection("intro", "red_box"));
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_other_kinds_not_delivered() {
        let manager = EventManager::new();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        manager.register(EventKind::HandOnTop, Arc::new(move |_: &Event| *h.lock().unwrap() += 1));

        manager.fire(Event::selection("intro", "red_box"));
        assert_eq!(*hits.lock().unwrap(), 0);

        manager.fire(Event::hand_on_top("intro", "cup"));
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_fire_without_listeners_is_dropped() {
        let manager = EventManager::new();
        manager.fire(Event::scene_shown("intro"));
        assert_eq!(manager.listener_count(EventKind::SceneShown), 0);
    }

    #[test]
    fn test_listener_may_fire_reentrantly() {
        let manager = Arc::new(EventManager::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let m = manager.clone();
        manager.register(
            EventKind::Selection,
            Arc::new(move |e: &Event| m.fire(Event::hand_on_top(e.scene(), "cup"))),
        );
        let s = seen.clone();
        manager.register(
            EventKind::HandOnTop,
            Arc::new(move |e: &Event| s.lock().unwrap().push(e.clone())),
        );

        manager.fire(Event::selection("intro", "red_box"));
        assert_eq!(*seen.lock().unwrap(), vec![Event::hand_on_top("intro", "cup")]);
    }

    #[test]
    fn test_clear() {
        let manager = EventManager::new();
        manager.register_all(Arc::new(|_: &Event| {}));
        assert_eq!(manager.listener_count(EventKind::TimerTick), 1);
        manager.clear();
        assert_eq!(manager.listener_count(EventKind::TimerTick), 0);
    }
}
