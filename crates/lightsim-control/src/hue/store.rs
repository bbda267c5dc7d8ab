//! Light resource store with per-light update observers

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::models::{Color, Dimming, LightState, LightUpdate, Xy};
use super::stream::StreamEntry;

/// Receives light-state updates.
///
/// Called synchronously on whichever thread produced the update (an HTTP
/// handler or the stream listener), after the store lock has been released.
pub trait LightObserver: Send + Sync {
    fn on_light_update(&self, state: &LightState);
}

impl<F> LightObserver for F
where
    F: Fn(&LightState) + Send + Sync,
{
    fn on_light_update(&self, state: &LightState) {
        self(state)
    }
}

/// Mapping of light id to state, plus the observer attached to each light
#[derive(Default)]
pub struct LightResourceStore {
    lights: RwLock<BTreeMap<String, LightState>>,
    observers: RwLock<HashMap<String, Arc<dyn LightObserver>>>,
}

impl LightResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lights, ordered by id
    pub fn list(&self) -> Vec<LightState> {
        self.lights.read().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<LightState> {
        self.lights.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lights.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lights.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.read().is_empty()
    }

    /// Create an empty record if `id` is unknown. Returns true if created.
    pub fn ensure(&self, id: &str) -> bool {
        let mut lights = self.lights.write();
        if lights.contains_key(id) {
            return false;
        }
        lights.insert(id.to_string(), LightState::new(id));
        true
    }

    /// Attach or replace the observer for `id`
    pub fn set_observer(&self, id: &str, observer: Arc<dyn LightObserver>) {
        self.observers.write().insert(id.to_string(), observer);
    }

    pub fn has_observer(&self, id: &str) -> bool {
        self.observers.read().contains_key(id)
    }

    /// Merge a resource-API update, creating the light if needed, then notify
    pub fn apply_update(&self, id: &str, update: &LightUpdate) -> LightState {
        let snapshot = {
            let mut lights = self.lights.write();
            let light = lights
                .entry(id.to_string())
                .or_insert_with(|| LightState::new(id));
            update.apply_to(light);
            light.clone()
        };
        self.notify(&snapshot);
        snapshot
    }

    /// Apply one streamed color entry to `id`, then notify.
    ///
    /// Streaming carries no chromaticity, so xy is reset to (0, 0).
    pub fn apply_stream(&self, id: &str, entry: &StreamEntry) -> LightState {
        let snapshot = {
            let mut lights = self.lights.write();
            let light = lights
                .entry(id.to_string())
                .or_insert_with(|| LightState::new(id));
            let (r, g, b) = entry.rgb8();
            light.on = Some(true);
            light.dimming = Some(Dimming {
                brightness: Some(entry.brightness()),
            });
            light.color = Some(Color {
                xy: Some(Xy::default()),
            });
            light.stream_rgb = Some([r, g, b]);
            light.clone()
        };
        self.notify(&snapshot);
        snapshot
    }

    fn notify(&self, state: &LightState) {
        let observer = self.observers.read().get(&state.id).cloned();
        if let Some(observer) = observer {
            observer.on_light_update(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_update_creates_light() {
        let store = LightResourceStore::new();
        assert!(store.get("1").is_none());

        let state = store.apply_update("1", &LightUpdate::new().with_brightness(42));
        assert_eq!(state.brightness(), Some(42));
        assert_eq!(store.get("1"), Some(state));
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let store = LightResourceStore::new();
        assert!(!store.contains("a"));
        assert!(store.ensure("a"));
        assert!(store.contains("a"));
        store.apply_update("a", &LightUpdate::new().with_on(true));
        assert!(!store.ensure("a"));
        assert_eq!(store.get("a").unwrap().on, Some(true));
    }

    #[test]
    fn test_list_is_ordered() {
        let store = LightResourceStore::new();
        store.ensure("b");
        store.ensure("a");
        store.ensure("c");
        let ids: Vec<_> = store.list().into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_observer_sees_merged_state() {
        let store = LightResourceStore::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        store.set_observer(
            "1",
            Arc::new(move |state: &LightState| sink.lock().push(state.clone())),
        );
        // An observer alone does not create the light
        assert!(store.has_observer("1"));
        assert!(!store.has_observer("2"));
        assert!(!store.contains("1"));

        store.apply_update("1", &LightUpdate::new().with_on(true));
        store.apply_update("1", &LightUpdate::new().with_brightness(10));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].on, Some(true));
        assert_eq!(seen[1].brightness(), Some(10));
    }

    #[test]
    fn test_stream_entry_applies_rgb() {
        let store = LightResourceStore::new();
        let state = store.apply_stream("1", &StreamEntry::from_rgb8(0, 200, 100, 0));

        assert_eq!(state.on, Some(true));
        assert_eq!(state.brightness(), Some(78));
        assert_eq!(state.xy(), Some(Xy::new(0.0, 0.0)));
        assert_eq!(state.stream_rgb, Some([200, 100, 0]));
    }

    #[test]
    fn test_observer_may_read_store() {
        let store = Arc::new(LightResourceStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let (inner, counter) = (Arc::downgrade(&store), calls.clone());
        store.set_observer(
            "1",
            Arc::new(move |state: &LightState| {
                if let Some(store) = inner.upgrade() {
                    assert_eq!(store.get(&state.id).as_ref(), Some(state));
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        store.apply_update("1", &LightUpdate::new().with_on(false));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
