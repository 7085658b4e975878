//! Preview handle registry — the single owner of transient preview memory
//! for one batch.
//!
//! Interactive upload UIs need a renderable preview per pending image, and
//! each pipeline stage that produces new pixels (compress, crop) replaces
//! the previous preview. Scattering those buffers across components is how
//! leaks happen, so all of them live here, keyed by image id, with one
//! documented lifecycle: the owning coordinator creates the registry,
//! every stage registers through it, and teardown calls [`release_all`]
//! exactly once.
//!
//! [`release_all`]: HandleRegistry::release_all
//!
//! Mutations are serialized by an internal `Mutex` so pipeline stages
//! running on rayon workers can share one registry; the event sender lives
//! inside the same lock, which keeps the emitted register/release order
//! consistent with the actual mutation order.

use crate::types::{BatchEvent, ImageId};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::mpsc::Sender;

/// A renderable preview: the encoded payload a UI can decode and display,
/// plus its pixel dimensions.
#[derive(Debug, Clone)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Lightweight descriptor of a registered preview, held by the owning
/// `PendingImage`. The payload itself stays in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewHandle {
    pub id: ImageId,
    pub width: u32,
    pub height: u32,
}

/// Register/release counters, exposed for leak checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleStats {
    pub live: usize,
    pub registered_total: u64,
    pub released_total: u64,
}

#[derive(Default)]
struct State {
    live: HashMap<ImageId, Preview>,
    registered: u64,
    released: u64,
    events: Option<Sender<BatchEvent>>,
}

impl State {
    fn emit(&self, event: BatchEvent) {
        if let Some(sender) = &self.events {
            // A disconnected subscriber is not the registry's problem.
            let _ = sender.send(event);
        }
    }

    fn drop_preview(&mut self, id: ImageId) -> bool {
        if self.live.remove(&id).is_some() {
            self.released += 1;
            self.emit(BatchEvent::PreviewReleased { id });
            true
        } else {
            false
        }
    }
}

/// Registry of live previews for one batch. See the module docs for the
/// lifecycle contract.
pub struct HandleRegistry {
    inner: Mutex<State>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State::default()),
        }
    }

    /// A registry that reports register/release activity on the given
    /// channel.
    pub fn with_events(events: Sender<BatchEvent>) -> Self {
        Self {
            inner: Mutex::new(State {
                events: Some(events),
                ..State::default()
            }),
        }
    }

    /// Register a preview for `id`, retiring any previous preview for the
    /// same id first — two live previews for one slot never coexist.
    pub fn register(&self, id: ImageId, preview: Preview) -> PreviewHandle {
        let handle = PreviewHandle {
            id,
            width: preview.width,
            height: preview.height,
        };
        let mut state = self.inner.lock().unwrap();
        state.drop_preview(id);
        state.live.insert(id, preview);
        state.registered += 1;
        state.emit(BatchEvent::PreviewRegistered { id });
        handle
    }

    /// Release the preview for `id`. Releasing an id with no live preview
    /// is a no-op, not an error; returns whether anything was released.
    pub fn release(&self, id: ImageId) -> bool {
        self.inner.lock().unwrap().drop_preview(id)
    }

    /// Release every remaining preview. Called exactly once when the
    /// owning coordinator is torn down.
    pub fn release_all(&self) {
        let mut state = self.inner.lock().unwrap();
        let mut ids: Vec<ImageId> = state.live.keys().copied().collect();
        ids.sort_by_key(|id| id.0);
        for id in ids {
            state.drop_preview(id);
        }
    }

    /// Borrow the preview for `id` under the registry lock.
    pub fn with_preview<R>(&self, id: ImageId, f: impl FnOnce(&Preview) -> R) -> Option<R> {
        let state = self.inner.lock().unwrap();
        state.live.get(&id).map(f)
    }

    pub fn stats(&self) -> HandleStats {
        let state = self.inner.lock().unwrap();
        HandleStats {
            live: state.live.len(),
            registered_total: state.registered,
            released_total: state.released,
        }
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
