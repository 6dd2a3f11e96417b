//! Runtime module: the object a generated module exports.
//!
//! Holds the current source, renders it into sinks and pushes every update to
//! the sinks still attached. The module owns its listener list; sinks are held
//! weakly, so detaching or dropping a sink never depends on the module and
//! the other way round.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::runtime::sink::Sink;

/// Callback receiving the new source on every update
pub type ChangeListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by `on_change`, used to detach the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

struct ListenerEntry {
    id: ListenerId,
    listener: ChangeListener,
    /// Sink the listener renders into, for entries added by `insert`
    sink: Option<Weak<dyn Sink>>,
}

impl ListenerEntry {
    fn is_live(&self) -> bool {
        self.sink.as_ref().map_or(true, |sink| sink.strong_count() > 0)
    }
}

struct ModuleState {
    src: String,
    listeners: Vec<ListenerEntry>,
    next_id: u64,
}

impl ModuleState {
    fn push(&mut self, listener: ChangeListener, sink: Option<Weak<dyn Sink>>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(ListenerEntry { id, listener, sink });
        id
    }
}

#[derive(Clone)]
pub struct RuntimeModule {
    state: Arc<Mutex<ModuleState>>,
}

/// Non-owning reference to a [`RuntimeModule`].
#[derive(Clone)]
pub struct WeakRuntimeModule {
    state: Weak<Mutex<ModuleState>>,
}

impl WeakRuntimeModule {
    pub fn upgrade(&self) -> Option<RuntimeModule> {
        self.state.upgrade().map(|state| RuntimeModule { state })
    }

    /// `false` once every `RuntimeModule` clone has been dropped.
    pub fn is_alive(&self) -> bool {
        self.state.strong_count() > 0
    }
}

impl RuntimeModule {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ModuleState {
                src: src.into(),
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ModuleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn src(&self) -> String {
        self.lock().src.clone()
    }

    pub fn downgrade(&self) -> WeakRuntimeModule {
        WeakRuntimeModule {
            state: Arc::downgrade(&self.state),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Replace the source and notify listeners in registration order.
    ///
    /// Listeners registered when the update starts are all notified, even if
    /// one of them detaches another during the pass. Entries whose sink has
    /// been dropped are pruned first.
    pub fn update(&self, src: impl Into<String>) -> &Self {
        let src = src.into();
        let listeners: Vec<ChangeListener> = {
            let mut state = self.lock();
            state.src = src.clone();
            state.listeners.retain(ListenerEntry::is_live);
            state.listeners.iter().map(|e| e.listener.clone()).collect()
        };

        for listener in listeners {
            listener(&src);
        }
        self
    }

    pub fn on_change(&self, listener: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        self.lock().push(Arc::new(listener), None)
    }

    /// Detach a listener. Returns `false` if it was not attached.
    pub fn off_change(&self, id: ListenerId) -> bool {
        let mut state = self.lock();
        let before = state.listeners.len();
        state.listeners.retain(|e| e.id != id);
        state.listeners.len() != before
    }

    /// Render the current source into `sink` and keep it updated.
    pub fn insert<S: Sink + 'static>(&self, sink: &Arc<S>) -> InsertHandle {
        sink.render(&self.src());

        let weak_sink: Weak<S> = Arc::downgrade(sink);
        let listener: ChangeListener = Arc::new(move |src: &str| {
            if let Some(sink) = weak_sink.upgrade() {
                sink.render(src);
            }
        });

        let sink: Weak<dyn Sink> = Arc::downgrade(sink) as Weak<dyn Sink>;
        let id = self.lock().push(listener, Some(sink.clone()));
        InsertHandle {
            module: self.downgrade(),
            id,
            sink,
        }
    }
}

impl fmt::Display for RuntimeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lock().src)
    }
}

impl fmt::Debug for RuntimeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("RuntimeModule")
            .field("src", &state.src)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

/// One sink attached through [`RuntimeModule::insert`]
pub struct InsertHandle {
    module: WeakRuntimeModule,
    id: ListenerId,
    sink: Weak<dyn Sink>,
}

impl InsertHandle {
    pub fn listener_id(&self) -> ListenerId {
        self.id
    }

    /// Stop updating the sink and clear what it displays.
    pub fn remove(self) {
        if let Some(module) = self.module.upgrade() {
            module.off_change(self.id);
        }
        if let Some(sink) = self.sink.upgrade() {
            sink.render("");
        }
    }
}
