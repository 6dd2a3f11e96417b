//! Live update client.
//!
//! Runtime-side subscriber: every message received from the push channel is
//! re-emitted locally under `change:<uid>`. Generated modules bind their
//! runtime module to the key of their own file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use futures::StreamExt;

use crate::live::channel::MessageStream;
use crate::live::message::{change_key, LiveMessage};
use crate::runtime::{ListenerId, RuntimeModule, WeakRuntimeModule};

type EventListener = Arc<dyn Fn(&str) + Send + Sync>;

struct Entry {
    id: ListenerId,
    listener: EventListener,
    /// Module a `bind` entry forwards to; the entry goes away with it
    module: Option<WeakRuntimeModule>,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.module.as_ref().map_or(true, WeakRuntimeModule::is_alive)
    }
}

#[derive(Default)]
struct Listeners {
    by_key: HashMap<String, Vec<Entry>>,
    next_id: u64,
}

impl Listeners {
    fn push(&mut self, key: String, listener: EventListener, module: Option<WeakRuntimeModule>) -> ListenerId {
        let id = ListenerId::from_raw(self.next_id);
        self.next_id += 1;
        self.by_key.entry(key).or_default().push(Entry { id, listener, module });
        id
    }
}

#[derive(Default)]
pub struct LiveClient {
    listeners: Mutex<Listeners>,
}

impl LiveClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide client shared by all generated modules.
    pub fn global() -> &'static LiveClient {
        static CLIENT: OnceLock<LiveClient> = OnceLock::new();
        CLIENT.get_or_init(LiveClient::new)
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn on(&self, key: impl Into<String>, listener: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        self.lock().push(key.into(), Arc::new(listener), None)
    }

    pub fn off(&self, key: &str, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        match listeners.by_key.get_mut(key) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|entry| entry.id != id);
                entries.len() != before
            }
            None => false,
        }
    }

    /// Number of listeners attached under `key`.
    pub fn listener_count(&self, key: &str) -> usize {
        self.lock().by_key.get(key).map_or(0, Vec::len)
    }

    /// Call every listener of `key` with `payload`.
    ///
    /// Bindings whose module has been dropped are removed first.
    pub fn emit(&self, key: &str, payload: &str) {
        let snapshot: Vec<EventListener> = {
            let mut listeners = self.lock();
            match listeners.by_key.get_mut(key) {
                Some(entries) => {
                    entries.retain(Entry::is_live);
                    let snapshot: Vec<EventListener> = entries.iter().map(|entry| entry.listener.clone()).collect();
                    if entries.is_empty() {
                        listeners.by_key.remove(key);
                    }
                    snapshot
                }
                None => Vec::new(),
            }
        };

        for listener in snapshot {
            listener(payload);
        }
    }

    pub fn receive(&self, message: &LiveMessage) {
        match message {
            LiveMessage::Change(event) => self.emit(&change_key(&event.uid), &event.src),
        }
    }

    /// Forward `change:<uid>` events to `module.update`.
    ///
    /// Only a weak reference to the module is kept. The binding is dropped
    /// on the first event after the module itself is gone.
    pub fn bind(&self, uid: &str, module: &RuntimeModule) -> ListenerId {
        let weak = module.downgrade();
        let target = weak.clone();
        let listener: EventListener = Arc::new(move |src: &str| {
            if let Some(module) = target.upgrade() {
                module.update(src);
            }
        });
        self.lock().push(change_key(uid), listener, Some(weak))
    }

    /// Dispatch messages from a channel subscription until it ends.
    pub async fn listen(&self, mut messages: MessageStream) {
        while let Some(message) = messages.next().await {
            self.receive(&message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::channel::{InProcessChannel, PushChannel};
    use crate::runtime::TextSink;

    #[test]
    fn test_receive_reemits_under_change_key() {
        let client = LiveClient::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = seen.clone();
        client.on("change:a.html", move |src| log.lock().unwrap().push(src.to_string()));
        let log = seen.clone();
        client.on("change:b.html", move |src| log.lock().unwrap().push(format!("b={}", src)));

        client.receive(&LiveMessage::change("a.html", "1"));
        client.receive(&LiveMessage::change("a.html", "1"));
        client.receive(&LiveMessage::change("c.html", "ignored"));

        assert_eq!(*seen.lock().unwrap(), vec!["1", "1"]);
    }

    #[test]
    fn test_off_detaches() {
        let client = LiveClient::new();
        let id = client.on("change:a.html", |_| panic!("should be detached"));
        assert!(client.off("change:a.html", id));
        assert!(!client.off("change:a.html", id));
        assert!(!client.off("change:zzz", id));
        client.emit("change:a.html", "x");
    }

    #[test]
    fn test_bind_updates_module_sinks() {
        let client = LiveClient::new();
        let module = RuntimeModule::new("<p>old</p>");
        let sink = Arc::new(TextSink::new());
        let _handle = module.insert(&sink);

        client.bind("page.html", &module);
        client.receive(&LiveMessage::change("page.html", "<p>new</p>"));

        assert_eq!(module.src(), "<p>new</p>");
        assert_eq!(sink.content(), "<p>new</p>");
    }

    #[tokio::test]
    async fn test_listen_pumps_channel() {
        let channel = InProcessChannel::default();
        let client = Arc::new(LiveClient::new());
        let module = RuntimeModule::new("a");
        client.bind("x.html", &module);

        let stream = channel.subscribe().await.unwrap();
        let pump = {
            let client = client.clone();
            tokio::spawn(async move { client.listen(stream).await })
        };

        channel.broadcast(&LiveMessage::change("x.html", "b")).await.unwrap();
        drop(channel);
        pump.await.unwrap();

        assert_eq!(module.src(), "b");
    }

    #[test]
    fn test_global_is_shared() {
        assert!(std::ptr::eq(LiveClient::global(), LiveClient::global()));
    }

    #[test]
    fn test_binding_goes_away_with_module() {
        let client = LiveClient::new();
        let kept = RuntimeModule::new("a");
        client.bind("page.html", &kept);
        let plain = client.on("change:page.html", |_| {});

        for _ in 0..3 {
            let module = RuntimeModule::new("tmp");
            client.bind("page.html", &module);
        }
        client.bind("gone.html", &RuntimeModule::new("tmp"));
        assert_eq!(client.listener_count("change:page.html"), 5);

        client.receive(&LiveMessage::change("page.html", "b"));
        assert_eq!(client.listener_count("change:page.html"), 2);
        assert_eq!(kept.src(), "b");

        client.receive(&LiveMessage::change("gone.html", "b"));
        assert_eq!(client.listener_count("change:gone.html"), 0);
        assert!(client.off("change:page.html", plain));
    }
}
