//! Display targets for runtime modules.

use std::sync::{Mutex, PoisonError};

/// A target displaying a module's source. `render` replaces everything the
/// sink showed before.
pub trait Sink: Send + Sync {
    fn render(&self, content: &str);
}

/// Sink keeping the rendered text in memory.
#[derive(Debug, Default)]
pub struct TextSink {
    content: Mutex<String>,
}

impl TextSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> String {
        self.content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sink for TextSink {
    fn render(&self, content: &str) {
        let mut current = self.content.lock().unwrap_or_else(PoisonError::into_inner);
        current.clear();
        current.push_str(content);
    }
}
