//! Unified UI output interface.
//!
//! Commands hold an [`Output`] and pass it to core components as their
//! [`Reporter`]. Every call becomes an event for the UI actor.

use std::sync::{OnceLock, mpsc};

use relman_core::Reporter;

use super::actor::{UiActor, UiEvent};

/// Singleton instance of the UI actor channel.
static UI_ACTOR: OnceLock<mpsc::Sender<UiEvent>> = OnceLock::new();

fn get_actor_sender() -> mpsc::Sender<UiEvent> {
    UI_ACTOR
        .get_or_init(|| {
            let actor = UiActor::spawn();
            let sender = actor.sender();

            // Keep actor alive for program duration
            std::mem::forget(actor);

            sender
        })
        .clone()
}

/// A cloneable handle for sending UI events to the terminal actor.
#[derive(Debug, Clone)]
pub struct Output {
    sender: mpsc::Sender<UiEvent>,
}

impl Output {
    pub fn new() -> Self {
        Self {
            sender: get_actor_sender(),
        }
    }

    fn send(&self, event: UiEvent) {
        let _ = self.sender.send(event);
    }

    /// Block until all pending UI events are rendered.
    pub fn wait(&self) {
        let (tx, rx) = mpsc::channel();
        self.send(UiEvent::Sync(tx));
        let _ = rx.recv();
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for Output {
    fn section(&self, title: &str) {
        self.send(UiEvent::Section(title.to_string()));
    }

    fn downloading(&self, name: &str, current: u64, total: Option<u64>) {
        self.send(UiEvent::Transfer {
            verb: "downloading",
            name: name.to_string(),
            current,
            total,
        });
    }

    fn uploading(&self, name: &str, size: u64) {
        self.send(UiEvent::Transfer {
            verb: "uploading",
            name: name.to_string(),
            current: 0,
            total: Some(size),
        });
    }

    fn removing(&self, name: &str) {
        self.send(UiEvent::Removing(name.to_string()));
    }

    fn done(&self, name: &str, detail: &str, size: Option<u64>) {
        self.send(UiEvent::Done {
            name: name.to_string(),
            detail: detail.to_string(),
            size,
        });
    }

    fn failed(&self, name: &str, reason: &str) {
        self.send(UiEvent::Failed {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }

    fn info(&self, msg: &str) {
        self.send(UiEvent::Info(msg.to_string()));
    }

    fn success(&self, msg: &str) {
        self.send(UiEvent::Success(msg.to_string()));
    }

    fn warning(&self, msg: &str) {
        self.send(UiEvent::Warning(msg.to_string()));
    }

    fn error(&self, msg: &str) {
        self.send(UiEvent::Error(msg.to_string()));
    }
}
