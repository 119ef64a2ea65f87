//! Notifications from the worker to the controller.
//!
//! The worker only publishes; whoever receives the events is responsible for
//! moving them onto its own thread before touching any UI state.

use crossbeam::channel::Sender;

/// Capacity of the worker-to-controller channel. A full channel blocks the
/// worker until the controller catches up.
pub const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    CountingDown,
    Running,
    Paused,
    Completed,
    Stopped,
    Errored,
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Replace session where the texts already matched.
    NoChanges,
    Stopped,
    Errored(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Progress(u8),
    Cursor(usize),
    Status(String),
    Log(String),
    PauseInfo { offset: usize, snippet: String },
    State(EngineState),
    Completion(Outcome),
}

pub trait EventSink: Send {
    fn publish(&mut self, event: Event);
}

impl EventSink for Sender<Event> {
    fn publish(&mut self, event: Event) {
        // A controller that hung up no longer cares.
        let _ = self.send(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn publish(&mut self, event: Event) {
        (**self).publish(event);
    }
}

impl EventSink for Vec<Event> {
    fn publish(&mut self, event: Event) {
        self.push(event);
    }
}

/// Render a `±20` character window around `offset`, with newlines shown as `↵`.
pub fn context_snippet(text: &[char], offset: usize) -> String {
    let offset = offset.min(text.len());
    let start = offset.saturating_sub(20);
    let end = (offset + 20).min(text.len());

    let visible = |c: &char| if *c == '\n' { '↵' } else { *c };
    let before: String = text[start..offset].iter().map(visible).collect();
    let after: String = text[offset..end].iter().map(visible).collect();
    format!("…{before}▌{after}…")
}
