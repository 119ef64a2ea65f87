//! Commands from the controller to the worker.
//!
//! Every command is a single atomic write. The worker only looks at them at
//! its check points, so nothing here interrupts a keystroke in flight.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

const NO_JUMP: usize = usize::MAX;

#[derive(Debug)]
struct ControlFlags {
    paused: AtomicBool,
    pause_episode: AtomicU64,
    stopped: AtomicBool,
    skip: AtomicBool,
    jump: AtomicUsize,
}

impl Default for ControlFlags {
    fn default() -> Self {
        Self {
            paused: AtomicBool::new(false),
            pause_episode: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            skip: AtomicBool::new(false),
            jump: AtomicUsize::new(NO_JUMP),
        }
    }
}

/// What the worker has to do at a check point, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Stop,
    Skip,
    Jump(usize),
    Pause,
    Proceed,
}

/// Shared handle for steering one session. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ControlPort {
    flags: Arc<ControlFlags>,
}

impl ControlPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip between paused and running. Returns `true` if now paused.
    pub fn toggle_pause(&self) -> bool {
        let was_paused = self.flags.paused.fetch_xor(true, Ordering::SeqCst);
        if !was_paused {
            self.flags.pause_episode.fetch_add(1, Ordering::SeqCst);
        }
        !was_paused
    }

    pub fn request_skip(&self) {
        self.flags.skip.store(true, Ordering::SeqCst);
    }

    /// Continue from `offset` in the original-text coordinate space.
    pub fn request_jump(&self, offset: usize) {
        self.flags
            .jump
            .store(offset.min(NO_JUMP - 1), Ordering::SeqCst);
    }

    pub fn request_stop(&self) {
        self.flags.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.stopped.load(Ordering::SeqCst)
    }

    /// Identifies the current pause; bumps every time a pause begins.
    pub(crate) fn pause_episode(&self) -> u64 {
        self.flags.pause_episode.load(Ordering::SeqCst)
    }

    /// A skip or jump is waiting to be picked up.
    pub(crate) fn has_redirect(&self) -> bool {
        self.flags.skip.load(Ordering::SeqCst) || self.flags.jump.load(Ordering::SeqCst) != NO_JUMP
    }

    /// Consume the most urgent pending request.
    pub(crate) fn next_directive(&self) -> Directive {
        if self.is_stopped() {
            return Directive::Stop;
        }
        if self.flags.skip.swap(false, Ordering::SeqCst) {
            return Directive::Skip;
        }
        let jump = self.flags.jump.swap(NO_JUMP, Ordering::SeqCst);
        if jump != NO_JUMP {
            return Directive::Jump(jump);
        }
        if self.is_paused() {
            return Directive::Pause;
        }
        Directive::Proceed
    }
}
