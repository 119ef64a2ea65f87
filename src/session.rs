//! Starting sessions and talking to the worker thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver};
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::control::ControlPort;
use crate::engine::Engine;
use crate::error::SessionError;
use crate::events::{Event, EventSink, Outcome, EVENT_CAPACITY};
use crate::inject::InputInjector;
use crate::model::SessionConfig;

/// Knobs that only matter for how the worker runs, not what it types.
pub struct Launch {
    seed: Option<u64>,
    clock: Box<dyn Clock>,
}

impl Default for Launch {
    fn default() -> Self {
        Self {
            seed: None,
            clock: Box::new(SystemClock),
        }
    }
}

impl Launch {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }
}

/// Clears the live flag when the worker exits, however it exits.
struct LiveGuard(Arc<AtomicBool>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Starts sessions, at most one at a time.
#[derive(Debug, Default)]
pub struct Controller {
    live: Arc<AtomicBool>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn start<I>(&self, config: SessionConfig, injector: I) -> Result<SessionHandle, SessionError>
    where
        I: InputInjector + 'static,
    {
        self.start_with(config, injector, Launch::default())
    }

    /// Validate `config`, compute the edit script and spawn the worker.
    pub fn start_with<I>(
        &self,
        config: SessionConfig,
        injector: I,
        launch: Launch,
    ) -> Result<SessionHandle, SessionError>
    where
        I: InputInjector + 'static,
    {
        config.validate()?;
        if self
            .live
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::SessionActive);
        }
        let guard = LiveGuard(Arc::clone(&self.live));

        let controls = ControlPort::new();
        let (tx, rx) = bounded(EVENT_CAPACITY);
        info!(kind = ?config.kind, mode = ?config.options.mode, "starting session");

        let worker_controls = controls.clone();
        let thread = thread::Builder::new()
            .name("keyscribe-worker".to_string())
            .spawn(move || {
                let _guard = guard;
                let mut fallback = tx.clone();
                // The edit script is computed here, off the controller's thread.
                let session = move || {
                    let mut engine = Engine::new(&config, injector, tx, worker_controls)
                        .with_boxed_clock(launch.clock);
                    if let Some(seed) = launch.seed {
                        engine = engine.with_seed(seed);
                    }
                    engine.run()
                };
                match panic::catch_unwind(AssertUnwindSafe(session)) {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("worker panicked");
                        let outcome = Outcome::Errored("worker panicked".to_string());
                        fallback.publish(Event::Completion(outcome.clone()));
                        outcome
                    }
                }
            })
            .map_err(|err| SessionError::Spawn(err.to_string()))?;

        Ok(SessionHandle {
            controls,
            events: rx,
            thread,
        })
    }
}

/// The controller's side of one running session.
pub struct SessionHandle {
    controls: ControlPort,
    events: Receiver<Event>,
    thread: JoinHandle<Outcome>,
}

impl SessionHandle {
    pub fn control(&self) -> &ControlPort {
        &self.controls
    }

    pub fn toggle_pause(&self) -> bool {
        self.controls.toggle_pause()
    }

    pub fn request_skip(&self) {
        self.controls.request_skip();
    }

    pub fn request_jump(&self, offset: usize) {
        self.controls.request_jump(offset);
    }

    pub fn request_stop(&self) {
        self.controls.request_stop();
    }

    /// Worker notifications, to be drained on the controller's own thread.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Hand every event to `on_event` until the worker exits.
    pub fn wait(self, mut on_event: impl FnMut(&Event)) -> Outcome {
        for event in self.events.iter() {
            on_event(&event);
        }
        self.thread
            .join()
            .unwrap_or_else(|_| Outcome::Errored("worker panicked".to_string()))
    }

    /// Drain remaining events and wait for the worker.
    pub fn join(self) -> Outcome {
        self.wait(|_| {})
    }
}
