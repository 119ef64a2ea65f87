//! The worker state machine.
//!
//! One engine runs one session: count down, then work through either the
//! raw text (Fresh) or the edit script (Replace), checking the control port
//! at every character boundary. Both kinds go through the same three
//! primitives: typing characters, deleting characters and stepping over
//! characters that are already right.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock, POLL_INTERVAL};
use crate::control::{ControlPort, Directive};
use crate::diff;
use crate::error::SessionError;
use crate::events::{context_snippet, EngineState, Event, EventSink, Outcome};
use crate::inject::{InputInjector, Key, Modifier};
use crate::keyboard::is_word_break;
use crate::model::{DeleteStrategy, EditOp, OpKind, SessionConfig, SessionKind};
use crate::timing::{Pause, TimingModel};
use crate::typo::{TypoInjector, TypoPlan};

const EQUAL_PACE: f64 = 0.3;
const SELECT_STEP_SECS: f64 = 0.04;
const DELETE_STEP_SECS: f64 = 0.06;

/// What a session works through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workload {
    Fresh { text: String },
    Replace { script: Vec<EditOp> },
}

impl Workload {
    /// Computes the edit script for Replace sessions.
    pub fn from_config(config: &SessionConfig) -> Self {
        match config.kind {
            SessionKind::Fresh => Workload::Fresh {
                text: config.original_text.clone(),
            },
            SessionKind::Replace => Workload::Replace {
                script: diff::compute_script(&config.original_text, &config.replacement_text),
            },
        }
    }

    /// The text the logical cursor points into.
    pub fn document(&self) -> String {
        match self {
            Workload::Fresh { text } => text.clone(),
            Workload::Replace { script } => diff::original_text(script),
        }
    }

    pub fn total_work(&self) -> usize {
        match self {
            Workload::Fresh { text } => text.chars().count(),
            Workload::Replace { script } => diff::total_work(script),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
    Jump(usize),
}

type Step = Result<Flow, SessionError>;

/// Return early from a `Step` function unless `$flow` says to continue.
macro_rules! proceed {
    ($flow:expr) => {
        match $flow {
            Flow::Continue => {}
            other => return Ok(other),
        }
    };
}

/// Length of the whitespace-delimited word each char belongs to (0 for breaks).
fn word_lengths(chars: &[char]) -> Vec<usize> {
    let mut lens = vec![0; chars.len()];
    let mut start = 0;
    while start < chars.len() {
        if is_word_break(chars[start]) {
            start += 1;
            continue;
        }
        let end = chars[start..]
            .iter()
            .position(|&c| is_word_break(c))
            .map_or(chars.len(), |n| start + n);
        lens[start..end].fill(end - start);
        start = end;
    }
    lens
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub struct Engine<I, S> {
    injector: I,
    sink: S,
    controls: ControlPort,
    clock: Box<dyn Clock>,
    rng: StdRng,

    workload: Workload,
    document: Vec<char>,
    word_lens: Vec<usize>,
    start_offset: usize,
    countdown_secs: u64,
    delete_strategy: DeleteStrategy,
    bot: bool,

    timing: TimingModel,
    typos: TypoInjector,

    state: EngineState,
    cursor: usize,
    done: usize,
    total: usize,
    reported_cursor: Option<usize>,
    reported_progress: Option<u8>,
    status: String,
    notified_episode: Option<u64>,
    in_word: bool,
    fast: bool,
}

impl<I: InputInjector, S: EventSink> Engine<I, S> {
    pub fn new(config: &SessionConfig, injector: I, sink: S, controls: ControlPort) -> Self {
        Self::with_workload(config, Workload::from_config(config), injector, sink, controls)
    }

    /// Build an engine around an already computed workload.
    ///
    /// `config` is assumed to have passed [`SessionConfig::validate`].
    pub fn with_workload(
        config: &SessionConfig,
        workload: Workload,
        injector: I,
        sink: S,
        controls: ControlPort,
    ) -> Self {
        let document: Vec<char> = workload.document().chars().collect();
        let word_lens = word_lengths(&document);
        let total = workload.total_work();
        Self {
            injector,
            sink,
            controls,
            clock: Box::new(SystemClock),
            rng: StdRng::from_entropy(),
            start_offset: config.start_offset.min(document.len()),
            document,
            word_lens,
            workload,
            countdown_secs: config.options.start_delay_secs,
            delete_strategy: config.delete_strategy,
            bot: config.options.is_bot(),
            timing: TimingModel::new(&config.options),
            typos: TypoInjector::new(&config.options),
            state: EngineState::Idle,
            cursor: 0,
            done: 0,
            total,
            reported_cursor: None,
            reported_progress: None,
            status: String::new(),
            notified_episode: None,
            in_word: false,
            fast: false,
        }
    }

    pub fn with_clock(self, clock: impl Clock + 'static) -> Self {
        self.with_boxed_clock(Box::new(clock))
    }

    pub fn with_boxed_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Run the session to its terminal state. Always publishes exactly one
    /// [`Event::Completion`].
    pub fn run(mut self) -> Outcome {
        info!(
            chars = self.document.len(),
            work = self.total,
            bot = self.bot,
            "session started"
        );
        let outcome = match self.drive() {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "session failed");
                Outcome::Errored(err.to_string())
            }
        };
        self.conclude(&outcome);
        info!(?outcome, "session ended");
        outcome
    }

    fn drive(&mut self) -> Result<Outcome, SessionError> {
        if self.count_down() == Flow::Stop {
            return Ok(Outcome::Stopped);
        }
        self.set_state(EngineState::Running);
        self.set_status("Typing…");

        let no_changes = matches!(
            &self.workload,
            Workload::Replace { script } if !script.iter().any(EditOp::is_change)
        );
        if no_changes {
            self.log("No changes detected. Ending early.");
            self.finish_position();
            return Ok(Outcome::NoChanges);
        }

        let mut start = self.start_offset;
        loop {
            let flow = match self.script_from(start) {
                None => self.run_fresh(start)?,
                Some(rest) => self.run_script(&rest)?,
            };

            match flow {
                Flow::Continue => return Ok(Outcome::Completed),
                Flow::Stop => return Ok(Outcome::Stopped),
                Flow::Jump(offset) => {
                    start = offset.min(self.document.len());
                    info!(offset = start, "jumping");
                    self.log(format!("Jumped to position {start}."));
                    self.timing.reset_word_count();
                    self.in_word = false;
                }
            }
        }
    }

    fn count_down(&mut self) -> Flow {
        if self.countdown_secs == 0 {
            return Flow::Continue;
        }
        self.set_state(EngineState::CountingDown);
        for remaining in (1..=self.countdown_secs).rev() {
            if self.controls.is_stopped() {
                return Flow::Stop;
            }
            self.set_status(&format!("Starting in {remaining}…"));
            if self.wait(Duration::from_secs(1)) == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// The part of the Replace script still to do from `start`, with the
    /// position reset to match. `None` for Fresh sessions.
    fn script_from(&mut self, start: usize) -> Option<Vec<EditOp>> {
        let Workload::Replace { script } = &self.workload else {
            return None;
        };
        let (rest, skipped) = diff::trim(script, start);
        self.cursor = start;
        self.done = skipped;
        self.report_position();
        Some(rest)
    }

    fn run_fresh(&mut self, start: usize) -> Step {
        let chars = self.document[start..].to_vec();
        let lens = self.word_lens[start..].to_vec();
        self.cursor = start;
        self.done = start;
        self.report_position();

        proceed!(self.type_chars(&chars, &lens, true, true)?);
        self.finish_position();
        Ok(Flow::Continue)
    }

    /// Work through `script`, stopping right after the last real change.
    fn run_script(&mut self, script: &[EditOp]) -> Step {
        let Some(last_change) = script.iter().rposition(EditOp::is_change) else {
            self.finish_position();
            return Ok(Flow::Continue);
        };

        for op in &script[..=last_change] {
            proceed!(self.checkpoint());
            proceed!(self.apply_op(op)?);
        }

        let trailing: usize = script[last_change + 1..].iter().map(EditOp::old_len).sum();
        if trailing > 0 && self.bulk() {
            self.injector.press_key_repeated(Key::Right, trailing)?;
        }
        self.finish_position();
        Ok(Flow::Continue)
    }

    fn apply_op(&mut self, op: &EditOp) -> Step {
        let old: Vec<char> = op.old_text.chars().collect();
        let new: Vec<char> = op.new_text.chars().collect();
        match op.kind {
            OpKind::Equal => self.advance_over(&old),
            OpKind::Delete => {
                proceed!(self.delete_chars(&old)?);
                self.log(format!("Deleted: '{}'", preview(&op.old_text, 30)));
                Ok(Flow::Continue)
            }
            OpKind::Insert => {
                proceed!(self.type_chars(&new, &word_lengths(&new), false, false)?);
                self.log(format!("Inserted: '{}'", preview(&op.new_text, 30)));
                Ok(Flow::Continue)
            }
            OpKind::Replace => {
                proceed!(self.delete_chars(&old)?);
                proceed!(self.type_chars(&new, &word_lengths(&new), false, false)?);
                self.log(format!(
                    "Replaced: '{}' → '{}'",
                    preview(&op.old_text, 20),
                    preview(&op.new_text, 20)
                ));
                Ok(Flow::Continue)
            }
        }
    }

    /// Keystrokes go out in bulk without delays.
    fn bulk(&self) -> bool {
        self.bot || self.fast
    }

    /// Type `chars`. `advances` is set when the chars exist in the cursor's
    /// coordinate space (Fresh text), unset for text that is new (inserts).
    fn type_chars(
        &mut self,
        chars: &[char],
        word_lens: &[usize],
        allow_typos: bool,
        advances: bool,
    ) -> Step {
        let mut i = 0;
        while i < chars.len() {
            proceed!(self.checkpoint());

            if self.bulk() && !advances {
                let rest = &chars[i..];
                self.write_run(rest)?;
                self.done += rest.len();
                self.report_position();
                return Ok(Flow::Continue);
            }

            if allow_typos && !self.fast {
                if let Some(plan) = self.typos.plan(chars, i, &mut self.rng) {
                    proceed!(self.type_with_typo(chars, plan, advances)?);
                    i = plan.word_end;
                    continue;
                }
            }

            let c = chars[i];
            self.type_char(c)?;
            self.done += 1;
            if advances {
                self.cursor += 1;
            }
            self.report_position();

            if !self.fast {
                let delay = self.timing.char_delay(Some(c), word_lens[i], &mut self.rng);
                proceed!(self.wait(delay));
                proceed!(self.pauses_after(c));
            }
            i += 1;
        }
        Ok(Flow::Continue)
    }

    /// Mistype `plan.intended`, finish the word, notice, erase back to the
    /// typo and retype the word. Only Stop interrupts the sequence.
    fn type_with_typo(&mut self, chars: &[char], plan: TypoPlan, advances: bool) -> Step {
        let word_len = plan.word_end - plan.position;

        self.type_char(plan.wrong)?;
        self.log(format!(
            "Typo at pos {}: '{}' → '{}'",
            self.cursor, plan.intended, plan.wrong
        ));
        let delay = self.timing.char_delay(Some(plan.wrong), word_len, &mut self.rng);
        proceed!(self.wait(delay));

        for &c in &chars[plan.position + 1..plan.word_end] {
            proceed!(self.stop_check());
            self.type_char(c)?;
            let delay = self.timing.char_delay(Some(c), word_len, &mut self.rng);
            proceed!(self.wait(delay));
        }

        let notice = self.timing.scaled_delay_between(0.5, 2.0, &mut self.rng);
        proceed!(self.wait(notice));

        for _ in 0..plan.backspaces() {
            proceed!(self.stop_check());
            self.injector.press_key(Key::Backspace)?;
            let gap = self.timing.scaled_delay_between(0.04, 0.2, &mut self.rng);
            proceed!(self.wait(gap));
        }

        let find = self.timing.scaled_delay_between(0.5, 2.0, &mut self.rng);
        proceed!(self.wait(find));

        for &c in &chars[plan.position..plan.word_end] {
            proceed!(self.stop_check());
            self.type_char(c)?;
            self.done += 1;
            if advances {
                self.cursor += 1;
            }
            self.report_position();
            let delay = self.timing.char_delay(Some(c), word_len, &mut self.rng);
            proceed!(self.wait(delay));
        }

        self.in_word = true;
        Ok(Flow::Continue)
    }

    /// Step the caret over text that already matches.
    fn advance_over(&mut self, chars: &[char]) -> Step {
        let lens = word_lengths(chars);
        let mut i = 0;
        while i < chars.len() {
            proceed!(self.checkpoint());

            if self.bulk() {
                let n = chars.len() - i;
                self.injector.press_key_repeated(Key::Right, n)?;
                self.cursor += n;
                self.done += n;
                self.report_position();
                return Ok(Flow::Continue);
            }

            let c = chars[i];
            self.injector.press_key(Key::Right)?;
            self.cursor += 1;
            self.done += 1;
            self.report_position();

            let delay = self
                .timing
                .char_delay(Some(c), lens[i], &mut self.rng)
                .mul_f64(EQUAL_PACE);
            self.timing.override_last_delay(delay);
            proceed!(self.wait(delay));
            proceed!(self.pauses_after(c));
            i += 1;
        }
        Ok(Flow::Continue)
    }

    /// Remove `chars`, which sit right after the caret.
    fn delete_chars(&mut self, chars: &[char]) -> Step {
        let mut selected = 0;
        let mut i = 0;
        while i < chars.len() {
            let flow = self.checkpoint();
            if flow != Flow::Continue {
                // Commit a half-built selection so a jump does not type over it.
                if selected > 0 && matches!(flow, Flow::Jump(_)) {
                    self.injector.press_key(Key::Delete)?;
                }
                return Ok(flow);
            }

            if self.bulk() {
                if selected > 0 {
                    self.injector.press_key(Key::Delete)?;
                }
                let n = chars.len() - i;
                self.injector.press_key_repeated(Key::Delete, n)?;
                self.cursor += n;
                self.done += n;
                self.report_position();
                return Ok(Flow::Continue);
            }

            let step_secs = match self.delete_strategy {
                DeleteStrategy::Select => {
                    self.injector.hold_modifier(Modifier::Shift)?;
                    self.injector.press_key(Key::Right)?;
                    self.injector.release_modifier(Modifier::Shift)?;
                    selected += 1;
                    SELECT_STEP_SECS
                }
                DeleteStrategy::PerChar => {
                    self.injector.press_key(Key::Delete)?;
                    DELETE_STEP_SECS
                }
            };
            self.cursor += 1;
            self.done += 1;
            self.report_position();

            let delay = self.timing.scaled_delay(step_secs, &mut self.rng);
            proceed!(self.wait(delay));
            i += 1;
        }

        if selected > 0 {
            self.injector.press_key(Key::Delete)?;
        }
        Ok(Flow::Continue)
    }

    fn type_char(&mut self, c: char) -> Result<(), SessionError> {
        match c {
            '\n' => self.injector.press_key(Key::Enter)?,
            '\t' => self.injector.press_key(Key::Tab)?,
            _ => self.injector.write_text(c.encode_utf8(&mut [0; 4]))?,
        }
        Ok(())
    }

    /// Write `chars` with as few injector calls as possible.
    fn write_run(&mut self, chars: &[char]) -> Result<(), SessionError> {
        let mut run = String::new();
        for &c in chars {
            if c == '\n' || c == '\t' {
                if !run.is_empty() {
                    self.injector.write_text(&run)?;
                    run.clear();
                }
                self.type_char(c)?;
            } else {
                run.push(c);
            }
        }
        if !run.is_empty() {
            self.injector.write_text(&run)?;
        }
        Ok(())
    }

    /// Thinking pause after sentence ends, word pause after a finished word.
    fn pauses_after(&mut self, c: char) -> Flow {
        if let Some(pause) = self.timing.thinking_pause(c, &mut self.rng) {
            if self.take_pause(pause) == Flow::Stop {
                return Flow::Stop;
            }
        }

        if !is_word_break(c) {
            self.in_word = true;
            return Flow::Continue;
        }
        let finished_word = std::mem::replace(&mut self.in_word, false);
        if finished_word {
            if let Some(pause) = self.timing.word_pause(&mut self.rng) {
                return self.take_pause(pause);
            }
        }
        Flow::Continue
    }

    /// Wait out a pause without letting it skew the tempo.
    fn take_pause(&mut self, pause: Pause) -> Flow {
        self.log(pause.reason);
        self.set_status("Thinking…");
        let saved = self.timing.last_delay();
        let flow = self.linger(pause.duration);
        self.timing.restore_last_delay(saved);
        self.set_status("Typing…");
        flow
    }

    /// Consume pending control requests, highest priority first.
    fn checkpoint(&mut self) -> Flow {
        loop {
            match self.controls.next_directive() {
                Directive::Stop => return Flow::Stop,
                Directive::Skip => self.begin_fast_forward(),
                Directive::Jump(offset) if !self.fast => return Flow::Jump(offset),
                Directive::Jump(offset) => debug!(offset, "jump ignored while fast-forwarding"),
                Directive::Pause => self.hold_while_paused(),
                Directive::Proceed => return Flow::Continue,
            }
        }
    }

    fn stop_check(&self) -> Flow {
        if self.controls.is_stopped() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn begin_fast_forward(&mut self) {
        if self.fast {
            return;
        }
        self.fast = true;
        info!(offset = self.cursor, "skip requested");
        self.log("Skipping ahead. Typing the rest without delays.");
    }

    /// Block until resumed or stopped, announcing each pause episode once.
    fn hold_while_paused(&mut self) {
        let resume_state = self.state;
        let resume_status = self.status.clone();
        self.set_state(EngineState::Paused);
        self.set_status("Paused");

        loop {
            let episode = self.controls.pause_episode();
            if self.notified_episode != Some(episode) {
                self.notified_episode = Some(episode);
                let snippet = context_snippet(&self.document, self.cursor);
                debug!(offset = self.cursor, episode, "paused");
                self.emit(Event::PauseInfo {
                    offset: self.cursor,
                    snippet,
                });
            }
            if !self.controls.is_paused() || self.controls.is_stopped() {
                break;
            }
            self.clock.sleep(POLL_INTERVAL);
        }

        if !self.controls.is_stopped() {
            self.set_state(resume_state);
            self.set_status(&resume_status);
        }
    }

    /// Sleep in slices of at most [`POLL_INTERVAL`], honoring Stop and Pause.
    fn wait(&mut self, duration: Duration) -> Flow {
        self.sleep_polled(duration, false)
    }

    /// Like [`Self::wait`], but a pending skip or jump also ends it early.
    fn linger(&mut self, duration: Duration) -> Flow {
        self.sleep_polled(duration, true)
    }

    fn sleep_polled(&mut self, duration: Duration, yield_to_redirect: bool) -> Flow {
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.controls.is_stopped() {
                return Flow::Stop;
            }
            if self.controls.is_paused() {
                self.hold_while_paused();
                continue;
            }
            if yield_to_redirect && self.controls.has_redirect() {
                break;
            }
            let slice = remaining.min(POLL_INTERVAL);
            self.clock.sleep(slice);
            remaining -= slice;
        }
        Flow::Continue
    }

    fn finish_position(&mut self) {
        self.cursor = self.document.len();
        self.done = self.total;
        self.report_position();
    }

    fn report_position(&mut self) {
        if self.reported_cursor != Some(self.cursor) {
            self.reported_cursor = Some(self.cursor);
            self.emit(Event::Cursor(self.cursor));
        }

        let mut percent = if self.total == 0 {
            100
        } else {
            (self.done.min(self.total) * 100 / self.total) as u8
        };
        // After a jump the skipped-work baseline can be lower than what was
        // already typed; Replace progress never moves backwards.
        if let (Workload::Replace { .. }, Some(previous)) = (&self.workload, self.reported_progress)
        {
            percent = percent.max(previous);
        }
        if self.reported_progress != Some(percent) {
            self.reported_progress = Some(percent);
            self.emit(Event::Progress(percent));
        }
    }

    fn conclude(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Completed => {
                self.log("Typing finished.");
                self.set_status("Done");
                self.set_state(EngineState::Completed);
            }
            Outcome::NoChanges => {
                self.set_status("Done");
                self.set_state(EngineState::Completed);
            }
            Outcome::Stopped => {
                self.log("Typing stopped.");
                self.set_status("Stopped");
                self.set_state(EngineState::Stopped);
            }
            Outcome::Errored(message) => {
                self.log(format!("Error: {message}"));
                self.set_status(&format!("Error: {message}"));
                self.set_state(EngineState::Errored);
            }
        }
        self.emit(Event::Completion(outcome.clone()));
    }

    fn set_state(&mut self, state: EngineState) {
        if self.state != state {
            self.state = state;
            self.emit(Event::State(state));
        }
    }

    fn set_status(&mut self, status: &str) {
        if self.status != status {
            self.status = status.to_string();
            self.emit(Event::Status(self.status.clone()));
        }
    }

    fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!(target: "keyscribe::log", "{line}");
        self.emit(Event::Log(line));
    }

    fn emit(&mut self, event: Event) {
        self.sink.publish(event);
    }
}
