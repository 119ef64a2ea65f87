use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use crate::inject::{InputInjector, Key, Modifier};

/// One call made against an injector, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectorCall {
    PressKey(Key),
    PressKeyRepeated(Key, usize),
    HoldModifier(Modifier),
    ReleaseModifier(Modifier),
    WriteText(String),
}

#[derive(Debug, Default, Clone)]
struct EditorState {
    buf: Vec<char>,
    cursor: usize,
    anchor: Option<usize>,
    shift_down: bool,
    calls: Vec<InjectorCall>,
    fail_after: Option<usize>,
}

impl EditorState {
    fn selection(&self) -> Option<(usize, usize)> {
        let anchor = self.anchor?;
        if anchor == self.cursor {
            return None;
        }
        Some((anchor.min(self.cursor), anchor.max(self.cursor)))
    }

    fn delete_selection(&mut self) -> bool {
        let Some((start, end)) = self.selection() else {
            self.anchor = None;
            return false;
        };
        self.buf.drain(start..end);
        self.cursor = start;
        self.anchor = None;
        true
    }

    fn insert_char(&mut self, c: char) {
        self.delete_selection();
        self.buf.insert(self.cursor, c);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.delete_selection() || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        self.buf.remove(self.cursor);
    }

    fn delete(&mut self) {
        if self.delete_selection() || self.cursor >= self.buf.len() {
            return;
        }
        self.buf.remove(self.cursor);
    }

    fn move_to(&mut self, target: usize) {
        if self.shift_down {
            self.anchor.get_or_insert(self.cursor);
        } else {
            self.anchor = None;
        }
        self.cursor = target.min(self.buf.len());
    }

    fn move_right(&mut self) {
        if !self.shift_down {
            if let Some((_, end)) = self.selection() {
                self.move_to(end);
                return;
            }
        }
        self.move_to(self.cursor + 1);
    }

    fn press(&mut self, key: Key) {
        match key {
            Key::Enter => self.insert_char('\n'),
            Key::Tab => self.insert_char('\t'),
            Key::Backspace => self.backspace(),
            Key::Delete => self.delete(),
            Key::Right => self.move_right(),
        }
    }

    fn record(&mut self, call: InjectorCall) -> Result<()> {
        if let Some(limit) = self.fail_after {
            if self.calls.len() >= limit {
                return Err(anyhow!("simulated injector failure after {limit} calls"));
            }
        }
        self.calls.push(call);
        Ok(())
    }
}

/// In-memory text editor that reacts to injected keystrokes.
///
/// Clones share the same document, so a test (or the dry-run CLI) can keep
/// a handle while the worker owns another.
#[derive(Debug, Default, Clone)]
pub struct SimulatedEditor {
    inner: Arc<Mutex<EditorState>>,
}

impl SimulatedEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `text` already in the document and the caret at the start.
    pub fn with_text(text: &str) -> Self {
        let editor = Self::default();
        editor.lock().buf = text.chars().collect();
        editor
    }

    /// Make every call after the first `calls` ones fail.
    pub fn fail_after(self, calls: usize) -> Self {
        self.lock().fail_after = Some(calls);
        self
    }

    fn lock(&self) -> MutexGuard<'_, EditorState> {
        // A panic while holding the lock only happens in a failing test.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn text(&self) -> String {
        self.lock().buf.iter().collect()
    }

    pub fn caret(&self) -> usize {
        self.lock().cursor
    }

    pub fn calls(&self) -> Vec<InjectorCall> {
        self.lock().calls.clone()
    }

    /// Number of Backspace presses, counting repeated presses individually.
    pub fn backspace_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .map(|call| match call {
                InjectorCall::PressKey(Key::Backspace) => 1,
                InjectorCall::PressKeyRepeated(Key::Backspace, n) => *n,
                _ => 0,
            })
            .sum()
    }

    /// Everything passed to `write_text`, concatenated.
    pub fn written_text(&self) -> String {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                InjectorCall::WriteText(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl InputInjector for SimulatedEditor {
    fn press_key(&mut self, key: Key) -> Result<()> {
        let mut state = self.lock();
        state.record(InjectorCall::PressKey(key))?;
        state.press(key);
        Ok(())
    }

    fn press_key_repeated(&mut self, key: Key, count: usize) -> Result<()> {
        let mut state = self.lock();
        state.record(InjectorCall::PressKeyRepeated(key, count))?;
        for _ in 0..count {
            state.press(key);
        }
        Ok(())
    }

    fn hold_modifier(&mut self, modifier: Modifier) -> Result<()> {
        let mut state = self.lock();
        state.record(InjectorCall::HoldModifier(modifier))?;
        match modifier {
            Modifier::Shift => state.shift_down = true,
        }
        Ok(())
    }

    fn release_modifier(&mut self, modifier: Modifier) -> Result<()> {
        let mut state = self.lock();
        state.record(InjectorCall::ReleaseModifier(modifier))?;
        match modifier {
            Modifier::Shift => state.shift_down = false,
        }
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        let mut state = self.lock();
        state.record(InjectorCall::WriteText(text.to_string()))?;
        for c in text.chars() {
            state.insert_char(c);
        }
        Ok(())
    }
}
