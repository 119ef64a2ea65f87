//! Terminal front end for a running session: turns worker events into
//! console lines and stdin lines into control commands.

use crate::control::ControlPort;
use crate::events::{Event, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    TogglePause,
    Skip,
    Jump(usize),
    Stop,
}

impl ConsoleCommand {
    /// `p`, `s`, `j N` or `q`, surrounding whitespace ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let command = match parts.next()? {
            "p" | "pause" => ConsoleCommand::TogglePause,
            "s" | "skip" => ConsoleCommand::Skip,
            "q" | "quit" | "stop" => ConsoleCommand::Stop,
            "j" | "jump" => ConsoleCommand::Jump(parts.next()?.parse().ok()?),
            _ => return None,
        };
        parts.next().is_none().then_some(command)
    }

    /// Forward to the worker and describe what was asked for.
    pub fn apply(self, port: &ControlPort) -> String {
        match self {
            ConsoleCommand::TogglePause => {
                if port.toggle_pause() {
                    "Pausing...".to_string()
                } else {
                    "Resuming...".to_string()
                }
            }
            ConsoleCommand::Skip => {
                port.request_skip();
                "Skipping ahead...".to_string()
            }
            ConsoleCommand::Jump(offset) => {
                port.request_jump(offset);
                format!("Jumping to {offset}...")
            }
            ConsoleCommand::Stop => {
                port.request_stop();
                "Stopping...".to_string()
            }
        }
    }
}

/// Picks the events worth a console line.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    last_decile: Option<u8>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_for(&mut self, event: &Event) -> Option<String> {
        match event {
            Event::Log(line) => Some(escape_for_log(line)),
            Event::Status(status) => match status.as_str() {
                "Typing…" | "Thinking…" => None,
                _ => Some(status.clone()),
            },
            Event::PauseInfo { offset, snippet } => Some(format!(
                "Paused at {offset}: \"{}\"",
                escape_for_log(snippet)
            )),
            Event::Progress(percent) => {
                let decile = percent / 10;
                if self.last_decile.is_some_and(|last| last >= decile) {
                    return None;
                }
                self.last_decile = Some(decile);
                Some(format!("Progress {percent}%"))
            }
            Event::Completion(Outcome::Errored(message)) => Some(format!("Failed: {message}")),
            Event::Cursor(_) | Event::State(_) | Event::Completion(_) => None,
        }
    }
}

pub fn print_console_line(line: &str) {
    const RESET: &str = "\x1b[0m";
    const TYPING: &str = "\x1b[34m";
    const EDIT: &str = "\x1b[33m";

    for (prefix, color) in [
        ("Inserted", TYPING),
        ("Typo", EDIT),
        ("Replaced", EDIT),
        ("Deleted", EDIT),
    ] {
        if let Some(rest) = line.strip_prefix(prefix) {
            eprintln!("{color}{prefix}{RESET}{rest}");
            return;
        }
    }
    eprintln!("{line}");
}

pub fn escape_for_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
