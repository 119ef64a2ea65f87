//! The keystroke-injection seam between the engine and the desktop.

pub mod backends;

use anyhow::{anyhow, Result};

use crate::sim::SimulatedEditor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Enter,
    Tab,
    Backspace,
    Delete,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    Shift,
}

/// Something that can put keystrokes into the focused application.
///
/// Every call is one atomic interaction with the outside world. Failures are
/// reported as errors and end the session.
pub trait InputInjector: Send {
    fn press_key(&mut self, key: Key) -> Result<()>;

    fn hold_modifier(&mut self, modifier: Modifier) -> Result<()>;

    fn release_modifier(&mut self, modifier: Modifier) -> Result<()>;

    fn write_text(&mut self, text: &str) -> Result<()>;

    fn press_key_repeated(&mut self, key: Key, count: usize) -> Result<()> {
        for _ in 0..count {
            self.press_key(key)?;
        }
        Ok(())
    }
}

impl<T: InputInjector + ?Sized> InputInjector for Box<T> {
    fn press_key(&mut self, key: Key) -> Result<()> {
        (**self).press_key(key)
    }

    fn hold_modifier(&mut self, modifier: Modifier) -> Result<()> {
        (**self).hold_modifier(modifier)
    }

    fn release_modifier(&mut self, modifier: Modifier) -> Result<()> {
        (**self).release_modifier(modifier)
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        (**self).write_text(text)
    }

    fn press_key_repeated(&mut self, key: Key, count: usize) -> Result<()> {
        (**self).press_key_repeated(key, count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectBackend {
    Auto,
    X11,
    /// Apply keystrokes to an in-memory editor instead of the desktop.
    DryRun,
}

fn env_is_set(name: &str) -> bool {
    std::env::var_os(name)
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}

fn backend_unavailable_message() -> String {
    let xdg_session_type = std::env::var("XDG_SESSION_TYPE").unwrap_or_default();

    let mut parts = Vec::new();
    if env_is_set("WAYLAND_DISPLAY") {
        parts.push("WAYLAND_DISPLAY is set".to_string());
    }
    if env_is_set("DISPLAY") {
        parts.push("DISPLAY is set".to_string());
    }
    if !xdg_session_type.is_empty() {
        parts.push(format!("XDG_SESSION_TYPE={xdg_session_type}"));
    }

    if parts.is_empty() {
        "No display session detected (expected an X11 DISPLAY).".to_string()
    } else {
        format!("Detected environment: {}", parts.join(", "))
    }
}

/// Pick a concrete backend for `requested`, failing when it cannot work here.
pub fn resolve_backend(requested: InjectBackend) -> Result<InjectBackend> {
    match requested {
        InjectBackend::DryRun => Ok(InjectBackend::DryRun),
        InjectBackend::X11 => {
            if cfg!(feature = "x11") {
                Ok(InjectBackend::X11)
            } else {
                Err(anyhow!(
                    "X11 backend requested but is disabled in this build. (Rebuild with `--features x11`.) {}",
                    backend_unavailable_message()
                ))
            }
        }
        InjectBackend::Auto => {
            if env_is_set("DISPLAY") && cfg!(feature = "x11") {
                return Ok(InjectBackend::X11);
            }
            let hint = if cfg!(feature = "x11") {
                "Start an X11 session (or Xwayland with a focused X client), or pass `--backend dry-run`."
            } else {
                "This build has no desktop backends enabled; pass `--backend dry-run`."
            };
            Err(anyhow!(
                "No supported keystroke backend detected. {}\n{hint}",
                backend_unavailable_message()
            ))
        }
    }
}

/// Open the injector for `requested`.
///
/// `document` seeds the in-memory editor used by the dry-run backend.
pub fn open_injector(
    requested: InjectBackend,
    document: &str,
) -> Result<(Box<dyn InputInjector>, Option<SimulatedEditor>)> {
    match resolve_backend(requested)? {
        InjectBackend::DryRun => {
            let editor = SimulatedEditor::with_text(document);
            Ok((Box::new(editor.clone()), Some(editor)))
        }
        InjectBackend::X11 => {
            #[cfg(feature = "x11")]
            {
                let injector = backends::x11::XTestInjector::connect()?;
                Ok((Box::new(injector), None))
            }

            #[cfg(not(feature = "x11"))]
            {
                Err(anyhow!(
                    "X11 backend is disabled in this build (rebuild with `--features x11`)."
                ))
            }
        }
        InjectBackend::Auto => Err(anyhow!("no backend resolved")),
    }
}
