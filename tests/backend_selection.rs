use std::ffi::OsString;
use std::sync::{Mutex, OnceLock};

use keyscribe::inject::{open_injector, resolve_backend, InjectBackend};

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

struct EnvRestore {
    display: Option<OsString>,
}

impl EnvRestore {
    fn snapshot() -> Self {
        Self {
            display: std::env::var_os("DISPLAY"),
        }
    }
}

impl Drop for EnvRestore {
    fn drop(&mut self) {
        // SAFETY: modifying the process environment is not thread-safe in general.
        // These tests serialize all env var mutations via the `env_lock()` mutex.
        match &self.display {
            Some(v) => unsafe { std::env::set_var("DISPLAY", v) },
            None => unsafe { std::env::remove_var("DISPLAY") },
        }
    }
}

fn unset(name: &str) {
    // SAFETY: callers hold the global test mutex from `env_lock()`.
    unsafe { std::env::remove_var(name) };
}

fn set(name: &str, value: &str) {
    // SAFETY: callers hold the global test mutex from `env_lock()`.
    unsafe { std::env::set_var(name, value) };
}

#[test]
fn auto_resolves_to_x11_when_display_is_set() {
    let _guard = env_lock().lock().unwrap();
    let _restore = EnvRestore::snapshot();

    set("DISPLAY", ":0");

    #[cfg(feature = "x11")]
    {
        let resolved = resolve_backend(InjectBackend::Auto).expect("should resolve");
        assert_eq!(resolved, InjectBackend::X11);
    }

    #[cfg(not(feature = "x11"))]
    {
        let err = resolve_backend(InjectBackend::Auto).unwrap_err();
        let msg = format!("{err:#}");
        assert!(
            msg.contains("No supported keystroke backend detected"),
            "expected missing-backend wording, got: {msg}"
        );
        assert!(
            msg.contains("DISPLAY is set"),
            "expected mention of DISPLAY, got: {msg}"
        );
    }
}

#[test]
fn auto_without_display_points_at_dry_run() {
    let _guard = env_lock().lock().unwrap();
    let _restore = EnvRestore::snapshot();

    unset("DISPLAY");

    let err = resolve_backend(InjectBackend::Auto).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("No supported keystroke backend"), "{msg}");
    assert!(msg.contains("dry-run"), "{msg}");
}

#[test]
fn explicit_x11_is_rejected_or_accepted() {
    let _guard = env_lock().lock().unwrap();
    let _restore = EnvRestore::snapshot();

    unset("DISPLAY");

    #[cfg(feature = "x11")]
    {
        let resolved = resolve_backend(InjectBackend::X11).expect("should resolve");
        assert_eq!(resolved, InjectBackend::X11);
    }

    #[cfg(not(feature = "x11"))]
    {
        let err = resolve_backend(InjectBackend::X11).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("X11"));
        assert!(msg.contains("disabled"));
    }
}

#[test]
fn dry_run_needs_no_display() {
    let _guard = env_lock().lock().unwrap();
    let _restore = EnvRestore::snapshot();

    unset("DISPLAY");

    assert_eq!(
        resolve_backend(InjectBackend::DryRun).unwrap(),
        InjectBackend::DryRun
    );
    let (_, editor) = open_injector(InjectBackend::DryRun, "seed text").unwrap();
    assert_eq!(editor.map(|e| e.text()), Some("seed text".to_string()));
}
