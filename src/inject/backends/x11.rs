use anyhow::{anyhow, Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, GetInputFocusReply};
use x11rb::protocol::xtest::ConnectionExt as _;
use x11rb::protocol::{xproto, xtest};
use x11rb::rust_connection::RustConnection;

use super::{key_to_keycode, modifier_to_keycode, COMMON_MODIFIER_KEYCODES};
use crate::inject::{InputInjector, Key, Modifier};
use crate::keyboard::{char_to_keystroke, KEY_LEFTSHIFT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    Pressed,
    Released,
}

fn evdev_to_x11_keycode(evdev_keycode: u32) -> Result<u8> {
    // On most Linux Xorg setups, X11 keycodes are evdev + 8.
    let x11 = evdev_keycode
        .checked_add(8)
        .ok_or_else(|| anyhow!("evdev keycode overflow"))?;
    u8::try_from(x11).map_err(|_| anyhow!("evdev keycode {evdev_keycode} out of range for X11"))
}

fn key_state_to_x11_event_type(state: KeyState) -> u8 {
    match state {
        KeyState::Pressed => xproto::KEY_PRESS_EVENT,
        KeyState::Released => xproto::KEY_RELEASE_EVENT,
    }
}

fn query_xtest(conn: &impl Connection) -> Result<()> {
    let ext = conn
        .extension_information(xtest::X11_EXTENSION_NAME)
        .context("failed to query X11 extension info")?;

    if ext.is_none() {
        return Err(anyhow!(
            "X11 backend requires the XTEST extension (not present on this X server)"
        ));
    }

    Ok(())
}

fn get_focus(conn: &impl Connection) -> Result<GetInputFocusReply> {
    conn.get_input_focus()
        .context("failed to request input focus")?
        .reply()
        .context("failed to read input focus reply")
}

fn keysym_for_keycode(conn: &impl Connection, keycode: u8, index: usize) -> Result<xproto::Keysym> {
    let reply = conn
        .get_keyboard_mapping(keycode, 1)
        .context("failed to request keyboard mapping")?
        .reply()
        .context("failed to read keyboard mapping")?;

    if reply.keysyms_per_keycode == 0 {
        return Err(anyhow!("X server returned 0 keysyms per keycode"));
    }

    Ok(reply
        .keysyms
        .get(index)
        .copied()
        .unwrap_or(x11rb::NO_SYMBOL))
}

/// Check a handful of keys against the US layout the keystroke table assumes.
fn validate_us_keymap(conn: &impl Connection) -> Result<()> {
    for (plain, shifted) in [('a', 'A'), ('q', 'Q'), ('1', '!'), ('\'', '"'), ('[', '{')] {
        let stroke = char_to_keystroke(plain)
            .ok_or_else(|| anyhow!("no keystroke for {plain:?}"))?;
        let keycode = evdev_to_x11_keycode(stroke.keycode)?;

        // Index 0 is unshifted, index 1 is shifted; Latin-1 keysyms equal the char code.
        let got0 = keysym_for_keycode(conn, keycode, 0)?;
        let got1 = keysym_for_keycode(conn, keycode, 1)?;

        if got0 == x11rb::NO_SYMBOL || got1 == x11rb::NO_SYMBOL {
            return Err(anyhow!(
                "X11 keymap returned NoSymbol for keycode {keycode}; this backend assumes X11 keycodes are evdev+8"
            ));
        }
        if got0 != plain as u32 || got1 != shifted as u32 {
            return Err(anyhow!(
                "X11 backend requires a US keyboard layout (keycode {keycode}: got {got0:#x}/{got1:#x}). Try `setxkbmap us`."
            ));
        }
    }

    Ok(())
}

/// Injects keystrokes into the focused X11 window through XTEST.
pub struct XTestInjector {
    conn: RustConnection,
    root: xproto::Window,
}

impl XTestInjector {
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("failed to connect to X11")?;
        query_xtest(&conn)?;
        validate_us_keymap(&conn)?;

        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| anyhow!("invalid X11 screen index"))?
            .root;

        // X11 special focus value: PointerRoot means focus follows the pointer.
        const POINTER_ROOT: xproto::Window = 1;
        let focus = get_focus(&conn)?;
        if focus.focus == x11rb::NONE {
            return Err(anyhow!(
                "no X11 input focus detected; click into the target editor before starting"
            ));
        }
        if focus.focus == POINTER_ROOT {
            return Err(anyhow!(
                "X11 input focus is set to PointerRoot; click into the target editor window to give it explicit focus"
            ));
        }

        let injector = Self { conn, root };
        injector.release_common_modifiers();
        Ok(injector)
    }

    fn send(&self, evdev_keycode: u32, state: KeyState) -> Result<()> {
        let keycode = evdev_to_x11_keycode(evdev_keycode)?;
        let type_ = key_state_to_x11_event_type(state);
        self.conn
            .xtest_fake_input(type_, keycode, x11rb::CURRENT_TIME, self.root, 0, 0, 0)
            .context("failed to send XTEST fake input")?;
        Ok(())
    }

    fn tap(&self, evdev_keycode: u32) -> Result<()> {
        self.send(evdev_keycode, KeyState::Pressed)?;
        self.send(evdev_keycode, KeyState::Released)?;
        self.conn
            .flush()
            .context("failed to flush X11 connection")?;
        Ok(())
    }

    fn release_common_modifiers(&self) {
        for keycode in COMMON_MODIFIER_KEYCODES {
            let _ = self.send(keycode, KeyState::Released);
        }
        let _ = self.conn.flush();
    }
}

impl InputInjector for XTestInjector {
    fn press_key(&mut self, key: Key) -> Result<()> {
        self.tap(key_to_keycode(key))
    }

    fn hold_modifier(&mut self, modifier: Modifier) -> Result<()> {
        self.send(modifier_to_keycode(modifier), KeyState::Pressed)?;
        self.conn
            .flush()
            .context("failed to flush X11 connection")?;
        Ok(())
    }

    fn release_modifier(&mut self, modifier: Modifier) -> Result<()> {
        self.send(modifier_to_keycode(modifier), KeyState::Released)?;
        self.conn
            .flush()
            .context("failed to flush X11 connection")?;
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> Result<()> {
        for c in text.chars() {
            let stroke = char_to_keystroke(c)
                .ok_or_else(|| anyhow!("cannot type {c:?} on a US keyboard layout"))?;
            if stroke.shift {
                self.send(KEY_LEFTSHIFT, KeyState::Pressed)?;
            }
            self.send(stroke.keycode, KeyState::Pressed)?;
            self.send(stroke.keycode, KeyState::Released)?;
            if stroke.shift {
                self.send(KEY_LEFTSHIFT, KeyState::Released)?;
            }
        }
        self.conn
            .flush()
            .context("failed to flush X11 connection")?;
        Ok(())
    }
}

impl Drop for XTestInjector {
    fn drop(&mut self) {
        self.release_common_modifiers();
    }
}
