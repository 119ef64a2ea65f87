#[cfg(feature = "x11")]
pub mod x11;

// Modifiers released on connect and on drop so a previous aborted run (or
// this one) never leaves a key held down.
pub(crate) const COMMON_MODIFIER_KEYCODES: [u32; 6] = [
    crate::keyboard::KEY_LEFTSHIFT,
    crate::keyboard::KEY_RIGHTSHIFT,
    crate::keyboard::KEY_LEFTCTRL,
    crate::keyboard::KEY_RIGHTCTRL,
    crate::keyboard::KEY_LEFTALT,
    crate::keyboard::KEY_RIGHTALT,
];

pub(crate) fn key_to_keycode(key: crate::inject::Key) -> u32 {
    use crate::inject::Key;
    use crate::keyboard::*;

    match key {
        Key::Enter => KEY_ENTER,
        Key::Tab => KEY_TAB,
        Key::Backspace => KEY_BACKSPACE,
        Key::Delete => KEY_DELETE,
        Key::Right => KEY_RIGHT,
    }
}

pub(crate) fn modifier_to_keycode(modifier: crate::inject::Modifier) -> u32 {
    match modifier {
        crate::inject::Modifier::Shift => crate::keyboard::KEY_LEFTSHIFT,
    }
}
