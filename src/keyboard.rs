//! Static keyboard data: US-QWERTY evdev keycodes, the neighbor table used
//! for typos, and the letter-frequency classes used by the timing model.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub keycode: u32,
    pub shift: bool,
}

// Linux evdev keycodes (see linux/input-event-codes.h)
pub const KEY_1: u32 = 2;
pub const KEY_2: u32 = 3;
pub const KEY_3: u32 = 4;
pub const KEY_4: u32 = 5;
pub const KEY_5: u32 = 6;
pub const KEY_6: u32 = 7;
pub const KEY_7: u32 = 8;
pub const KEY_8: u32 = 9;
pub const KEY_9: u32 = 10;
pub const KEY_0: u32 = 11;

pub const KEY_MINUS: u32 = 12;
pub const KEY_EQUAL: u32 = 13;
pub const KEY_BACKSPACE: u32 = 14;
pub const KEY_TAB: u32 = 15;

pub const KEY_Q: u32 = 16;
pub const KEY_W: u32 = 17;
pub const KEY_E: u32 = 18;
pub const KEY_R: u32 = 19;
pub const KEY_T: u32 = 20;
pub const KEY_Y: u32 = 21;
pub const KEY_U: u32 = 22;
pub const KEY_I: u32 = 23;
pub const KEY_O: u32 = 24;
pub const KEY_P: u32 = 25;

pub const KEY_LEFTBRACE: u32 = 26;
pub const KEY_RIGHTBRACE: u32 = 27;
pub const KEY_ENTER: u32 = 28;

pub const KEY_LEFTCTRL: u32 = 29;

pub const KEY_A: u32 = 30;
pub const KEY_S: u32 = 31;
pub const KEY_D: u32 = 32;
pub const KEY_F: u32 = 33;
pub const KEY_G: u32 = 34;
pub const KEY_H: u32 = 35;
pub const KEY_J: u32 = 36;
pub const KEY_K: u32 = 37;
pub const KEY_L: u32 = 38;

pub const KEY_SEMICOLON: u32 = 39;
pub const KEY_APOSTROPHE: u32 = 40;
pub const KEY_GRAVE: u32 = 41;

pub const KEY_LEFTSHIFT: u32 = 42;

pub const KEY_BACKSLASH: u32 = 43;

pub const KEY_Z: u32 = 44;
pub const KEY_X: u32 = 45;
pub const KEY_C: u32 = 46;
pub const KEY_V: u32 = 47;
pub const KEY_B: u32 = 48;
pub const KEY_N: u32 = 49;
pub const KEY_M: u32 = 50;

pub const KEY_COMMA: u32 = 51;
pub const KEY_DOT: u32 = 52;
pub const KEY_SLASH: u32 = 53;

pub const KEY_RIGHTSHIFT: u32 = 54;

pub const KEY_LEFTALT: u32 = 56;
pub const KEY_SPACE: u32 = 57;

pub const KEY_RIGHTCTRL: u32 = 97;
pub const KEY_RIGHTALT: u32 = 100;

pub const KEY_RIGHT: u32 = 106;
pub const KEY_DELETE: u32 = 111;

const LETTER_KEYCODES: [u32; 26] = [
    KEY_A, KEY_B, KEY_C, KEY_D, KEY_E, KEY_F, KEY_G, KEY_H, KEY_I, KEY_J, KEY_K, KEY_L, KEY_M,
    KEY_N, KEY_O, KEY_P, KEY_Q, KEY_R, KEY_S, KEY_T, KEY_U, KEY_V, KEY_W, KEY_X, KEY_Y, KEY_Z,
];

// Digit row: (unshifted, shifted, keycode).
const DIGIT_ROW: [(char, char, u32); 10] = [
    ('1', '!', KEY_1),
    ('2', '@', KEY_2),
    ('3', '#', KEY_3),
    ('4', '$', KEY_4),
    ('5', '%', KEY_5),
    ('6', '^', KEY_6),
    ('7', '&', KEY_7),
    ('8', '*', KEY_8),
    ('9', '(', KEY_9),
    ('0', ')', KEY_0),
];

const PUNCTUATION_KEYS: [(char, char, u32); 11] = [
    ('-', '_', KEY_MINUS),
    ('=', '+', KEY_EQUAL),
    ('[', '{', KEY_LEFTBRACE),
    (']', '}', KEY_RIGHTBRACE),
    ('\\', '|', KEY_BACKSLASH),
    (';', ':', KEY_SEMICOLON),
    ('\'', '"', KEY_APOSTROPHE),
    ('`', '~', KEY_GRAVE),
    (',', '<', KEY_COMMA),
    ('.', '>', KEY_DOT),
    ('/', '?', KEY_SLASH),
];

/// Map an output character to the US-QWERTY key that produces it.
pub fn char_to_keystroke(c: char) -> Option<KeyStroke> {
    match c {
        ' ' => {
            return Some(KeyStroke {
                keycode: KEY_SPACE,
                shift: false,
            })
        }
        '\n' => {
            return Some(KeyStroke {
                keycode: KEY_ENTER,
                shift: false,
            })
        }
        '\t' => {
            return Some(KeyStroke {
                keycode: KEY_TAB,
                shift: false,
            })
        }
        // Smart quotes rely on the editor's auto-substitution.
        '’' | '‘' => return char_to_keystroke('\''),
        '”' | '“' => return char_to_keystroke('"'),
        _ => {}
    }

    if c.is_ascii_alphabetic() {
        let idx = (c.to_ascii_lowercase() as u8 - b'a') as usize;
        return Some(KeyStroke {
            keycode: LETTER_KEYCODES[idx],
            shift: c.is_ascii_uppercase(),
        });
    }

    DIGIT_ROW
        .iter()
        .chain(PUNCTUATION_KEYS.iter())
        .find_map(|&(plain, shifted, keycode)| {
            if c == plain {
                Some(KeyStroke {
                    keycode,
                    shift: false,
                })
            } else if c == shifted {
                Some(KeyStroke {
                    keycode,
                    shift: true,
                })
            } else {
                None
            }
        })
}

pub fn find_first_unsupported_char(text: &str) -> Option<(usize, char)> {
    text.chars()
        .enumerate()
        .find(|&(_idx, c)| char_to_keystroke(c).is_none())
}

/// Turn CRLF and lone CR line endings into `\n`, which is typed as Enter.
pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn qwerty_neighbors(c: char) -> &'static str {
    match c {
        'q' => "was",
        'w' => "qeasd",
        'e' => "wrsd",
        'r' => "etdf",
        't' => "ryfg",
        'y' => "tugh",
        'u' => "yijh",
        'i' => "uojk",
        'o' => "iplk",
        'p' => "ol",
        'a' => "qwsz",
        's' => "wedazx",
        'd' => "erfscx",
        'f' => "rtgdcv",
        'g' => "tyhfvb",
        'h' => "yujgnb",
        'j' => "uikhm",
        'k' => "iojlm",
        'l' => "opk",
        'z' => "asx",
        'x' => "zsdc",
        'c' => "xdfv",
        'v' => "cfgb",
        'b' => "vghn",
        'n' => "bhjm",
        'm' => "njk",
        '1' => "2q",
        '2' => "13qw",
        '3' => "24we",
        '4' => "35er",
        '5' => "46rt",
        '6' => "57ty",
        '7' => "68yu",
        '8' => "79ui",
        '9' => "80io",
        '0' => "9op",
        _ => "",
    }
}

/// Pick a key next to `c`, keeping its case.
///
/// Characters outside the table fall back to a random lowercase letter.
pub fn qwerty_adjacent_char(c: char, rng: &mut impl Rng) -> char {
    let make_upper = c.is_uppercase();
    let base = c.to_ascii_lowercase();

    let mut neighbors = qwerty_neighbors(base);
    if neighbors.is_empty() {
        neighbors = "abcdefghijklmnopqrstuvwxyz";
    }
    let bytes = neighbors.as_bytes();
    let chosen = bytes[rng.gen_range(0..bytes.len())] as char;

    if make_upper {
        chosen.to_ascii_uppercase()
    } else {
        chosen
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterClass {
    Common,
    Medium,
    Rare,
    Other,
}

pub fn letter_class(c: char) -> LetterClass {
    match c.to_ascii_lowercase() {
        'e' | 't' | 'a' | 'o' | 'i' | 'n' | 's' | 'h' | 'r' | 'd' | 'l' | 'u' => {
            LetterClass::Common
        }
        'c' | 'm' | 'f' | 'w' | 'y' | 'p' | 'v' | 'b' | 'g' => LetterClass::Medium,
        'k' | 'j' | 'q' | 'x' | 'z' => LetterClass::Rare,
        _ => LetterClass::Other,
    }
}

/// Digits and the symbols that need a reach or a Shift chord.
pub fn is_hard_symbol(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '@' | '#' | '$' | '%' | '&' | '*' | '_')
}

/// Characters that separate words while typing.
pub fn is_word_break(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\t')
}

/// Characters that end a sentence or a paragraph.
pub fn is_sentence_end(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}
