//! Per-keystroke delays with human pacing.
//!
//! Delays start from the configured words-per-minute (5 characters per
//! word), get jittered by `variability`, and are then shaped by a slowly
//! drifting tempo and a per-character complexity factor. Thinking and word
//! pauses are separate events that never feed back into the tempo.

use std::time::Duration;

use rand::Rng;

use crate::keyboard::{is_hard_symbol, is_sentence_end, letter_class, LetterClass};
use crate::model::TypingOptions;

const TEMPO_MIN: f64 = 0.5;
const TEMPO_MAX: f64 = 1.5;

/// A pause that should be waited out and logged, but not timed as typing.
#[derive(Debug, Clone, PartialEq)]
pub struct Pause {
    pub duration: Duration,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct TimingModel {
    speed: u32,
    variability: f64,
    bot: bool,
    tempo: f64,
    short_bias: u32,
    long_bias: u32,
    last_delay: Option<f64>,
    words_since_pause: u32,
}

/// Complexity multiplier for typing `c` inside a word of `word_len` chars.
pub fn char_complexity(c: Option<char>, word_len: usize) -> f64 {
    let Some(c) = c else {
        return 1.0;
    };

    let mut factor: f64 = 1.0;
    factor += match letter_class(c) {
        LetterClass::Rare => 0.25,
        LetterClass::Medium => 0.12,
        LetterClass::Common => -0.05,
        LetterClass::Other => 0.0,
    };
    if is_hard_symbol(c) {
        factor += 0.15;
    }
    if word_len >= 12 {
        factor += 0.25;
    } else if word_len >= 8 {
        factor += 0.15;
    }
    factor.clamp(0.5, 1.8)
}

impl TimingModel {
    pub fn new(options: &TypingOptions) -> Self {
        Self {
            speed: options.speed.max(1),
            variability: options.variability.clamp(0.0, 1.0),
            bot: options.is_bot(),
            tempo: 1.0,
            short_bias: 0,
            long_bias: 0,
            last_delay: None,
            words_since_pause: 0,
        }
    }

    /// Seconds per character at the configured speed, before any shaping.
    pub fn base_delay(&self) -> f64 {
        60.0 / (f64::from(self.speed) * 5.0)
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn words_since_pause(&self) -> u32 {
        self.words_since_pause
    }

    pub fn reset_word_count(&mut self) {
        self.words_since_pause = 0;
    }

    pub fn last_delay(&self) -> Option<f64> {
        self.last_delay
    }

    /// Put back a previously observed last delay, e.g. after a long pause.
    pub fn restore_last_delay(&mut self, last: Option<f64>) {
        self.last_delay = last;
    }

    /// Record a delay that was actually slept instead of the computed one.
    pub fn override_last_delay(&mut self, delay: Duration) {
        self.last_delay = Some(delay.as_secs_f64());
    }

    fn update_tempo(&mut self, reference: f64, complexity: f64, rng: &mut impl Rng) -> f64 {
        if reference <= 0.0 {
            return 1.0;
        }
        if let Some(last) = self.last_delay {
            if last < reference * 0.85 {
                self.short_bias += 1;
                self.long_bias = self.long_bias.saturating_sub(1);
            } else if last > reference * 1.15 {
                self.long_bias += 1;
                self.short_bias = self.short_bias.saturating_sub(1);
            } else {
                self.short_bias = self.short_bias.saturating_sub(1);
                self.long_bias = self.long_bias.saturating_sub(1);
            }
        }

        let mut drift = rng.gen_range(-0.04..=0.04);
        drift += 0.03 * f64::from(self.short_bias);
        drift -= 0.03 * f64::from(self.long_bias);
        self.tempo = (self.tempo + drift).clamp(TEMPO_MIN, TEMPO_MAX);
        (self.tempo * complexity).clamp(TEMPO_MIN, TEMPO_MAX)
    }

    /// Delay after typing `c`, which sits in a word of `word_len` chars.
    pub fn char_delay(&mut self, c: Option<char>, word_len: usize, rng: &mut impl Rng) -> Duration {
        if self.bot {
            return Duration::ZERO;
        }
        let base = self.base_delay();
        let v = self.variability;
        let jittered = if v > 0.0 {
            base * rng.gen_range((1.0 - v)..=(1.0 + v))
        } else {
            base
        };
        let mult = self.update_tempo(jittered, char_complexity(c, word_len), rng);
        let delay = jittered * mult;
        self.last_delay = Some(delay);
        Duration::from_secs_f64(delay)
    }

    /// A fixed human delay (hesitation, backspace gap) shaped by the tempo.
    pub fn scaled_delay(&mut self, seconds: f64, rng: &mut impl Rng) -> Duration {
        if self.bot || seconds <= 0.0 {
            return Duration::ZERO;
        }
        let mult = self.update_tempo(seconds, 1.0, rng);
        let delay = seconds * mult;
        self.last_delay = Some(delay);
        Duration::from_secs_f64(delay)
    }

    /// Same as [`Self::scaled_delay`] with a uniformly drawn base.
    pub fn scaled_delay_between(&mut self, min: f64, max: f64, rng: &mut impl Rng) -> Duration {
        if self.bot {
            return Duration::ZERO;
        }
        let seconds = rng.gen_range(min..=max);
        self.scaled_delay(seconds, rng)
    }

    /// A long pause after a sentence or paragraph ends.
    pub fn thinking_pause(&self, c: char, rng: &mut impl Rng) -> Option<Pause> {
        if self.bot || !is_sentence_end(c) {
            return None;
        }
        let seconds: f64 = rng.gen_range(0.5..=5.0);
        let label = if c == '\n' {
            "end of paragraph".to_string()
        } else {
            format!("'{c}'")
        };
        Some(Pause {
            duration: Duration::from_secs_f64(seconds),
            reason: format!("Thinking pause ({seconds:.1}s) at {label}"),
        })
    }

    /// Count a finished word and maybe stop for a moment.
    ///
    /// The chance grows with every word typed since the last pause; when the
    /// pause fires the count starts over.
    pub fn word_pause(&mut self, rng: &mut impl Rng) -> Option<Pause> {
        if self.bot {
            return None;
        }
        self.words_since_pause += 1;
        let words = self.words_since_pause;
        let chance = (0.07 + f64::from(words) * 0.05).min(0.9);
        if rng.gen::<f64>() > chance {
            return None;
        }

        let base: f64 = rng.gen_range(0.4..=1.1);
        let scale = f64::from(words.max(1));
        let seconds =
            (base * (1.0 + 0.35 * scale) + rng.gen_range(-0.2..=0.6)).clamp(0.5, 6.0);
        self.words_since_pause = 0;

        Some(Pause {
            duration: Duration::from_secs_f64(seconds),
            reason: format!("Word pause ({seconds:.1}s) after {words} words"),
        })
    }
}
